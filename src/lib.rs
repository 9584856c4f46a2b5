#[macro_use]
extern crate async_trait;

#[cfg(test)]
pub(crate) mod test_util;

pub mod column;
pub mod config;
pub mod driver;
pub mod error;
pub mod history;
pub mod load;
pub mod orchestrator;
pub mod query;
pub mod result;
pub mod retry;
pub mod schema;
pub mod termination;
pub mod validator;
pub mod worker;

#[cfg(test)]
mod tests {
    use crate::test_util::new_test_session;

    #[tokio::test]
    async fn test_can_connect() {
        let s = new_test_session().await;
        s.query("SELECT * FROM system.local", ()).await.unwrap();
    }
}
