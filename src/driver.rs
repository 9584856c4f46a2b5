//! Query driver abstraction (component B).
//!
//! The worker never talks to a CQL cluster directly; it goes through a
//! [`QueryDriver`], which is the seam that makes the engine's concurrency
//! and retry logic testable without a live cluster, and that gives the
//! oracle and SUT clusters a uniform interface even though in principle
//! they could be different database engines.

use std::sync::mpsc::{RecvTimeoutError, Sender};
use std::time::Duration;

use async_trait::async_trait;
use scylla::client::caching_session::CachingSession;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::frame::response::result::CqlValue;
use tokio::sync::oneshot;

use crate::error::QueryDriverError;

/// A single result row, in column order. Divorced from the driver's own
/// wire representation so that [`InMemoryDriver`] can produce rows without
/// a cluster at all.
pub type Row = Vec<CqlValue>;

const PREPARED_STATEMENT_CACHE_SIZE: usize = 1000;

#[async_trait]
pub trait QueryDriver: Send + Sync {
    /// Executes `query` bound to `values`, returning every row in the
    /// result set (empty for statements that don't produce rows, such as
    /// `INSERT`, `CREATE TABLE`, or `DROP TABLE`).
    async fn execute(&self, query: &str, values: &[CqlValue]) -> Result<Vec<Row>, QueryDriverError>;

    /// Warms the prepared-statement cache for `query`. Drivers that don't
    /// distinguish prepare from execute may treat this as a no-op.
    async fn prepare(&self, query: &str) -> Result<(), QueryDriverError>;

    /// Releases any cluster-held resources. Called once, when a worker
    /// shuts down.
    async fn teardown(&self) -> Result<(), QueryDriverError>;
}

/// Talks to a real cluster through the `scylla` driver.
///
/// Prepared statements are cached by [`CachingSession`] rather than by hand
/// in a `lru` map — the driver already solves this problem, and solving it
/// again ourselves would just be a second, worse LRU.
pub struct RealDriver {
    session: CachingSession,
}

impl RealDriver {
    pub async fn connect(known_nodes: &[String]) -> Result<Self, QueryDriverError> {
        let mut builder = SessionBuilder::new();
        for node in known_nodes {
            builder = builder.known_node(node);
        }
        let session: Session = builder.build().await.map_err(QueryDriverError::new)?;
        Ok(Self {
            session: CachingSession::from(session, PREPARED_STATEMENT_CACHE_SIZE),
        })
    }

    fn rows_from_result(result: scylla::QueryResult) -> Vec<Row> {
        result
            .rows
            .unwrap_or_default()
            .into_iter()
            .map(|row| {
                row.columns
                    .into_iter()
                    .map(|col| col.unwrap_or(CqlValue::Empty))
                    .collect()
            })
            .collect()
    }
}

#[async_trait]
impl QueryDriver for RealDriver {
    async fn execute(&self, query: &str, values: &[CqlValue]) -> Result<Vec<Row>, QueryDriverError> {
        let result = self
            .session
            .execute_unpaged(query, values.to_vec())
            .await
            .map_err(QueryDriverError::new)?;
        Ok(Self::rows_from_result(result))
    }

    async fn prepare(&self, query: &str) -> Result<(), QueryDriverError> {
        self.session
            .add_prepared_statement(&query.into())
            .await
            .map_err(QueryDriverError::new)?;
        Ok(())
    }

    async fn teardown(&self) -> Result<(), QueryDriverError> {
        Ok(())
    }
}

/// Discards every statement. Used by `orchestrator::connect_driver` when a
/// cluster's node list is empty (no oracle cluster configured, most
/// commonly), so the rest of the pipeline can treat "no driver configured"
/// and "a driver that never fails" identically instead of branching on it.
#[derive(Debug, Default)]
pub struct NoOpDriver;

#[async_trait]
impl QueryDriver for NoOpDriver {
    async fn execute(&self, _query: &str, _values: &[CqlValue]) -> Result<Vec<Row>, QueryDriverError> {
        Ok(Vec::new())
    }

    async fn prepare(&self, _query: &str) -> Result<(), QueryDriverError> {
        Ok(())
    }

    async fn teardown(&self) -> Result<(), QueryDriverError> {
        Ok(())
    }
}

/// An in-process fake cluster, for unit and worker-loop tests.
///
/// Bound values on an `INSERT` are appended to the row set; bound values on
/// a `SELECT` are treated as a prefix to match against, so that selecting
/// on a partition key returns every row sharing that key. Anything else is
/// a no-op. This is deliberately naive — it exists to exercise the worker
/// and validator, not to be a CQL interpreter.
#[derive(Default)]
pub struct InMemoryDriver {
    rows: parking_lot::Mutex<Vec<Row>>,
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Row> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl QueryDriver for InMemoryDriver {
    async fn execute(&self, query: &str, values: &[CqlValue]) -> Result<Vec<Row>, QueryDriverError> {
        let statement = query.trim_start().to_ascii_uppercase();
        if statement.starts_with("INSERT") {
            self.rows.lock().push(values.to_vec());
            Ok(Vec::new())
        } else if statement.starts_with("SELECT") {
            Ok(self
                .rows
                .lock()
                .iter()
                .filter(|row| row.starts_with(values))
                .cloned()
                .collect())
        } else {
            Ok(Vec::new())
        }
    }

    async fn prepare(&self, _query: &str) -> Result<(), QueryDriverError> {
        Ok(())
    }

    async fn teardown(&self) -> Result<(), QueryDriverError> {
        Ok(())
    }
}

enum Request {
    Execute {
        query: String,
        values: Vec<CqlValue>,
        reply: oneshot::Sender<Result<Vec<Row>, QueryDriverError>>,
    },
    Prepare {
        query: String,
        reply: oneshot::Sender<Result<(), QueryDriverError>>,
    },
}

/// Runs a [`RealDriver`] on a dedicated OS thread with its own single
/// threaded Tokio runtime, communicating over a channel.
///
/// The spec allows eliding true OS-process isolation when the driver
/// library can hold several cluster connections in one process; this is
/// that elision. A thread boundary still buys us the property that matters
/// for gemini: a panic or a hung connection inside the driver does not
/// block the worker that owns it, and polling the channel with a timeout
/// keeps the host thread responsive to shutdown instead of parking
/// forever in a blocking recv.
pub struct SubprocessDriver {
    sender: Option<Sender<Request>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl SubprocessDriver {
    pub fn spawn(known_nodes: Vec<String>) -> Self {
        let (tx, rx) = std::sync::mpsc::channel::<Request>();
        let handle = std::thread::spawn(move || Self::run(known_nodes, rx));
        Self {
            sender: Some(tx),
            handle: Some(handle),
        }
    }

    fn run(known_nodes: Vec<String>, rx: std::sync::mpsc::Receiver<Request>) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to start isolated driver runtime");
        runtime.block_on(async move {
            let driver = match RealDriver::connect(&known_nodes).await {
                Ok(driver) => driver,
                Err(err) => {
                    Self::drain_with_error(&rx, err);
                    return;
                }
            };
            loop {
                match rx.recv_timeout(Duration::from_secs(1)) {
                    Ok(request) => Self::handle_request(&driver, request).await,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });
    }

    fn drain_with_error(rx: &std::sync::mpsc::Receiver<Request>, err: QueryDriverError) {
        let message = err.0.to_string();
        while let Ok(request) = rx.recv_timeout(Duration::from_secs(1)) {
            let failure = QueryDriverError::new(anyhow::anyhow!(message.clone()));
            match request {
                Request::Execute { reply, .. } => {
                    let _ = reply.send(Err(failure));
                }
                Request::Prepare { reply, .. } => {
                    let _ = reply.send(Err(failure));
                }
            }
        }
    }

    async fn handle_request(driver: &RealDriver, request: Request) {
        match request {
            Request::Execute { query, values, reply } => {
                let result = driver.execute(&query, &values).await;
                let _ = reply.send(result);
            }
            Request::Prepare { query, reply } => {
                let result = driver.prepare(&query).await;
                let _ = reply.send(result);
            }
        }
    }
}

#[async_trait]
impl QueryDriver for SubprocessDriver {
    async fn execute(&self, query: &str, values: &[CqlValue]) -> Result<Vec<Row>, QueryDriverError> {
        let (reply, recv) = oneshot::channel();
        let sender = self
            .sender
            .as_ref()
            .expect("execute called after subprocess driver was stopped");
        sender
            .send(Request::Execute {
                query: query.to_string(),
                values: values.to_vec(),
                reply,
            })
            .map_err(|_| QueryDriverError::new(anyhow::anyhow!("subprocess driver thread is gone")))?;
        recv.await
            .map_err(|_| QueryDriverError::new(anyhow::anyhow!("subprocess driver dropped the reply")))?
    }

    async fn prepare(&self, query: &str) -> Result<(), QueryDriverError> {
        let (reply, recv) = oneshot::channel();
        let sender = self
            .sender
            .as_ref()
            .expect("prepare called after subprocess driver was stopped");
        sender
            .send(Request::Prepare {
                query: query.to_string(),
                reply,
            })
            .map_err(|_| QueryDriverError::new(anyhow::anyhow!("subprocess driver thread is gone")))?;
        recv.await
            .map_err(|_| QueryDriverError::new(anyhow::anyhow!("subprocess driver dropped the reply")))?
    }

    async fn teardown(&self) -> Result<(), QueryDriverError> {
        Ok(())
    }
}

impl Drop for SubprocessDriver {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_driver_selects_by_partition_prefix() {
        let driver = InMemoryDriver::new();
        driver
            .execute(
                "INSERT INTO t (pk, ck) VALUES (?, ?)",
                &[CqlValue::BigInt(1), CqlValue::BigInt(10)],
            )
            .await
            .unwrap();
        driver
            .execute(
                "INSERT INTO t (pk, ck) VALUES (?, ?)",
                &[CqlValue::BigInt(2), CqlValue::BigInt(20)],
            )
            .await
            .unwrap();

        let rows = driver
            .execute("SELECT * FROM t WHERE pk = ?", &[CqlValue::BigInt(1)])
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![CqlValue::BigInt(1), CqlValue::BigInt(10)]]);
    }

    #[tokio::test]
    async fn no_op_driver_never_produces_rows() {
        let driver = NoOpDriver;
        let rows = driver
            .execute("INSERT INTO t (pk) VALUES (?)", &[CqlValue::BigInt(1)])
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
