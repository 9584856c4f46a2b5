//! Cooperative shutdown signal (component J), grounded on the teacher's
//! `run.rs` use of an `oneshot` stop channel plus an `AbortHandle` for a
//! hard abort. Workers poll `should_stop()` between operations rather
//! than being forcibly cancelled mid-query, so an in-flight write always
//! finishes (and gets recorded in the history store) before the worker
//! exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    stop: AtomicBool,
    notify: Notify,
}

/// Cloneable handle shared by the orchestrator and every worker.
#[derive(Clone, Default)]
pub struct TerminationSignal {
    inner: Arc<Inner>,
}

impl TerminationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.inner.stop.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn should_stop(&self) -> bool {
        self.inner.stop.load(Ordering::SeqCst)
    }

    /// Resolves once `request_stop` has been called. Workers race this
    /// against their next operation so a stop request is noticed even
    /// while waiting on a slow driver call or the retry queue.
    pub async fn stopped(&self) {
        if self.should_stop() {
            return;
        }
        self.inner.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn stopped_resolves_immediately_if_already_stopped() {
        let signal = TerminationSignal::new();
        signal.request_stop();
        tokio::time::timeout(Duration::from_millis(50), signal.stopped())
            .await
            .expect("should resolve without waiting");
    }

    #[tokio::test]
    async fn stopped_wakes_waiters_on_request() {
        let signal = TerminationSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.stopped().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.request_stop();

        tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .expect("waiter should be woken")
            .unwrap();
    }
}
