//! Mutation retry queue (component G).
//!
//! Ported from the Python `RetriesGenerator`, which rearms a single
//! `threading.Timer` for the oldest pending retry and lets a constant
//! backoff naturally keep the queue in FIFO order (since every entry waits
//! the same duration, the one enqueued first is always the one whose
//! backoff elapses first). The async analogue is a `Notify`-guarded queue
//! and `tokio::time::sleep_until` instead of a timer thread.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::query::{Operation, QueryDto};

struct PendingRetry {
    operation: Operation,
    dto: QueryDto,
    attempt: usize,
    enqueued_at: Instant,
}

/// Holds failed mutations until their backoff has elapsed, then releases
/// them in the order they failed.
pub struct RetryController {
    backoff: Duration,
    queue: Mutex<VecDeque<PendingRetry>>,
    notify: Notify,
}

impl RetryController {
    pub fn new(backoff: Duration) -> Self {
        Self {
            backoff,
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Queues `dto` for retry after the configured backoff.
    pub fn enqueue(&self, operation: Operation, dto: QueryDto, attempt: usize) {
        self.queue.lock().push_back(PendingRetry {
            operation,
            dto,
            attempt,
            enqueued_at: Instant::now(),
        });
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits for, then returns, the oldest retry whose backoff has
    /// elapsed. Never resolves while the queue is empty — callers race it
    /// against other work with `tokio::select!` rather than polling it
    /// unconditionally.
    pub async fn next_ready(&self) -> (Operation, QueryDto, usize) {
        loop {
            let deadline = {
                let queue = self.queue.lock();
                queue.front().map(|entry| entry.enqueued_at + self.backoff)
            };
            match deadline {
                Some(deadline) if deadline <= Instant::now() => {
                    let mut queue = self.queue.lock();
                    let entry = queue.pop_front().expect("queue was non-empty under the same lock");
                    return (entry.operation, entry.dto, entry.attempt);
                }
                Some(deadline) => {
                    tokio::time::sleep_until(deadline.into()).await;
                }
                None => {
                    self.notify.notified().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scylla::frame::response::result::CqlValue;

    fn dto(tag: i64) -> QueryDto {
        QueryDto::new("INSERT INTO t (pk) VALUES (?)", vec![CqlValue::BigInt(tag)])
    }

    #[tokio::test(start_paused = true)]
    async fn releases_in_fifo_order_after_backoff() {
        let controller = RetryController::new(Duration::from_millis(50));
        controller.enqueue(Operation::Write, dto(1), 0);
        tokio::time::advance(Duration::from_millis(10)).await;
        controller.enqueue(Operation::Write, dto(2), 0);

        let (_, first, _) = controller.next_ready().await;
        let (_, second, _) = controller.next_ready().await;

        assert_eq!(first.values[0], CqlValue::BigInt(1));
        assert_eq!(second.values[0], CqlValue::BigInt(2));
    }

    #[tokio::test(start_paused = true)]
    async fn next_ready_waits_for_an_enqueue_on_an_empty_queue() {
        let controller = RetryController::new(Duration::from_millis(10));
        assert!(controller.is_empty());

        let wait = tokio::spawn(async move {
            let controller = std::sync::Arc::new(controller);
            let waiter = controller.clone();
            let handle = tokio::spawn(async move { waiter.next_ready().await });
            tokio::time::sleep(Duration::from_millis(1)).await;
            controller.enqueue(Operation::Read, dto(9), 0);
            handle.await.unwrap()
        });

        let (_, resolved, _) = wait.await.unwrap();
        assert_eq!(resolved.values[0], CqlValue::BigInt(9));
    }
}
