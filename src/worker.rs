//! Worker loop (component H): the per-task unit of concurrency. Each
//! worker owns its slice of the partition space, its own history store
//! file, and its own driver handles — nothing here is shared with another
//! worker, so the whole run can be sharded across tasks without locking.

use std::sync::Arc;

use anyhow::Context;

use crate::driver::QueryDriver;
use crate::error::OperationError;
use crate::history::HistoryStore;
use crate::load::LoadGenerator;
use crate::query::Operation;
use crate::result::ProcessResult;
use crate::retry::RetryController;
use crate::termination::TerminationSignal;
use crate::validator;

pub struct WorkerConfig {
    pub max_mutation_retries: usize,
    pub max_mutation_retries_backoff: std::time::Duration,
    pub fail_fast: bool,
}

pub struct Worker {
    index: usize,
    config: WorkerConfig,
    termination: TerminationSignal,
    retry: RetryController,
    history: Arc<HistoryStore>,
    sut: Arc<dyn QueryDriver>,
    oracle: Option<Arc<dyn QueryDriver>>,
    load: LoadGenerator,
    result: ProcessResult,
}

impl Worker {
    pub fn new(
        index: usize,
        config: WorkerConfig,
        termination: TerminationSignal,
        history: Arc<HistoryStore>,
        sut: Arc<dyn QueryDriver>,
        oracle: Option<Arc<dyn QueryDriver>>,
        load: LoadGenerator,
    ) -> Self {
        let retry = RetryController::new(config.max_mutation_retries_backoff);
        Self {
            index,
            config,
            termination,
            retry,
            history,
            sut,
            oracle,
            load,
            result: ProcessResult::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Runs until the termination signal is set or a fatal error is hit,
    /// then commits the history store, tears down both drivers, and
    /// returns this worker's result. A fatal error (anything other than a
    /// driver or validation mismatch — a history store I/O failure, for
    /// instance) always stops the worker regardless of `fail_fast`, and is
    /// propagated to the caller so the run as a whole reports failure.
    pub async fn run(mut self) -> anyhow::Result<ProcessResult> {
        let mut fatal = None;

        loop {
            if self.termination.should_stop() {
                break;
            }

            let (operation, dto, attempt) = if !self.retry.is_empty() {
                tokio::select! {
                    biased;
                    _ = self.termination.stopped() => break,
                    ready = self.retry.next_ready() => ready,
                }
            } else {
                let (operation, dto) = self.load.next_query();
                (operation, dto, 0usize)
            };

            match self.execute_once(operation, &dto).await {
                Ok(()) => {
                    self.result.increment_ops(operation);
                }
                Err(OperationError::Fatal(err)) => {
                    tracing::error!(error = %err, worker = self.index, "fatal error, stopping worker");
                    self.termination.request_stop();
                    fatal = Some(err);
                    break;
                }
                Err(err) => {
                    tracing::warn!(error = %err, worker = self.index, attempt, "operation failed, will retry");
                    if attempt >= self.config.max_mutation_retries {
                        self.result.increment_errors(operation);
                        if self.config.fail_fast {
                            self.termination.request_stop();
                        }
                    } else {
                        self.retry.enqueue(operation, dto, attempt + 1);
                    }
                }
            }
        }

        let _ = self.history.commit();
        let _ = self.sut.teardown().await;
        if let Some(oracle) = &self.oracle {
            let _ = oracle.teardown().await;
        }

        match fatal {
            Some(err) => Err(err.context("worker loop stopped by a fatal error")),
            None => Ok(self.result),
        }
    }

    async fn execute_once(
        &self,
        operation: Operation,
        dto: &crate::query::QueryDto,
    ) -> Result<(), OperationError> {
        let sut_rows = self.sut.execute(&dto.statement, &dto.values).await?;

        if operation == Operation::Write {
            self.history.insert(&dto.values).context("failed to record write in history store")?;
        }

        if let Some(oracle) = &self.oracle {
            let oracle_rows = oracle.execute(&dto.statement, &dto.values).await?;
            validator::validate(&oracle_rows, &sut_rows)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{Column, ColumnKind};
    use crate::driver::InMemoryDriver;
    use crate::query::InsertQueryGenerator;
    use crate::schema::Table;
    use scylla::frame::response::result::CqlValue;
    use std::time::Duration;

    fn sample_table() -> Table {
        Table {
            name: "table0".to_string(),
            partition_key: vec![Column::new("pk0", ColumnKind::BigInt, 1)],
            clustering_key: vec![Column::new("ck0", ColumnKind::BigInt, 1)],
            columns: vec![Column::new("col0", ColumnKind::Ascii { length: 4 }, 1)],
        }
    }

    fn worker_config() -> WorkerConfig {
        WorkerConfig {
            max_mutation_retries: 2,
            max_mutation_retries_backoff: Duration::from_millis(5),
            fail_fast: false,
        }
    }

    #[tokio::test]
    #[ntest::timeout(2000)]
    async fn worker_stops_and_reports_write_ops_when_signalled() {
        let table = sample_table();
        let dir = tempfile::tempdir().unwrap();
        let history = Arc::new(HistoryStore::open(dir.path(), 0, "ks", &table, false).unwrap());
        let sut: Arc<dyn QueryDriver> = Arc::new(InMemoryDriver::new());
        let load = LoadGenerator::new(vec![Box::new(InsertQueryGenerator::new(
            &table,
            "ks",
            1,
            vec![vec![CqlValue::BigInt(1)]],
        ))]);

        let termination = TerminationSignal::new();
        let worker = Worker::new(0, worker_config(), termination.clone(), history, sut, None, load);

        let stopper = termination.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stopper.request_stop();
        });

        let result = worker.run().await.unwrap();
        assert!(result.write_ops > 0);
        assert_eq!(result.write_errors, 0);
    }
}
