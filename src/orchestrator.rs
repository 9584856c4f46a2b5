//! Orchestrator (component I): wires schema, drivers, and workers
//! together and drives one full run to completion.
//!
//! Grounded on the teacher's `run.rs`: a `RunController` holding a
//! one-shot stop sender and an `AbortHandle`, workers collected into a
//! `FuturesUnordered`, and a duration timer racing the stop signal via
//! `futures::future::select`.

use std::sync::Arc;

use futures::future;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::config::{Configuration, QueryMode};
use crate::driver::{NoOpDriver, QueryDriver, RealDriver};
use crate::history::HistoryStore;
use crate::load::LoadGenerator;
use crate::query::{InsertQueryGenerator, MixedQueryGenerator, QueryGenerator, SelectQueryGenerator};
use crate::result::ProcessResult;
use crate::schema::{self, Keyspace};
use crate::termination::TerminationSignal;
use crate::worker::{Worker, WorkerConfig};

/// External handle to a running orchestration: lets the caller (the CLI's
/// ctrl-c handler) ask workers to wind down gracefully, or abort the
/// whole run outright on a second interrupt.
pub struct RunController {
    stop_sender: Mutex<Option<oneshot::Sender<()>>>,
    abort_handle: AbortHandle,
    termination: TerminationSignal,
}

impl RunController {
    pub fn ask_to_stop(&self) {
        self.termination.request_stop();
        if let Some(sender) = self.stop_sender.lock().take() {
            let _ = sender.send(());
        }
    }

    pub fn abort(&self) {
        self.abort_handle.abort();
    }
}

async fn connect_driver(nodes: &[String]) -> anyhow::Result<Arc<dyn QueryDriver>> {
    if nodes.is_empty() {
        return Ok(Arc::new(NoOpDriver));
    }
    let driver = RealDriver::connect(nodes).await?;
    Ok(Arc::new(driver))
}

async fn apply_ddl(driver: &dyn QueryDriver, keyspace: &Keyspace, drop_schema: bool) -> anyhow::Result<()> {
    if drop_schema {
        driver.execute(&keyspace.drop_statement(), &[]).await?;
    }
    driver.execute(&keyspace.create_statement(), &[]).await?;
    for table in &keyspace.tables {
        driver.execute(&table.create_statement(&keyspace.name), &[]).await?;
    }
    Ok(())
}

fn build_load_generator(
    config: &Configuration,
    keyspace: &Keyspace,
    worker_index: usize,
    history_stores: &[Arc<HistoryStore>],
) -> LoadGenerator {
    let slice_size = (config.token_range_slices / config.concurrency).max(1);
    let mut generators: Vec<Box<dyn QueryGenerator>> = Vec::new();

    for (table, history) in keyspace.tables.iter().zip(history_stores.iter()) {
        let partitions = schema::generate_partition_slice(table, config.seed, worker_index, slice_size);
        match config.mode {
            QueryMode::Write => {
                generators.push(Box::new(InsertQueryGenerator::new(
                    table,
                    keyspace.name.as_str(),
                    config.seed,
                    partitions,
                )));
            }
            QueryMode::Read => {
                generators.push(Box::new(SelectQueryGenerator::new(
                    table,
                    keyspace.name.as_str(),
                    partitions,
                    history.clone(),
                )));
            }
            QueryMode::Mixed => {
                let write = InsertQueryGenerator::new(table, keyspace.name.as_str(), config.seed, partitions.clone());
                let read = SelectQueryGenerator::new(table, keyspace.name.as_str(), partitions, history.clone());
                generators.push(Box::new(MixedQueryGenerator::new(write, read)));
            }
        }
    }

    LoadGenerator::new(generators)
}

/// Runs the full gemini workload to completion and returns the aggregated
/// result, plus a controller the caller can use to stop it early.
pub fn run(config: Configuration) -> anyhow::Result<(Arc<RunController>, impl std::future::Future<Output = anyhow::Result<ProcessResult>>)> {
    anyhow::ensure!(!config.duration.is_zero(), "duration must be greater than zero");

    let (stop_tx, stop_rx) = oneshot::channel();
    let termination = TerminationSignal::new();

    let join_handle = tokio::spawn(do_run(config, termination.clone(), stop_rx));
    let abort_handle = join_handle.abort_handle();

    let controller = Arc::new(RunController {
        stop_sender: Mutex::new(Some(stop_tx)),
        abort_handle,
        termination,
    });

    let future = async move {
        match join_handle.await {
            Ok(result) => result,
            Err(join_err) if join_err.is_cancelled() => Err(anyhow::anyhow!("run was aborted")),
            Err(join_err) => Err(join_err.into()),
        }
    };

    Ok((controller, future))
}

async fn do_run(
    config: Configuration,
    termination: TerminationSignal,
    stop_rx: oneshot::Receiver<()>,
) -> anyhow::Result<ProcessResult> {
    std::fs::create_dir_all(&config.history_dir)?;

    let keyspace = Arc::new(schema::generate_schema(
        config.seed,
        config.keyspace.clone(),
        config.schema_shape.max_tables,
        &config.schema_shape,
    ));

    let ddl_sut = connect_driver(&config.test_cluster).await?;
    apply_ddl(ddl_sut.as_ref(), &keyspace, config.drop_schema).await?;
    ddl_sut.teardown().await?;

    if config.has_oracle() {
        let ddl_oracle = connect_driver(&config.oracle_cluster).await?;
        apply_ddl(ddl_oracle.as_ref(), &keyspace, config.drop_schema).await?;
        ddl_oracle.teardown().await?;
    }

    let config = Arc::new(config);
    let mut workers = FuturesUnordered::new();

    for worker_index in 0..config.concurrency {
        let config = config.clone();
        let keyspace = keyspace.clone();
        let termination = termination.clone();

        workers.push(tokio::spawn(async move {
            let history_stores: Vec<Arc<HistoryStore>> = keyspace
                .tables
                .iter()
                .map(|table| {
                    Arc::new(
                        HistoryStore::open(&config.history_dir, worker_index, &keyspace.name, table, config.drop_schema)
                            .expect("failed to open per-worker history store"),
                    )
                })
                .collect();

            let load = build_load_generator(&config, &keyspace, worker_index, &history_stores);
            let history = history_stores.into_iter().next().expect("schema has at least one table");

            let sut = connect_driver(&config.test_cluster)
                .await
                .expect("failed to connect worker's SUT driver");
            let oracle = if config.has_oracle() {
                Some(
                    connect_driver(&config.oracle_cluster)
                        .await
                        .expect("failed to connect worker's oracle driver"),
                )
            } else {
                None
            };

            let worker_config = WorkerConfig {
                max_mutation_retries: config.max_mutation_retries,
                max_mutation_retries_backoff: config.max_mutation_retries_backoff,
                fail_fast: config.fail_fast,
            };

            Worker::new(worker_index, worker_config, termination, history, sut, oracle, load)
                .run()
                .await
        }));
    }

    let duration_timer = Box::pin(tokio::time::sleep(config.duration));
    let stop_or_duration = future::select(stop_rx, duration_timer);
    tokio::spawn({
        let termination = termination.clone();
        async move {
            stop_or_duration.await;
            termination.request_stop();
        }
    });

    let mut total = ProcessResult::default();
    let mut first_fatal = None;
    while let Some(joined) = workers.next().await {
        match joined {
            Ok(Ok(result)) => total = total + result,
            Ok(Err(fatal)) => {
                termination.request_stop();
                first_fatal.get_or_insert(fatal);
            }
            Err(join_err) if join_err.is_cancelled() => {}
            Err(join_err) => return Err(join_err.into()),
        }
    }

    match first_fatal {
        Some(err) => Err(err),
        None => Ok(total),
    }
}

