use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use gemini::config::duration::parse_duration;
use gemini::config::{Configuration, QueryMode, SchemaShapeBounds};
use gemini::orchestrator;
use gemini::result::GeminiResult;

/// Differential random-testing engine for Cassandra-compatible databases.
#[derive(Parser, Debug)]
#[command(name = "gemini", version, about)]
struct Args {
    #[arg(long, value_enum, default_value = "write")]
    mode: CliQueryMode,

    #[arg(long, short = 't', value_delimiter = ',')]
    test_cluster: Vec<String>,

    #[arg(long, short = 'o', value_delimiter = ',', default_value = "")]
    oracle_cluster: Vec<String>,

    #[arg(long, default_value_t = false)]
    drop_schema: bool,

    #[arg(long, default_value = "3s")]
    duration: String,

    #[arg(long, default_value_t = 10_000)]
    token_range_slices: usize,

    #[arg(long, short = 'c', default_value_t = 4)]
    concurrency: usize,

    #[arg(long, short = 's', default_value_t = 0)]
    seed: i64,

    #[arg(long, default_value_t = 1)]
    max_tables: usize,
    #[arg(long, default_value_t = 1)]
    min_partition_keys: usize,
    #[arg(long, default_value_t = 1)]
    max_partition_keys: usize,
    #[arg(long, default_value_t = 1)]
    min_clustering_keys: usize,
    #[arg(long, default_value_t = 1)]
    max_clustering_keys: usize,
    #[arg(long, default_value_t = 1)]
    min_columns: usize,
    #[arg(long, default_value_t = 5)]
    max_columns: usize,

    #[arg(long, short = 'f', default_value_t = false)]
    fail_fast: bool,

    #[arg(long, default_value_t = 2)]
    max_mutation_retries: usize,

    #[arg(long, default_value = "500ms")]
    max_mutation_retries_backoff: String,

    #[arg(long)]
    outfile: Option<PathBuf>,

    #[arg(long, default_value = "gemini_history")]
    history_dir: PathBuf,

    #[arg(long, default_value = "gemini")]
    keyspace: String,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliQueryMode {
    Write,
    Read,
    Mixed,
}

impl From<CliQueryMode> for QueryMode {
    fn from(mode: CliQueryMode) -> Self {
        match mode {
            CliQueryMode::Write => QueryMode::Write,
            CliQueryMode::Read => QueryMode::Read,
            CliQueryMode::Mixed => QueryMode::Mixed,
        }
    }
}

fn build_configuration(args: Args) -> anyhow::Result<Configuration> {
    let duration = parse_duration(&args.duration).map_err(|e| anyhow::anyhow!(e))?;
    let max_mutation_retries_backoff =
        parse_duration(&args.max_mutation_retries_backoff).map_err(|e| anyhow::anyhow!(e))?;

    Ok(Configuration {
        mode: args.mode.into(),
        test_cluster: args.test_cluster,
        oracle_cluster: args.oracle_cluster.into_iter().filter(|s| !s.is_empty()).collect(),
        drop_schema: args.drop_schema,
        duration,
        token_range_slices: args.token_range_slices,
        concurrency: args.concurrency,
        seed: args.seed,
        schema_shape: SchemaShapeBounds {
            max_tables: args.max_tables,
            min_partition_keys: args.min_partition_keys,
            max_partition_keys: args.max_partition_keys,
            min_clustering_keys: args.min_clustering_keys,
            max_clustering_keys: args.max_clustering_keys,
            min_columns: args.min_columns,
            max_columns: args.max_columns,
        },
        fail_fast: args.fail_fast,
        max_mutation_retries: args.max_mutation_retries,
        max_mutation_retries_backoff,
        outfile: args.outfile,
        history_dir: args.history_dir,
        keyspace: args.keyspace,
    })
}

fn render_result(result: &gemini::result::ProcessResult, outfile: &Option<PathBuf>) -> anyhow::Result<()> {
    let envelope = GeminiResult::new(*result);
    let json = serde_json::to_string_pretty(&envelope)?;
    match outfile {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let outfile = args.outfile.clone();

    let config = match build_configuration(args) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return std::process::ExitCode::from(1);
        }
    };

    let (controller, run_future) = match orchestrator::run(config) {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!(error = %err, "failed to start run");
            return std::process::ExitCode::from(1);
        }
    };

    tokio::pin!(run_future);

    let mut sigint_count = 0u32;
    let result = loop {
        tokio::select! {
            result = &mut run_future => break result,
            _ = tokio::signal::ctrl_c() => {
                sigint_count += 1;
                if sigint_count == 1 {
                    tracing::warn!("interrupt received, asking workers to stop");
                    controller.ask_to_stop();
                } else {
                    tracing::warn!("second interrupt received, aborting");
                    controller.abort();
                }
            }
        }
    };

    match result {
        Ok(process_result) => {
            if let Err(err) = render_result(&process_result, &outfile) {
                tracing::error!(error = %err, "failed to render result");
                return std::process::ExitCode::from(1);
            }
            if sigint_count > 0 {
                std::process::ExitCode::from(130)
            } else if process_result.has_errors() {
                std::process::ExitCode::from(1)
            } else {
                std::process::ExitCode::SUCCESS
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            if sigint_count > 0 {
                std::process::ExitCode::from(130)
            } else {
                std::process::ExitCode::from(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_flags_parse_through_configuration() {
        let args = Args::parse_from([
            "gemini",
            "--test-cluster",
            "127.0.0.1",
            "--duration",
            "1h30m",
            "--max-mutation-retries-backoff",
            "10ms",
        ]);
        let config = build_configuration(args).unwrap();
        assert_eq!(config.duration, Duration::from_secs(3600 + 30 * 60));
        assert_eq!(config.max_mutation_retries_backoff, Duration::from_millis(10));
    }
}
