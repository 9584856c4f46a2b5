//! Run configuration (component L), assembled by the CLI layer and passed
//! down to the orchestrator. Plain data — no parsing logic lives here,
//! that's `duration` and the `clap` definitions in `bin/gemini`.

pub mod duration;

use std::path::PathBuf;
use std::time::Duration;

/// Which query generator mix a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Write,
    Read,
    Mixed,
}

/// Bounds on the random schema's shape: table count and per-table key/
/// column counts.
#[derive(Debug, Clone)]
pub struct SchemaShapeBounds {
    pub max_tables: usize,
    pub min_partition_keys: usize,
    pub max_partition_keys: usize,
    pub min_clustering_keys: usize,
    pub max_clustering_keys: usize,
    pub min_columns: usize,
    pub max_columns: usize,
}

impl Default for SchemaShapeBounds {
    fn default() -> Self {
        Self {
            max_tables: 1,
            min_partition_keys: 1,
            max_partition_keys: 1,
            min_clustering_keys: 1,
            max_clustering_keys: 1,
            min_columns: 1,
            max_columns: 5,
        }
    }
}

/// Everything a run needs, independent of how it was parsed from the CLI.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub mode: QueryMode,
    pub test_cluster: Vec<String>,
    pub oracle_cluster: Vec<String>,
    pub drop_schema: bool,
    pub duration: Duration,
    pub token_range_slices: usize,
    pub concurrency: usize,
    pub seed: i64,
    pub schema_shape: SchemaShapeBounds,
    pub fail_fast: bool,
    pub max_mutation_retries: usize,
    pub max_mutation_retries_backoff: Duration,
    pub outfile: Option<PathBuf>,
    pub history_dir: PathBuf,
    pub keyspace: String,
}

impl Configuration {
    pub fn has_oracle(&self) -> bool {
        !self.oracle_cluster.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_oracle_reflects_oracle_cluster_presence() {
        let mut config = Configuration {
            mode: QueryMode::Write,
            test_cluster: vec!["127.0.0.1".to_string()],
            oracle_cluster: vec![],
            drop_schema: false,
            duration: Duration::from_secs(3),
            token_range_slices: 10_000,
            concurrency: 4,
            seed: 0,
            schema_shape: SchemaShapeBounds::default(),
            fail_fast: false,
            max_mutation_retries: 2,
            max_mutation_retries_backoff: Duration::from_millis(500),
            outfile: None,
            history_dir: PathBuf::from("."),
            keyspace: "gemini".to_string(),
        };
        assert!(!config.has_oracle());
        config.oracle_cluster.push("127.0.0.2".to_string());
        assert!(config.has_oracle());
    }
}
