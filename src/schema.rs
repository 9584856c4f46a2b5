//! Schema generation (component C): keyspace/table layout and the DDL
//! needed to create and drop it.
//!
//! DDL is built by hand with `format!`, the way the teacher's
//! `SchemaOption::construct_keyspace_creation_query` builds its `CREATE
//! KEYSPACE` statement — there's no templating crate in the dependency
//! stack, and one string per statement doesn't need one.

use rand::{Rng, SeedableRng};

use crate::column::{Column, ALL_COLUMN_TYPES};
use crate::config::SchemaShapeBounds;

/// How a keyspace replicates its data across the cluster.
#[derive(Debug, Clone)]
pub enum ReplicationStrategy {
    SimpleStrategy { replication_factor: u32 },
    NetworkTopologyStrategy { datacenters: Vec<(String, u32)> },
}

impl Default for ReplicationStrategy {
    fn default() -> Self {
        ReplicationStrategy::SimpleStrategy {
            replication_factor: 1,
        }
    }
}

impl ReplicationStrategy {
    fn as_cql(&self) -> String {
        match self {
            ReplicationStrategy::SimpleStrategy { replication_factor } => format!(
                "{{'class': 'SimpleStrategy', 'replication_factor': {replication_factor}}}"
            ),
            ReplicationStrategy::NetworkTopologyStrategy { datacenters } => {
                let mut opts = String::from("{'class': 'NetworkTopologyStrategy'");
                for (dc, rf) in datacenters {
                    opts.push_str(&format!(", '{dc}': {rf}"));
                }
                opts.push('}');
                opts
            }
        }
    }
}

/// A single generated table: a partition key, a clustering key, and a set
/// of regular columns.
pub struct Table {
    pub name: String,
    pub partition_key: Vec<Column>,
    pub clustering_key: Vec<Column>,
    pub columns: Vec<Column>,
}

impl Table {
    /// Fresh, independently-seeded generators for the clustering key and
    /// regular columns, for a generator that needs to own mutable column
    /// state without sharing it with anything else reading this table's
    /// metadata. Seeded from `seed`, so two callers passing the same seed
    /// get identical value streams even though the `Column`s themselves
    /// aren't shared.
    pub fn fresh_value_columns(&self, seed: i64) -> Vec<Column> {
        self.clustering_key
            .iter()
            .chain(self.columns.iter())
            .map(|c| Column::new(c.name().to_string(), c.kind(), seed))
            .collect()
    }

    pub fn all_column_names(&self) -> Vec<&str> {
        self.partition_key
            .iter()
            .chain(self.clustering_key.iter())
            .chain(self.columns.iter())
            .map(Column::name)
            .collect()
    }

    pub fn partition_key_names(&self) -> Vec<&str> {
        self.partition_key.iter().map(Column::name).collect()
    }

    pub fn full_key_names(&self) -> Vec<&str> {
        self.partition_key
            .iter()
            .chain(self.clustering_key.iter())
            .map(Column::name)
            .collect()
    }

    /// The `CREATE TABLE` statement for this table.
    pub fn create_statement(&self, keyspace: &str) -> String {
        let mut columns = String::new();
        for col in self
            .partition_key
            .iter()
            .chain(self.clustering_key.iter())
            .chain(self.columns.iter())
        {
            columns.push_str(&format!("{} {}, ", col.name(), col.cql_type()));
        }

        let pk = self.partition_key_names().join(", ");
        let pk_clause = if self.partition_key.len() > 1 { format!("({pk})") } else { pk };
        let ck = self.clustering_key_names_joined();
        let key = if ck.is_empty() {
            pk_clause
        } else {
            format!("{pk_clause}, {ck}")
        };

        format!(
            "CREATE TABLE IF NOT EXISTS {keyspace}.{name} ({columns}PRIMARY KEY ({key}))",
            name = self.name,
        )
    }

    fn clustering_key_names_joined(&self) -> String {
        self.clustering_key
            .iter()
            .map(Column::name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn drop_statement(&self, keyspace: &str) -> String {
        format!("DROP TABLE IF EXISTS {keyspace}.{}", self.name)
    }

    /// The SQLite-side mirror table DDL used by the history store: an
    /// autoincrementing `id`, a `d_time` deletion timestamp (always written
    /// `NULL` on insert), and the partition/clustering key columns — regular
    /// columns aren't mirrored. The `UNIQUE` constraint over the key columns
    /// is what lets the history store's `INSERT OR REPLACE` supersede a
    /// previously stored key instead of appending a duplicate row.
    pub fn as_sql(&self, keyspace: &str) -> String {
        let key_columns: Vec<_> = self.partition_key.iter().chain(self.clustering_key.iter()).collect();
        let columns_ddl: String = key_columns
            .iter()
            .map(|c| format!(", {} {}", c.name(), c.sql_type()))
            .collect();
        let key_names = key_columns.iter().map(|c| c.name()).collect::<Vec<_>>().join(", ");

        format!(
            "CREATE TABLE IF NOT EXISTS '{keyspace}.{name}' (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             d_time INTEGER{columns_ddl}, UNIQUE({key_names}))",
            name = self.name,
        )
    }
}

/// A single generated keyspace: its replication strategy and the tables
/// it contains.
pub struct Keyspace {
    pub name: String,
    pub replication: ReplicationStrategy,
    pub tables: Vec<Table>,
}

impl Keyspace {
    pub fn create_statement(&self) -> String {
        format!(
            "CREATE KEYSPACE IF NOT EXISTS \"{}\" WITH REPLICATION = {}",
            self.name,
            self.replication.as_cql()
        )
    }

    pub fn drop_statement(&self) -> String {
        format!("DROP KEYSPACE IF EXISTS \"{}\"", self.name)
    }

    /// The history store mirror DDL for every table in the keyspace, per
    /// `Table::as_sql`.
    pub fn as_sql(&self) -> Vec<String> {
        self.tables.iter().map(|table| table.as_sql(&self.name)).collect()
    }
}

/// Generates a random keyspace with `table_count` tables, each with
/// partition/clustering key and column counts drawn from `bounds`, and
/// concrete column types drawn from [`ALL_COLUMN_TYPES`].
///
/// `seed` drives every structural choice (counts, types) and, XORed per
/// table, each generated [`Column`]'s own value seed, so the whole schema
/// is reproducible from `seed` alone.
pub fn generate_schema(
    seed: i64,
    keyspace_name: impl Into<String>,
    table_count: usize,
    bounds: &SchemaShapeBounds,
) -> Keyspace {
    let mut rng = rand_pcg::Pcg64::seed_from_u64(seed as u64);
    let mut tables = Vec::with_capacity(table_count);

    let mut random_kind = |rng: &mut rand_pcg::Pcg64| ALL_COLUMN_TYPES[rng.gen_range(0..ALL_COLUMN_TYPES.len())];

    for table_idx in 0..table_count {
        let table_seed = seed ^ (table_idx as i64);

        let np = rng.gen_range(bounds.min_partition_keys..=bounds.max_partition_keys);
        let nc = rng.gen_range(bounds.min_clustering_keys..=bounds.max_clustering_keys);
        let ncol = rng.gen_range(bounds.min_columns..=bounds.max_columns);

        let partition_key = (0..np)
            .map(|i| Column::new(format!("pk{i}"), random_kind(&mut rng), table_seed))
            .collect();
        let clustering_key = (0..nc)
            .map(|i| Column::new(format!("ck{i}"), random_kind(&mut rng), table_seed))
            .collect();
        let columns = (0..ncol)
            .map(|i| Column::new(format!("col{i}"), random_kind(&mut rng), table_seed))
            .collect();

        tables.push(Table {
            name: format!("table{table_idx}"),
            partition_key,
            clustering_key,
            columns,
        });
    }

    Keyspace {
        name: keyspace_name.into(),
        replication: ReplicationStrategy::default(),
        tables,
    }
}

/// A worker's slice of the partition-key space for one table: `slice_size`
/// partition-key tuples, generated from a seed unique to `worker_index` so
/// that no two workers' slices are expected to collide.
pub fn generate_partition_slice(
    table: &Table,
    seed: i64,
    worker_index: usize,
    slice_size: usize,
) -> Vec<Vec<scylla::frame::response::result::CqlValue>> {
    let worker_seed = seed ^ (worker_index as i64 + 1);
    let mut columns: Vec<Column> = table
        .partition_key
        .iter()
        .map(|c| Column::new(c.name().to_string(), c.kind(), worker_seed))
        .collect();

    (0..slice_size)
        .map(|_| columns.iter_mut().map(Column::generate_random_value).collect())
        .collect()
}
