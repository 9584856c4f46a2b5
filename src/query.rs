//! Query generation (component E).
//!
//! A [`QueryGenerator`] is a lazy, infinite source of `(Operation, QueryDto)`
//! pairs for one table. It owns nothing about concurrency or retries —
//! that's [`crate::load::LoadGenerator`] and [`crate::retry::RetryController`]
//! — it only knows how to produce the next statement and its bound values.

use scylla::frame::response::result::CqlValue;

use crate::column::Column;
use crate::history::HistoryStore;
use crate::schema::Table;

/// Whether a generated statement is a mutation or a read, for stats
/// accounting and retry policy (only mutations are retried).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Write,
    Read,
}

/// A prepared-shape statement plus the values to bind to it for one
/// invocation.
#[derive(Debug, Clone)]
pub struct QueryDto {
    pub statement: String,
    pub values: Vec<CqlValue>,
}

impl QueryDto {
    pub fn new(statement: impl Into<String>, values: Vec<CqlValue>) -> Self {
        Self {
            statement: statement.into(),
            values,
        }
    }
}

/// Produces one `(Operation, QueryDto)` per call. Implementations are
/// infinite: there is no "done" state, only a running stream of statements.
pub trait QueryGenerator: Send {
    fn next_query(&mut self) -> (Operation, QueryDto);
}

/// Cycles through a fixed list of partition keys, inserting a full row
/// (partition key plus freshly generated clustering key and regular
/// columns) on each call.
pub struct InsertQueryGenerator {
    partitions: Vec<Vec<CqlValue>>,
    next_partition: usize,
    /// Fresh generators for the clustering key followed by the regular
    /// columns, owned exclusively by this generator so that `next_query`
    /// can mutate them without synchronization.
    value_columns: Vec<Column>,
    statement: String,
}

impl InsertQueryGenerator {
    pub fn new(table: &Table, keyspace: impl Into<String>, seed: i64, partitions: Vec<Vec<CqlValue>>) -> Self {
        assert!(!partitions.is_empty(), "insert generator needs at least one partition");
        let keyspace = keyspace.into();
        let columns = table.all_column_names().join(", ");
        let placeholders = vec!["?"; table.all_column_names().len()].join(", ");
        let statement = format!(
            "INSERT INTO {keyspace}.{table} ({columns}) VALUES ({placeholders})",
            table = table.name,
        );
        Self {
            partitions,
            next_partition: 0,
            value_columns: table.fresh_value_columns(seed),
            statement,
        }
    }
}

impl QueryGenerator for InsertQueryGenerator {
    fn next_query(&mut self) -> (Operation, QueryDto) {
        let partition = self.partitions[self.next_partition].clone();
        self.next_partition = (self.next_partition + 1) % self.partitions.len();

        let mut values = partition;
        values.extend(self.value_columns.iter_mut().map(Column::generate_random_value));

        (Operation::Write, QueryDto::new(self.statement.clone(), values))
    }
}

/// Selects a row by its full key, drawn from a worker's [`HistoryStore`]
/// when one has been written, or by falling back to an arbitrary
/// partition when the store is still empty.
pub struct SelectQueryGenerator {
    partitions: Vec<Vec<CqlValue>>,
    next_partition: usize,
    history: std::sync::Arc<HistoryStore>,
    statement_full_key: String,
    statement_partition_only: String,
}

impl SelectQueryGenerator {
    pub fn new(
        table: &Table,
        keyspace: impl Into<String>,
        partitions: Vec<Vec<CqlValue>>,
        history: std::sync::Arc<HistoryStore>,
    ) -> Self {
        assert!(!partitions.is_empty(), "select generator needs at least one partition");
        let keyspace = keyspace.into();
        let columns = table.all_column_names().join(", ");

        let full_key_clause = table
            .full_key_names()
            .iter()
            .map(|name| format!("{name} = ?"))
            .collect::<Vec<_>>()
            .join(" AND ");
        let statement_full_key = format!(
            "SELECT {columns} FROM {keyspace}.{table_name} WHERE {full_key_clause}",
            table_name = table.name,
        );

        let partition_clause = table
            .partition_key_names()
            .iter()
            .map(|name| format!("{name} = ?"))
            .collect::<Vec<_>>()
            .join(" AND ");
        let statement_partition_only = format!(
            "SELECT {columns} FROM {keyspace}.{table_name} WHERE {partition_clause}",
            table_name = table.name,
        );

        Self {
            partitions,
            next_partition: 0,
            history,
            statement_full_key,
            statement_partition_only,
        }
    }
}

impl QueryGenerator for SelectQueryGenerator {
    fn next_query(&mut self) -> (Operation, QueryDto) {
        match self.history.get_random_row() {
            Ok(Some(key)) => (Operation::Read, QueryDto::new(self.statement_full_key.clone(), key)),
            _ => {
                let partition = self.partitions[self.next_partition].clone();
                self.next_partition = (self.next_partition + 1) % self.partitions.len();
                (
                    Operation::Read,
                    QueryDto::new(self.statement_partition_only.clone(), partition),
                )
            }
        }
    }
}

/// Alternates between an insert and a select generator for the same
/// table, one call each per call to `next_query`.
pub struct MixedQueryGenerator {
    write: InsertQueryGenerator,
    read: SelectQueryGenerator,
    next_is_write: bool,
}

impl MixedQueryGenerator {
    pub fn new(write: InsertQueryGenerator, read: SelectQueryGenerator) -> Self {
        Self {
            write,
            read,
            next_is_write: true,
        }
    }
}

impl QueryGenerator for MixedQueryGenerator {
    fn next_query(&mut self) -> (Operation, QueryDto) {
        let is_write = self.next_is_write;
        self.next_is_write = !self.next_is_write;
        if is_write {
            self.write.next_query()
        } else {
            self.read.next_query()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{Column, ColumnKind};

    fn sample_table() -> Table {
        Table {
            name: "table0".to_string(),
            partition_key: vec![Column::new("pk0", ColumnKind::BigInt, 1)],
            clustering_key: vec![Column::new("ck0", ColumnKind::BigInt, 1)],
            columns: vec![Column::new("col0", ColumnKind::Ascii { length: 4 }, 1)],
        }
    }

    #[test]
    fn insert_generator_cycles_through_partitions() {
        let table = sample_table();
        let partitions = vec![vec![CqlValue::BigInt(1)], vec![CqlValue::BigInt(2)]];
        let mut gen = InsertQueryGenerator::new(&table, "ks", 1, partitions);

        let (op1, dto1) = gen.next_query();
        let (op2, dto2) = gen.next_query();
        let (op3, _) = gen.next_query();

        assert_eq!(op1, Operation::Write);
        assert_eq!(op2, Operation::Write);
        assert_eq!(op3, Operation::Write);
        assert_eq!(dto1.values[0], CqlValue::BigInt(1));
        assert_eq!(dto2.values[0], CqlValue::BigInt(2));
    }

    #[test]
    fn mixed_generator_alternates_write_then_read() {
        let table = sample_table();
        let dir = tempfile::tempdir().unwrap();
        let history =
            std::sync::Arc::new(crate::history::HistoryStore::open(dir.path(), 0, "ks", &table, false).unwrap());
        let partitions = vec![vec![CqlValue::BigInt(1)]];

        let write = InsertQueryGenerator::new(&table, "ks", 1, partitions.clone());
        let read = SelectQueryGenerator::new(&table, "ks", partitions, history);
        let mut mixed = MixedQueryGenerator::new(write, read);

        let (op1, _) = mixed.next_query();
        let (op2, _) = mixed.next_query();
        assert_eq!(op1, Operation::Write);
        assert_eq!(op2, Operation::Read);
    }
}
