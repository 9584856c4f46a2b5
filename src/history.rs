//! Write history store (component D).
//!
//! Each worker keeps a small embedded SQLite database mirroring the
//! partition/clustering key of every row it has written (an
//! `id`/`d_time`/key-columns `HistoryRow`, per `Schema::as_sql`), so that a
//! later `READ` operation for that worker can pick a key it knows exists
//! instead of guessing one at random and getting an empty result for free.
//! Ported from the Python implementation's `sqlite3`-backed `HistoryStore`,
//! one file per worker.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use rusqlite::types::Value;
use rusqlite::{Connection, ToSql};
use scylla::frame::response::result::CqlValue;

use crate::column::ColumnKind;
use crate::schema::Table;

fn cql_value_to_sql(value: &CqlValue) -> Box<dyn ToSql> {
    match value {
        CqlValue::BigInt(v) => Box::new(*v),
        CqlValue::Int(v) => Box::new(*v),
        CqlValue::Text(v) => Box::new(v.clone()),
        other => Box::new(format!("{other:?}")),
    }
}

fn sql_value_to_cql(value: Value, kind: ColumnKind) -> CqlValue {
    match (kind, value) {
        (ColumnKind::BigInt, Value::Integer(i)) => CqlValue::BigInt(i),
        (ColumnKind::Ascii { .. }, Value::Text(s)) => CqlValue::Text(s),
        (_, Value::Null) => CqlValue::Empty,
        (ColumnKind::BigInt, other) => panic!("expected integer in history store, got {other:?}"),
        (ColumnKind::Ascii { .. }, other) => panic!("expected text in history store, got {other:?}"),
    }
}

/// Records every row written to a single table, so that reads can be
/// targeted at keys known to exist.
///
/// Writes are batched in process memory: `insert` runs inside a long-lived
/// SQLite transaction that only hits disk on `commit`. Reads issued through
/// the same connection see those uncommitted writes regardless — SQLite
/// always shows a connection its own pending changes — so `commit` is only
/// needed for durability across a crash or a later reopen, not for
/// same-process read-your-writes.
pub struct HistoryStore {
    conn: Connection,
    table_name: String,
    key_column_names: Vec<String>,
    key_column_kinds: Vec<ColumnKind>,
    key_column_count: usize,
    rows_count: AtomicU64,
}

impl HistoryStore {
    /// Opens (creating if necessary) the history database for worker
    /// `worker_index`, tracking `table`'s partition and clustering keys.
    ///
    /// `path` is the directory the per-worker `.db` files live in. Restores
    /// `rows_count` with `SELECT COUNT(*)` rather than the spec's literal
    /// `SELECT MAX(id)`: the `UNIQUE(pk, ck…)` constraint needed for
    /// `INSERT OR REPLACE` to supersede an existing key (rather than append
    /// a duplicate row) makes SQLite reassign `id` on conflict, so `id`
    /// develops gaps and stops tracking the physical row count.
    pub fn open(
        path: &std::path::Path,
        worker_index: usize,
        keyspace: &str,
        table: &Table,
        drop_schema: bool,
    ) -> rusqlite::Result<Self> {
        let db_path = path.join(format!("gemini_{worker_index}.db"));
        let conn = Connection::open(db_path)?;
        let table_name = format!("{keyspace}.{}", table.name);

        if drop_schema {
            conn.execute(&format!("DROP TABLE IF EXISTS '{table_name}'"), [])?;
        }

        let key_columns: Vec<_> = table.partition_key.iter().chain(table.clustering_key.iter()).collect();
        let key_column_names: Vec<String> = key_columns.iter().map(|c| c.name().to_string()).collect();
        let key_column_kinds: Vec<_> = key_columns.iter().map(|c| c.kind()).collect();

        conn.execute(&table.as_sql(keyspace), [])?;

        let rows_count: u64 = conn.query_row(&format!("SELECT COUNT(*) FROM '{table_name}'"), [], |row| {
            row.get::<_, i64>(0)
        })? as u64;

        conn.execute_batch("BEGIN")?;

        Ok(Self {
            conn,
            table_name,
            key_column_count: key_column_kinds.len(),
            key_column_kinds,
            key_column_names,
            rows_count: AtomicU64::new(rows_count),
        })
    }

    /// Records the partition/clustering key portion of a written row, with
    /// `d_time` written `NULL`. Caller passes the full row; only the first
    /// `key_column_count` values (partition key followed by clustering key,
    /// in schema order) are stored.
    ///
    /// `INSERT OR REPLACE` makes SQLite report two rows changed when it
    /// supersedes an existing key (the implicit delete, then the insert)
    /// versus one for a genuinely new key — that distinction is how
    /// `rows_count` tracks the physical row count instead of the raw call
    /// count.
    pub fn insert(&self, row: &[CqlValue]) -> rusqlite::Result<()> {
        let key_values = &row[..self.key_column_count];
        let placeholders = vec!["?"; key_values.len()].join(", ");
        let columns = format!("d_time, {}", self.key_column_names.join(", "));
        let statement = format!(
            "INSERT OR REPLACE INTO '{}' ({columns}) VALUES (NULL, {placeholders})",
            self.table_name,
        );
        let params: Vec<Box<dyn ToSql>> = key_values.iter().map(cql_value_to_sql).collect();
        let params_ref: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let changed = self.conn.execute(&statement, params_ref.as_slice())?;
        if changed <= 1 {
            self.rows_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Flushes batched inserts to disk and opens a fresh transaction for
    /// subsequent writes. Called at worker termination.
    pub fn commit(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch("COMMIT; BEGIN;")
    }

    /// The number of distinct partition/clustering keys currently stored.
    pub fn rows_count(&self) -> u64 {
        self.rows_count.load(Ordering::Relaxed)
    }

    /// Picks a uniformly random previously-written key, or `None` if
    /// nothing has been written yet.
    ///
    /// Draws an offset uniformly from `[0, rows_count)` and reads the row
    /// at that ordinal position (ordered by `id`) rather than looking up a
    /// literal random `id` value, since `id` isn't dense once `insert` has
    /// superseded any keys (see `open`'s doc comment).
    pub fn get_random_row(&self) -> rusqlite::Result<Option<Vec<CqlValue>>> {
        let rows_count = self.rows_count();
        if rows_count == 0 {
            return Ok(None);
        }
        let offset = rand::thread_rng().gen_range(0..rows_count);

        let query = format!(
            "SELECT {} FROM '{}' ORDER BY id LIMIT 1 OFFSET ?1",
            self.key_column_names.join(", "),
            self.table_name
        );
        let mut stmt = self.conn.prepare(&query)?;
        let mut rows = stmt.query([offset as i64])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let values = self
            .key_column_kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| sql_value_to_cql(row.get(i).expect("column present"), *kind))
            .collect();
        Ok(Some(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{Column, ColumnKind};
    use crate::schema::Table;

    fn sample_table() -> Table {
        Table {
            name: "table0".to_string(),
            partition_key: vec![Column::new("pk0", ColumnKind::BigInt, 1)],
            clustering_key: vec![Column::new("ck0", ColumnKind::BigInt, 1)],
            columns: vec![Column::new("col0", ColumnKind::Ascii { length: 4 }, 1)],
        }
    }

    #[test]
    fn insert_then_get_random_row_round_trips_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let table = sample_table();
        let store = HistoryStore::open(dir.path(), 0, "ks", &table, false).unwrap();

        store
            .insert(&[CqlValue::BigInt(7), CqlValue::BigInt(11), CqlValue::Text("x".into())])
            .unwrap();
        store.commit().unwrap();

        let row = store.get_random_row().unwrap().unwrap();
        assert_eq!(row, vec![CqlValue::BigInt(7), CqlValue::BigInt(11)]);
    }

    #[test]
    fn get_random_row_is_none_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = sample_table();
        let store = HistoryStore::open(dir.path(), 1, "ks", &table, false).unwrap();
        assert!(store.get_random_row().unwrap().is_none());
    }

    #[test]
    fn replacing_the_same_key_does_not_grow_the_row_count() {
        let dir = tempfile::tempdir().unwrap();
        let table = sample_table();
        let store = HistoryStore::open(dir.path(), 2, "ks", &table, false).unwrap();

        store
            .insert(&[CqlValue::BigInt(7), CqlValue::BigInt(11), CqlValue::Text("x".into())])
            .unwrap();
        store
            .insert(&[CqlValue::BigInt(7), CqlValue::BigInt(11), CqlValue::Text("y".into())])
            .unwrap();

        assert_eq!(store.rows_count(), 1);
    }

    #[test]
    fn reopening_after_commit_restores_the_row_count() {
        let dir = tempfile::tempdir().unwrap();
        let table = sample_table();
        {
            let store = HistoryStore::open(dir.path(), 3, "ks", &table, false).unwrap();
            store
                .insert(&[CqlValue::BigInt(1), CqlValue::BigInt(2), CqlValue::Text("x".into())])
                .unwrap();
            store.commit().unwrap();
        }

        let reopened = HistoryStore::open(dir.path(), 3, "ks", &table, false).unwrap();
        assert_eq!(reopened.rows_count(), 1);
        assert!(reopened.get_random_row().unwrap().is_some());
    }
}
