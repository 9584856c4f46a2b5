//! Load generation (component F): multiplexes one or more per-table
//! [`QueryGenerator`]s into a single round-robin stream, the way the
//! Python `LoadGenerator` cycles through one generator per table (plus,
//! in mixed mode, one insert and one select generator per table).

use crate::query::{Operation, QueryDto, QueryGenerator};

pub struct LoadGenerator {
    generators: Vec<Box<dyn QueryGenerator>>,
    next: usize,
}

impl LoadGenerator {
    pub fn new(generators: Vec<Box<dyn QueryGenerator>>) -> Self {
        assert!(!generators.is_empty(), "load generator needs at least one query generator");
        Self { generators, next: 0 }
    }

    /// Returns the next statement, fairly round-robining across every
    /// underlying generator: no generator is starved in favor of another.
    pub fn next_query(&mut self) -> (Operation, QueryDto) {
        let query = self.generators[self.next].next_query();
        self.next = (self.next + 1) % self.generators.len();
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{Column, ColumnKind};
    use crate::query::InsertQueryGenerator;
    use crate::schema::Table;
    use scylla::frame::response::result::CqlValue;

    fn table(name: &str) -> Table {
        Table {
            name: name.to_string(),
            partition_key: vec![Column::new("pk0", ColumnKind::BigInt, 1)],
            clustering_key: vec![Column::new("ck0", ColumnKind::BigInt, 1)],
            columns: vec![],
        }
    }

    #[test]
    fn round_robins_fairly_across_generators() {
        let t0 = table("t0");
        let t1 = table("t1");
        let partitions = vec![vec![CqlValue::BigInt(1)]];
        let g0 = Box::new(InsertQueryGenerator::new(&t0, "ks", 1, partitions.clone()));
        let g1 = Box::new(InsertQueryGenerator::new(&t1, "ks", 2, partitions));
        let mut load = LoadGenerator::new(vec![g0, g1]);

        let (_, first) = load.next_query();
        let (_, second) = load.next_query();
        let (_, third) = load.next_query();

        assert!(first.statement.contains("t0"));
        assert!(second.statement.contains("t1"));
        assert!(third.statement.contains("t0"));
    }
}
