//! Column value generators (component A).
//!
//! Each column owns a PRNG seeded deterministically from
//! `global_seed XOR hash(name)`, so that two columns constructed with the
//! same `(seed, name)` pair produce identical value streams — this is what
//! lets an independent worker process reconstruct the same schema values
//! another worker would have generated, without sharing any runtime state.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use scylla::frame::response::result::CqlValue;

const ASCII_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const DEFAULT_ASCII_LENGTH: usize = 100;

/// FNV-1a, used only to turn a column name into a PRNG seed component.
/// Not cryptographic; determinism, not unpredictability, is the goal here.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// The closed set of concrete column types the schema generator can draw
/// from. Extending this enum is how new column types are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Ascii { length: usize },
    BigInt,
}

impl ColumnKind {
    pub fn cql_type(&self) -> &'static str {
        match self {
            ColumnKind::Ascii { .. } => "ascii",
            ColumnKind::BigInt => "bigint",
        }
    }

    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Ascii { .. } => "TEXT",
            ColumnKind::BigInt => "INTEGER",
        }
    }
}

/// Enumerates the concrete column types available to schema generation.
/// See [`ColumnKind`] for the closed set of variants.
pub const ALL_COLUMN_TYPES: &[ColumnKind] = &[
    ColumnKind::Ascii {
        length: DEFAULT_ASCII_LENGTH,
    },
    ColumnKind::BigInt,
];

/// A single table column, capable of generating values for itself.
///
/// Two `Column`s constructed with the same `(seed, name)` produce the exact
/// same sequence of values no matter which process builds them.
pub struct Column {
    name: String,
    kind: ColumnKind,
    rng: Pcg64,
    seq: i64,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind, seed: i64) -> Self {
        let name = name.into();
        let column_seed = (seed as u64) ^ fnv1a(name.as_bytes());
        Self {
            rng: Pcg64::seed_from_u64(column_seed),
            name,
            kind,
            seq: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn cql_type(&self) -> &'static str {
        self.kind.cql_type()
    }

    pub fn sql_type(&self) -> &'static str {
        self.kind.sql_type()
    }

    /// Returns a fresh, uniformly random value in the column's domain.
    pub fn generate_random_value(&mut self) -> CqlValue {
        match self.kind {
            ColumnKind::Ascii { length } => CqlValue::Text(self.generate_ascii(length)),
            ColumnKind::BigInt => CqlValue::BigInt(self.rng.gen::<i64>()),
        }
    }

    /// Returns the next monotonically increasing value.
    ///
    /// Only numeric columns implement a real sequence; textual columns fall
    /// back to a fresh random value, since "the next ascii string" has no
    /// sensible meaning.
    pub fn generate_sequence_value(&mut self) -> CqlValue {
        match self.kind {
            ColumnKind::Ascii { .. } => self.generate_random_value(),
            ColumnKind::BigInt => {
                self.seq += 1;
                CqlValue::BigInt(self.seq)
            }
        }
    }

    fn generate_ascii(&mut self, length: usize) -> String {
        (0..length)
            .map(|_| {
                let idx = self.rng.gen_range(0..ASCII_ALPHABET.len());
                ASCII_ALPHABET[idx] as char
            })
            .collect()
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.cql_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_values_have_exact_length_and_alphabet() {
        let mut col = Column::new("col0", ColumnKind::Ascii { length: 37 }, 42);
        for _ in 0..20 {
            let CqlValue::Text(s) = col.generate_random_value() else {
                panic!("expected Text value");
            };
            assert_eq!(s.len(), 37);
            assert!(s.bytes().all(|b| b.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn bigint_sequence_starts_at_one_and_increments() {
        let mut col = Column::new("ck0", ColumnKind::BigInt, 7);
        for expected in 1..=5i64 {
            assert_eq!(col.generate_sequence_value(), CqlValue::BigInt(expected));
        }
    }

    #[test]
    fn identical_seed_and_name_reproduce_the_same_stream() {
        let mut a = Column::new("pk0", ColumnKind::BigInt, 1234);
        let mut b = Column::new("pk0", ColumnKind::BigInt, 1234);
        let stream_a: Vec<_> = (0..10).map(|_| a.generate_random_value()).collect();
        let stream_b: Vec<_> = (0..10).map(|_| b.generate_random_value()).collect();
        assert_eq!(stream_a, stream_b);
    }

    #[test]
    fn different_names_diverge() {
        let mut a = Column::new("pk0", ColumnKind::BigInt, 1234);
        let mut b = Column::new("pk1", ColumnKind::BigInt, 1234);
        assert_ne!(a.generate_random_value(), b.generate_random_value());
    }
}
