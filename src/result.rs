//! Process result accounting (component I).
//!
//! `ProcessResult` is a small commutative monoid — the Python dataclass
//! supports `+` so that per-process results can be summed with `sum()`
//! before being serialized; `Add` here is the same idea.

use std::ops::Add;

use serde::Serialize;

use crate::query::Operation;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessResult {
    pub write_ops: u64,
    pub write_errors: u64,
    pub read_ops: u64,
    pub read_errors: u64,
}

impl ProcessResult {
    pub fn increment_ops(&mut self, operation: Operation) {
        match operation {
            Operation::Write => self.write_ops += 1,
            Operation::Read => self.read_ops += 1,
        }
    }

    pub fn increment_errors(&mut self, operation: Operation) {
        match operation {
            Operation::Write => self.write_errors += 1,
            Operation::Read => self.read_errors += 1,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.write_errors > 0 || self.read_errors > 0
    }
}

impl Add for ProcessResult {
    type Output = ProcessResult;

    fn add(self, other: ProcessResult) -> ProcessResult {
        ProcessResult {
            write_ops: self.write_ops + other.write_ops,
            write_errors: self.write_errors + other.write_errors,
            read_ops: self.read_ops + other.read_ops,
            read_errors: self.read_errors + other.read_errors,
        }
    }
}

/// The top-level JSON envelope written to the results file / stdout.
#[derive(Debug, Serialize)]
pub struct GeminiResult {
    pub gemini_version: String,
    pub result: ProcessResult,
}

impl GeminiResult {
    pub fn new(result: ProcessResult) -> Self {
        Self {
            gemini_version: env!("CARGO_PKG_VERSION").to_string(),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sums_every_field() {
        let a = ProcessResult {
            write_ops: 1,
            write_errors: 2,
            read_ops: 3,
            read_errors: 4,
        };
        let b = ProcessResult {
            write_ops: 10,
            write_errors: 20,
            read_ops: 30,
            read_errors: 40,
        };
        let sum = a + b;
        assert_eq!(
            sum,
            ProcessResult {
                write_ops: 11,
                write_errors: 22,
                read_ops: 33,
                read_errors: 44,
            }
        );
    }

    #[test]
    fn default_is_the_additive_identity() {
        let a = ProcessResult {
            write_ops: 5,
            write_errors: 1,
            read_ops: 2,
            read_errors: 0,
        };
        assert_eq!(a + ProcessResult::default(), a);
    }

    #[test]
    fn has_errors_reflects_either_kind() {
        let mut result = ProcessResult::default();
        assert!(!result.has_errors());
        result.increment_errors(Operation::Read);
        assert!(result.has_errors());
    }

    #[test]
    fn serializes_to_the_expected_json_shape() {
        let envelope = GeminiResult::new(ProcessResult {
            write_ops: 1,
            write_errors: 0,
            read_ops: 2,
            read_errors: 0,
        });
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["result"]["write_ops"], 1);
        assert_eq!(json["result"]["read_ops"], 2);
        assert!(json["gemini_version"].is_string());
    }
}
