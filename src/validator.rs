//! Result validation (component H): compares the oracle's and the SUT's
//! rows for the same query, the way the Python `validate_result` walks
//! both result sets with `itertools.zip_longest` so that a row present on
//! one side and missing on the other is a mismatch rather than silently
//! ignored.

use itertools::{EitherOrBoth, Itertools};

use crate::driver::Row;
use crate::error::ValidationError;

/// Compares two result sets row by row, in order. Fails on the first
/// position where the two sides disagree, including when one side has
/// more rows than the other.
pub fn validate(oracle: &[Row], sut: &[Row]) -> Result<(), ValidationError> {
    for pair in oracle.iter().zip_longest(sut.iter()) {
        match pair {
            EitherOrBoth::Both(o, s) => {
                if o != s {
                    return Err(ValidationError {
                        expected: Some(o.clone()),
                        actual: Some(s.clone()),
                    });
                }
            }
            EitherOrBoth::Left(o) => {
                return Err(ValidationError {
                    expected: Some(o.clone()),
                    actual: None,
                });
            }
            EitherOrBoth::Right(s) => {
                return Err(ValidationError {
                    expected: None,
                    actual: Some(s.clone()),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scylla::frame::response::result::CqlValue;

    fn row(v: i64) -> Row {
        vec![CqlValue::BigInt(v)]
    }

    #[test]
    fn identical_result_sets_validate() {
        let oracle = vec![row(1), row(2)];
        let sut = vec![row(1), row(2)];
        assert!(validate(&oracle, &sut).is_ok());
    }

    #[test]
    fn both_empty_validates() {
        assert!(validate(&[], &[]).is_ok());
    }

    #[test]
    fn mismatched_value_fails() {
        let oracle = vec![row(1)];
        let sut = vec![row(2)];
        assert!(validate(&oracle, &sut).is_err());
    }

    #[test]
    fn extra_row_on_either_side_fails() {
        let oracle = vec![row(1), row(2)];
        let sut = vec![row(1)];
        assert!(validate(&oracle, &sut).is_err());
        assert!(validate(&sut, &oracle).is_err());
    }
}
