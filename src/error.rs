use crate::driver::Row;

/// Error raised by a [`crate::driver::QueryDriver`] implementation.
///
/// Wraps the underlying transport/protocol failure behind a single
/// categorized type so that the worker loop can tell a driver failure
/// apart from a fatal, non-retryable error without downcasting.
#[derive(Debug, thiserror::Error)]
#[error("query driver error")]
pub struct QueryDriverError(#[source] pub anyhow::Error);

impl QueryDriverError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(err.into())
    }
}

/// Raised by [`crate::validator::validate`] when the oracle and SUT results
/// for the same query disagree.
#[derive(Debug, thiserror::Error)]
#[error("validation mismatch: expected {expected:?}, actual {actual:?}")]
pub struct ValidationError {
    pub expected: Option<Row>,
    pub actual: Option<Row>,
}

/// `Driver` and `Validation` are the two kinds the worker retries up to
/// `max_mutation_retries` times; `Fatal` is everything else (a history
/// store I/O failure, for instance) and always tears the worker down.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error(transparent)]
    Driver(#[from] QueryDriverError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("fatal error: {0}")]
    Fatal(anyhow::Error),
}

impl From<anyhow::Error> for OperationError {
    fn from(err: anyhow::Error) -> Self {
        OperationError::Fatal(err)
    }
}
