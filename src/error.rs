use crate::report::BatchReport;
use thiserror::Error;

/// The error type returned by methods in this crate.
#[derive(Error, Debug)]
pub enum Error<E> {
    /// The session could not be opened
    #[error("failed to connect: {0}")]
    Connect(E),
    /// The schema statement run before the batch failed
    #[error("schema bootstrap failed: {0}")]
    Bootstrap(RequestError<E>),
    /// Collection was aborted
    #[error(transparent)]
    Collect(#[from] CollectError),
}

/// Why a single request did not produce a payload.
///
/// These are recorded in the [`BatchReport`] and never stop a batch.
#[derive(Error, Debug)]
pub enum RequestError<E> {
    /// Session Errors
    #[error("{0}")]
    Session(E),
    /// The task running the request went away before sending a result
    #[error("request was dropped before it completed")]
    Canceled,
}

impl<E> From<E> for RequestError<E> {
    fn from(e: E) -> RequestError<E> {
        RequestError::Session(e)
    }
}

/// A payload came back, but not in the shape the batch expected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Wrong number of rows
    #[error("expected {expected} rows, got {actual}")]
    RowCount { expected: usize, actual: usize },
    /// Rejected by a caller supplied validator
    #[error("{0}")]
    Rejected(String),
}

/// Returned by the collector when it gives up on a batch.
#[derive(Error, Debug)]
pub enum CollectError {
    /// A payload failed validation under [`ValidationPolicy::Abort`].
    ///
    /// `partial` holds everything resolved so far, including `index` as a
    /// validation failure. The remaining handles were released without being
    /// awaited, so `resolved() + released() == submitted()`.
    ///
    /// [`ValidationPolicy::Abort`]: crate::ValidationPolicy::Abort
    #[error("request {index} returned an unexpected result: {source}")]
    Validation {
        index: usize,
        source: ValidationError,
        partial: Box<BatchReport>,
    },
}

impl CollectError {
    /// The report as it stood when collection stopped.
    pub fn partial_report(&self) -> &BatchReport {
        match self {
            CollectError::Validation { partial, .. } => partial,
        }
    }
}
