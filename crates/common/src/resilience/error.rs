//! Errors surfaced by the retry executor.

use std::error::Error;
use std::fmt;
use std::io;
use std::time::Duration;

use crate::error::{CommonError, ErrorClassification, ErrorSeverity};

/// Terminal failure: the operation kept failing with descriptor exhaustion
/// until the retry budget ran out.
///
/// Carries the number of invocations made (`max_retries + 1`) and the last
/// underlying failure.
#[derive(Debug)]
pub struct ExhaustionFailure<E> {
    attempts_made: u32,
    last_error: E,
}

impl<E> ExhaustionFailure<E> {
    pub(crate) fn new(attempts_made: u32, last_error: E) -> Self {
        Self { attempts_made, last_error }
    }

    /// Total invocations of the operation, initial attempt included
    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn last_error(&self) -> &E {
        &self.last_error
    }

    pub fn into_last_error(self) -> E {
        self.last_error
    }
}

impl<E: fmt::Display> fmt::Display for ExhaustionFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "file descriptors still exhausted after {} attempts: {}",
            self.attempts_made, self.last_error
        )
    }
}

impl<E> Error for ExhaustionFailure<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.last_error)
    }
}

impl<E> ErrorClassification for ExhaustionFailure<E> {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl<E: fmt::Display> From<ExhaustionFailure<E>> for CommonError {
    fn from(failure: ExhaustionFailure<E>) -> Self {
        CommonError::resource_exhausted("file descriptors", failure.attempts_made)
    }
}

/// Result of running an operation through the retry executor
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Failure returned by the retry executor.
///
/// An unrelated failure comes back as [`RetryError::Operation`] holding the
/// operation's own error, unmodified and after a single invocation.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The operation failed with something other than exhaustion
    Operation(E),
    /// Exhaustion persisted through every retry
    Exhausted(ExhaustionFailure<E>),
}

impl<E> RetryError<E> {
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }

    /// Attempts made before giving up, for the terminal exhaustion path
    pub fn attempts_made(&self) -> Option<u32> {
        match self {
            Self::Operation(_) => None,
            Self::Exhausted(failure) => Some(failure.attempts_made()),
        }
    }

    pub fn exhaustion(&self) -> Option<&ExhaustionFailure<E>> {
        match self {
            Self::Operation(_) => None,
            Self::Exhausted(failure) => Some(failure),
        }
    }

    /// The unrelated failure, if this is one
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            Self::Exhausted(_) => None,
        }
    }

    /// The underlying failure in either case
    pub fn into_source(self) -> E {
        match self {
            Self::Operation(e) => e,
            Self::Exhausted(failure) => failure.into_last_error(),
        }
    }

    pub fn source_ref(&self) -> &E {
        match self {
            Self::Operation(e) => e,
            Self::Exhausted(failure) => failure.last_error(),
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation(e) => fmt::Display::fmt(e, f),
            Self::Exhausted(failure) => fmt::Display::fmt(failure, f),
        }
    }
}

impl<E> Error for RetryError<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Operation(e) => e.source(),
            Self::Exhausted(failure) => failure.source(),
        }
    }
}

impl<E> From<ExhaustionFailure<E>> for RetryError<E> {
    fn from(failure: ExhaustionFailure<E>) -> Self {
        Self::Exhausted(failure)
    }
}

/// Collapse back into an `io::Error` for callers that only speak `io`.
///
/// The exhaustion case wraps the [`ExhaustionFailure`] so the attempt count
/// survives; the last OS error stays reachable through `get_ref()`.
impl From<RetryError<io::Error>> for io::Error {
    fn from(err: RetryError<io::Error>) -> Self {
        match err {
            RetryError::Operation(e) => e,
            RetryError::Exhausted(failure) => io::Error::new(failure.last_error().kind(), failure),
        }
    }
}
