// Error types for the limits module
use thiserror::Error;

use crate::error::{CommonError, ErrorSeverity};
use crate::impl_error_classification;

/// Errors raised while querying descriptor limits or usage
#[derive(Debug, Error)]
pub enum LimitsError {
    #[error(transparent)]
    Common(#[from] CommonError),

    /// The platform offers no way to answer the query
    #[error("{operation} is not supported on this platform")]
    UnsupportedPlatform { operation: &'static str },

    /// The query exists but the operating system refused it
    #[error("{operation} failed: {source}")]
    Os {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl LimitsError {
    pub(crate) fn os(operation: &'static str, source: impl Into<std::io::Error>) -> Self {
        Self::Os { operation, source: source.into() }
    }

    /// True when the failure means "limits unknown" rather than a real fault
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedPlatform { .. } | Self::Common(CommonError::UnsupportedPlatform { .. })
        )
    }

    /// The underlying OS error, if any
    pub fn os_error(&self) -> Option<&std::io::Error> {
        match self {
            Self::Os { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl_error_classification!(LimitsError, Common,
    Self::UnsupportedPlatform { .. } => {
        retryable: false,
        severity: ErrorSeverity::Info,
        critical: false,
    },
    Self::Os { .. } => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    }
);

impl From<LimitsError> for CommonError {
    fn from(err: LimitsError) -> Self {
        match err {
            LimitsError::Common(e) => e,
            LimitsError::UnsupportedPlatform { operation } => {
                CommonError::unsupported_platform(operation)
            }
            LimitsError::Os { operation, source } => {
                CommonError::internal_with_context(source.to_string(), operation)
            }
        }
    }
}

/// Result type for limit queries
pub type LimitsResult<T> = Result<T, LimitsError>;
