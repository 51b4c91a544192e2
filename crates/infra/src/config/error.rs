//! Configuration errors

use std::path::PathBuf;

use fdguard_common::error::{CommonError, ErrorSeverity};
use fdguard_common::impl_error_classification;
use thiserror::Error;

/// Result alias for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failures while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("no config file found in any of the standard locations")]
    NoConfigFile,

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("invalid value for {key}: {message}")]
    InvalidEnv { key: String, message: String },

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ConfigError {
    pub(crate) fn invalid_env(key: &str, message: impl ToString) -> Self {
        Self::InvalidEnv { key: key.to_string(), message: message.to_string() }
    }
}

impl_error_classification!(ConfigError, Common,
    Self::FileNotFound { .. } | Self::NoConfigFile => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::Read { .. } => {
        retryable: true,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::Toml { .. }
    | Self::Json { .. }
    | Self::UnsupportedFormat { .. }
    | Self::InvalidEnv { .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
);
