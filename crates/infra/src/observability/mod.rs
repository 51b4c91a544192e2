//! Logging bootstrap
//!
//! `fdguard-common` only emits `tracing` events. Binaries that want to see
//! them call [`init_tracing`] once at startup with the [`LoggingConfig`]
//! section of their configuration.
//!
//! `RUST_LOG` overrides the configured level when it is set and valid.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Default filter directive
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" | "human" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected 'pretty' or 'json')")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Logging section of the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `fdguard_common=debug`
    pub level: String,
    pub format: LogFormat,
    /// Include the event target (module path) in each line
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::default(),
            with_target: true,
        }
    }
}

/// Logging bootstrap failures
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {source}")]
    InvalidFilter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
}

/// Parse a filter directive
pub fn parse_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directive)
        .map_err(|source| LoggingError::InvalidFilter { directive: directive.to_string(), source })
}

/// Install the global `tracing` subscriber.
///
/// Returns `Ok(true)` when this call installed it and `Ok(false)` when a
/// subscriber was already in place, so calling it twice is harmless.
///
/// # Errors
/// Returns [`LoggingError::InvalidFilter`] when `RUST_LOG` is unset or
/// invalid and the configured level does not parse.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(&config.level)?,
    };

    let installed = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.with_target)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_current_span(true)
            .with_env_filter(filter)
            .with_target(config.with_target)
            .try_init(),
    };

    match installed {
        Ok(()) => {
            tracing::debug!(level = %config.level, format = %config.format, "Tracing initialised");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}
