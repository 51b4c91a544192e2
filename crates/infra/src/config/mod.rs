//! Configuration loading and management
//!
//! This module provides the [`Config`] tree and utilities for loading it
//! from files and environment variables. Every section defaults to the
//! library defaults, so partial files are fine.

pub mod error;
pub mod loader;

use std::time::Duration;

use fdguard_common::duration_millis;
use fdguard_common::error::CommonError;
use fdguard_common::limits::{ResourceLimits, SystemLimitInspector};
use fdguard_common::resilience::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_WAIT, DEFAULT_MAX_RETRIES, DEFAULT_MAX_WAIT,
    DEFAULT_TRIGGER_RECLAIM, DEFAULT_WARN_THRESHOLD,
};
use fdguard_common::resilience::{Jitter, RetryPolicy};
use serde::{Deserialize, Serialize};

// Re-export commonly used items
pub use error::{ConfigError, ConfigResult};
pub use loader::{apply_env, load, load_from_env, load_from_file, find_config_file};

use crate::observability::{parse_filter, LoggingConfig};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retry: RetrySettings,
    pub monitor: MonitorSettings,
    pub logging: LoggingConfig,
}

impl Config {
    /// Check every section
    ///
    /// # Errors
    /// Returns the first invalid value found.
    pub fn validate(&self) -> ConfigResult<()> {
        self.retry.clone().into_policy()?;
        self.monitor.validate()?;
        parse_filter(&self.logging.level).map_err(|e| {
            ConfigError::from(CommonError::validation_with_value(
                "logging.level",
                e.to_string(),
                self.logging.level.clone(),
            ))
        })?;
        Ok(())
    }
}

/// Retry section, mapped onto [`RetryPolicy`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    #[serde(rename = "initial_wait_ms", with = "duration_millis")]
    pub initial_wait: Duration,
    pub backoff_multiplier: f64,
    #[serde(rename = "max_wait_ms", with = "duration_millis")]
    pub max_wait: Duration,
    pub trigger_reclaim: bool,
    /// Fraction of each wait that may be randomly cut; `0.0` disables jitter
    pub jitter_fraction: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_wait: DEFAULT_INITIAL_WAIT,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_wait: DEFAULT_MAX_WAIT,
            trigger_reclaim: DEFAULT_TRIGGER_RECLAIM,
            jitter_fraction: 0.0,
        }
    }
}

impl RetrySettings {
    /// Build a validated [`RetryPolicy`]
    ///
    /// # Errors
    /// Returns `ConfigError::Common` carrying the validation failure.
    pub fn into_policy(self) -> ConfigResult<RetryPolicy> {
        let jitter = if self.jitter_fraction == 0.0 {
            Jitter::None
        } else {
            Jitter::Proportional(self.jitter_fraction)
        };

        Ok(RetryPolicy::builder()
            .max_retries(self.max_retries)
            .initial_wait(self.initial_wait)
            .backoff_multiplier(self.backoff_multiplier)
            .max_wait(self.max_wait)
            .trigger_reclaim(self.trigger_reclaim)
            .jitter(jitter)
            .build()?)
    }
}

/// Usage monitor section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Fraction of the soft limit at which usage is logged as a warning
    pub warn_threshold: f64,
    /// Raise the soft descriptor limit at startup
    pub raise_soft_limit: bool,
    /// Target for the raise; `None` means the hard limit
    pub soft_limit_target: Option<u64>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            warn_threshold: DEFAULT_WARN_THRESHOLD,
            raise_soft_limit: false,
            soft_limit_target: None,
        }
    }
}

impl MonitorSettings {
    /// # Errors
    /// Fails when `warn_threshold` is outside `(0, 1]`.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.warn_threshold > 0.0 && self.warn_threshold <= 1.0) {
            return Err(CommonError::validation_with_value(
                "warn_threshold",
                "must be within (0, 1]",
                self.warn_threshold.to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Raise the soft limit when enabled.
    ///
    /// Best effort: a refusal is logged and `None` returned.
    pub fn apply(&self) -> Option<ResourceLimits> {
        if !self.raise_soft_limit {
            return None;
        }
        match SystemLimitInspector::new().raise_soft_limit(self.soft_limit_target) {
            Ok(limits) => {
                tracing::info!(
                    soft = ?limits.soft,
                    hard = ?limits.hard,
                    "Raised soft descriptor limit"
                );
                Some(limits)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not raise soft descriptor limit");
                None
            }
        }
    }
}
