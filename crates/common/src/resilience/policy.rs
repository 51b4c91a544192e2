//! Retry policy for exhaustion-aware operations.
//!
//! A [`RetryPolicy`] is an immutable value: build it once (or take the
//! default) and share it by reference across any number of concurrent calls.

use std::time::Duration;

use crate::error::{CommonError, CommonResult};
use crate::resilience::backoff::Jitter;
use crate::resilience::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_WAIT, DEFAULT_MAX_RETRIES, DEFAULT_MAX_WAIT,
    DEFAULT_TRIGGER_RECLAIM,
};

/// Configuration for a wrapped operation
///
/// Defaults: 5 retries, 500ms initial wait, x2.0 multiplier, 10s cap,
/// reclamation enabled, no jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_wait: Duration,
    backoff_multiplier: f64,
    max_wait: Duration,
    trigger_reclaim: bool,
    jitter: Jitter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_wait: DEFAULT_INITIAL_WAIT,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_wait: DEFAULT_MAX_WAIT,
            trigger_reclaim: DEFAULT_TRIGGER_RECLAIM,
            jitter: Jitter::None,
        }
    }
}

impl RetryPolicy {
    /// Create a policy builder starting from the defaults
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Retries permitted after the initial attempt
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Upper bound on invocations of the operation
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn initial_wait(&self) -> Duration {
        self.initial_wait
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn trigger_reclaim(&self) -> bool {
        self.trigger_reclaim
    }

    pub fn jitter(&self) -> &Jitter {
        &self.jitter
    }

    /// Worst-case total time spent waiting, ignoring operation runtime
    pub fn worst_case_wait(&self) -> Duration {
        self.max_wait.saturating_mul(self.max_retries)
    }

    /// Validate the configuration
    ///
    /// Any retry count is accepted, and an `initial_wait` above `max_wait` is
    /// simply capped by [`wait_for`](crate::resilience::wait_for).
    pub fn validate(&self) -> CommonResult<()> {
        if self.initial_wait.is_zero() {
            return Err(CommonError::validation("initial_wait", "must be greater than zero"));
        }

        if self.max_wait.is_zero() {
            return Err(CommonError::validation("max_wait", "must be greater than zero"));
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(CommonError::validation_with_value(
                "backoff_multiplier",
                "must be a finite number >= 1.0",
                self.backoff_multiplier.to_string(),
            ));
        }

        self.jitter.validate()
    }
}

/// Builder for RetryPolicy with fluent API
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.policy.max_retries = retries;
        self
    }

    pub fn initial_wait(mut self, wait: Duration) -> Self {
        self.policy.initial_wait = wait;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.policy.backoff_multiplier = multiplier;
        self
    }

    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.policy.max_wait = wait;
        self
    }

    pub fn trigger_reclaim(mut self, enabled: bool) -> Self {
        self.policy.trigger_reclaim = enabled;
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.policy.jitter = jitter;
        self
    }

    pub fn no_jitter(self) -> Self {
        self.jitter(Jitter::None)
    }

    pub fn build(self) -> CommonResult<RetryPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}
