//! Diagnostic events for the retry executor
//!
//! Events are emitted through the standard `tracing` crate. They are
//! advisory: a subscriber that drops them does not change retry behavior.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::limits::UsageSnapshot;

/// Factory for [`RetrySpan`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryTracer;

impl RetryTracer {
    pub fn new() -> Self {
        Self
    }

    /// Start tracking a retry sequence after its first exhaustion failure
    pub fn start_retry_span(&self, operation_name: &str, max_retries: u32) -> RetrySpan {
        debug!(operation = operation_name, max_retries, "Starting exhaustion retry sequence");
        RetrySpan { operation_name: operation_name.to_string(), max_retries }
    }
}

/// Events for one orchestrated call
#[derive(Debug)]
pub struct RetrySpan {
    operation_name: String,
    max_retries: u32,
}

impl RetrySpan {
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// Exhaustion detected on `attempt`, with usage at the time if measured
    pub fn record_exhaustion(&self, attempt: u32, error: &str, usage: Option<&UsageSnapshot>) {
        match usage {
            Some(usage) => warn!(
                operation = %self.operation_name,
                attempt,
                max_retries = self.max_retries,
                error = %error,
                used = ?usage.used,
                soft_limit = ?usage.soft_limit,
                hard_limit = ?usage.hard_limit,
                percent = ?usage.percent,
                "Descriptor exhaustion detected"
            ),
            None => warn!(
                operation = %self.operation_name,
                attempt,
                max_retries = self.max_retries,
                error = %error,
                "Descriptor exhaustion detected"
            ),
        }
    }

    /// Record a reclamation pass
    pub fn record_reclaim(&self, attempt: u32, outcome: Result<(), &str>) {
        match outcome {
            Ok(()) => debug!(operation = %self.operation_name, attempt, "Reclaim pass completed"),
            Err(error) => warn!(
                operation = %self.operation_name,
                attempt,
                error = %error,
                "Reclaim pass failed, continuing with backoff"
            ),
        }
    }

    /// Record the wait before retrying
    pub fn record_wait(&self, attempt: u32, wait: Duration) {
        info!(
            operation = %self.operation_name,
            attempt,
            wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
            "Waiting before retry"
        );
    }

    /// Record recovery after one or more retries
    pub fn record_success(&self, attempts: u32, total_wait: Duration) {
        info!(
            operation = %self.operation_name,
            attempts,
            total_wait_ms = u64::try_from(total_wait.as_millis()).unwrap_or(u64::MAX),
            "Operation recovered from descriptor exhaustion"
        );
    }

    /// Record that every retry was spent
    pub fn record_exhausted(&self, attempts: u32, total_wait: Duration, error: &str) {
        warn!(
            operation = %self.operation_name,
            attempts,
            max_retries = self.max_retries,
            total_wait_ms = u64::try_from(total_wait.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "Descriptor exhaustion persisted after all retries"
        );
    }

    /// A failure after exhaustion that is not itself exhaustion
    pub fn record_unrelated(&self, attempt: u32, error: &str) {
        debug!(
            operation = %self.operation_name,
            attempt,
            error = %error,
            "Retry ended by unrelated failure"
        );
    }
}
