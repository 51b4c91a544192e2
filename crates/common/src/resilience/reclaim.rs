//! Best-effort reclamation of leaked handles before a retry.
//!
//! The executor calls [`Reclaimer::trigger_reclaim`] between an exhaustion
//! failure and the backoff wait. Reclamation is process-wide, may be invoked
//! concurrently from independent retry loops, and its failures are logged
//! and discarded by the executor.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{CommonError, ErrorClassification, ErrorSeverity};

/// Errors raised by a reclamation pass
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReclaimError {
    #[error("Reclaim sweep '{name}' failed: {message}")]
    Sweep { name: String, message: String },

    #[error("{} of {total} reclaim sweeps failed: {}", failed.len(), failed.join(", "))]
    Incomplete { failed: Vec<String>, total: usize },
}

impl ReclaimError {
    pub fn sweep(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sweep { name: name.into(), message: message.into() }
    }
}

impl ErrorClassification for ReclaimError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Warning
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        None
    }
}

impl From<ReclaimError> for CommonError {
    fn from(err: ReclaimError) -> Self {
        CommonError::internal_with_context(err.to_string(), "reclaim")
    }
}

/// Capability for releasing unreferenced resources
///
/// Implementations must be idempotent and safe to call from several threads
/// at once; overlapping calls must not free the same resource twice.
pub trait Reclaimer: Send + Sync + fmt::Debug {
    fn trigger_reclaim(&self) -> Result<(), ReclaimError>;
}

/// Reclaimer that does nothing.
///
/// Rust frees handles deterministically on drop, so there is no collector to
/// nudge unless the application registers its own sweeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReclaimer;

impl Reclaimer for NoopReclaimer {
    fn trigger_reclaim(&self) -> Result<(), ReclaimError> {
        Ok(())
    }
}

/// A named finalization pass registered with a [`SweepReclaimer`]
pub type Sweep = Arc<dyn Fn() -> Result<(), ReclaimError> + Send + Sync>;

/// Runs every registered sweep, such as "drop idle pooled handles".
///
/// All sweeps run even when an earlier one fails; failures are aggregated
/// into [`ReclaimError::Incomplete`]. Sweeps run outside the registry lock,
/// so a sweep may itself register or unregister sweeps.
#[derive(Clone, Default)]
pub struct SweepReclaimer {
    sweeps: Arc<RwLock<Vec<(String, Sweep)>>>,
}

impl SweepReclaimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sweep, replacing any existing sweep with the same name
    pub fn register<F>(&self, name: impl Into<String>, sweep: F)
    where
        F: Fn() -> Result<(), ReclaimError> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut sweeps = self.sweeps.write();
        sweeps.retain(|(existing, _)| *existing != name);
        sweeps.push((name, Arc::new(sweep)));
    }

    /// Remove a sweep by name. Returns whether it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut sweeps = self.sweeps.write();
        let before = sweeps.len();
        sweeps.retain(|(existing, _)| existing != name);
        sweeps.len() != before
    }

    pub fn len(&self) -> usize {
        self.sweeps.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sweeps.read().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.sweeps.read().iter().map(|(name, _)| name.clone()).collect()
    }
}

impl fmt::Debug for SweepReclaimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SweepReclaimer").field("sweeps", &self.names()).finish()
    }
}

impl Reclaimer for SweepReclaimer {
    fn trigger_reclaim(&self) -> Result<(), ReclaimError> {
        let sweeps: Vec<(String, Sweep)> = self.sweeps.read().clone();
        let total = sweeps.len();
        let mut failed = Vec::new();

        for (name, sweep) in sweeps {
            match sweep() {
                Ok(()) => debug!(sweep = %name, "Reclaim sweep completed"),
                Err(e) => {
                    warn!(sweep = %name, error = %e, "Reclaim sweep failed");
                    failed.push(name);
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ReclaimError::Incomplete { failed, total })
        }
    }
}
