//! Descriptor usage snapshots for proactive self-throttling.
//!
//! Batch loops call [`UsageMonitor::snapshot`] between items to see how close
//! the process is to its soft limit and back off before the operating system
//! starts refusing new handles.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::limits::inspector::{LimitInspector, ResourceLimits, SystemLimitInspector};
use crate::resilience::classifier::is_exhaustion_io;
use crate::resilience::constants::DEFAULT_WARN_THRESHOLD;

/// Point-in-time descriptor usage.
///
/// Fields that cannot be measured are `None`. `percent` is the fraction of the
/// soft limit in use (`0.5` is half) and is only present when both the count
/// and a non-zero soft limit are known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub used: Option<u64>,
    pub soft_limit: Option<u64>,
    pub hard_limit: Option<u64>,
    pub percent: Option<f64>,
    pub available: Option<u64>,
}

impl UsageSnapshot {
    /// Derive a snapshot from raw measurements.
    pub fn from_measurements(used: Option<u64>, limits: Option<ResourceLimits>) -> Self {
        let soft_limit = limits.and_then(|l| l.soft);
        let hard_limit = limits.and_then(|l| l.hard);
        let effective_soft = limits.and_then(|l| l.effective_soft());

        let (percent, available) = match (used, effective_soft) {
            (Some(used), Some(soft)) => {
                #[allow(clippy::cast_precision_loss)]
                let percent = used as f64 / soft as f64;
                (Some(percent), Some(soft.saturating_sub(used)))
            }
            _ => (None, None),
        };

        Self { used, soft_limit, hard_limit, percent, available }
    }

    /// True when usage relative to the soft limit cannot be computed
    pub fn is_indeterminate(&self) -> bool {
        self.percent.is_none()
    }

    /// Whether usage has reached `warn_threshold` of the soft limit.
    ///
    /// Always false for an indeterminate snapshot.
    pub fn exceeds(&self, warn_threshold: f64) -> bool {
        let threshold = normalize_threshold(warn_threshold);
        self.percent.is_some_and(|percent| percent >= threshold)
    }
}

impl fmt::Display for UsageSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<u64>| v.map_or_else(|| "?".to_string(), |v| v.to_string());
        match self.percent {
            Some(percent) => write!(
                f,
                "{}/{} descriptors in use ({:.1}%), {} available",
                show(self.used),
                show(self.soft_limit),
                percent * 100.0,
                show(self.available)
            ),
            None => write!(
                f,
                "{}/{} descriptors in use (indeterminate)",
                show(self.used),
                show(self.soft_limit)
            ),
        }
    }
}

/// Clamp a warning threshold into `(0, 1]`.
///
/// Non-finite or non-positive values fall back to the default threshold.
fn normalize_threshold(warn_threshold: f64) -> f64 {
    if !warn_threshold.is_finite() || warn_threshold <= 0.0 {
        DEFAULT_WARN_THRESHOLD
    } else {
        warn_threshold.min(1.0)
    }
}

/// Computes [`UsageSnapshot`]s from a [`LimitInspector`].
#[derive(Debug, Clone)]
pub struct UsageMonitor {
    inspector: Arc<dyn LimitInspector>,
}

impl Default for UsageMonitor {
    fn default() -> Self {
        Self::system()
    }
}

impl UsageMonitor {
    pub fn new(inspector: Arc<dyn LimitInspector>) -> Self {
        Self { inspector }
    }

    /// Monitor backed by the operating system
    pub fn system() -> Self {
        Self::new(Arc::new(SystemLimitInspector::new()))
    }

    /// Current usage, with whatever fields could be measured.
    ///
    /// Never fails: an unsupported or failing query leaves the affected fields
    /// empty. If counting fails because the descriptor table itself is full,
    /// usage is reported as equal to the soft limit.
    pub fn usage(&self) -> UsageSnapshot {
        let limits = match self.inspector.limits() {
            Ok(limits) => Some(limits),
            Err(e) => {
                debug!(error = %e, "Descriptor limits unavailable");
                None
            }
        };

        let used = match self.inspector.count_open_handles() {
            Ok(count) => Some(count),
            Err(e) if e.os_error().is_some_and(is_exhaustion_io) => {
                limits.and_then(|l| l.effective_soft())
            }
            Err(e) => {
                debug!(error = %e, "Open descriptor count unavailable");
                None
            }
        };

        UsageSnapshot::from_measurements(used, limits)
    }

    /// Usage plus whether it has reached `warn_threshold` (a fraction in
    /// `(0, 1]`) of the soft limit.
    pub fn snapshot(&self, warn_threshold: f64) -> (UsageSnapshot, bool) {
        let snapshot = self.usage();
        let exceeded = snapshot.exceeds(warn_threshold);
        (snapshot, exceeded)
    }

    /// Take a snapshot and log it: `warn!` past the threshold, `debug!`
    /// otherwise.
    pub fn log_usage(&self, warn_threshold: f64) -> UsageSnapshot {
        let (snapshot, exceeded) = self.snapshot(warn_threshold);
        if exceeded {
            warn!(
                used = ?snapshot.used,
                soft_limit = ?snapshot.soft_limit,
                percent = ?snapshot.percent,
                threshold = normalize_threshold(warn_threshold),
                "Descriptor usage above warning threshold"
            );
        } else {
            debug!(
                used = ?snapshot.used,
                soft_limit = ?snapshot.soft_limit,
                percent = ?snapshot.percent,
                "Descriptor usage"
            );
        }
        snapshot
    }

    /// Whether `required` more handles fit under the soft limit.
    ///
    /// Returns true when usage is indeterminate, since nothing can be said.
    pub fn has_headroom(&self, required: u64) -> bool {
        self.usage().available.map_or(true, |available| available >= required)
    }
}
