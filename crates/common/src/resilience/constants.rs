// Defaults and bounds for the retry subsystem
use std::time::Duration;

/// Default number of retries after the initial attempt
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default wait before the first retry
pub const DEFAULT_INITIAL_WAIT: Duration = Duration::from_millis(500);

/// Default growth factor between consecutive waits
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default cap on a single wait
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);

/// Reclamation is requested before each wait unless disabled
pub const DEFAULT_TRIGGER_RECLAIM: bool = true;

/// Default fraction of the soft limit at which usage warnings start
pub const DEFAULT_WARN_THRESHOLD: f64 = 0.8;

/// Label used in diagnostics when the caller does not name the operation
pub const DEFAULT_OPERATION_LABEL: &str = "operation";
