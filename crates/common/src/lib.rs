//! Descriptor-exhaustion resilience shared across fdguard crates.
//!
//! Bulk file-handling code can run a process out of file descriptors for a
//! moment and recover a moment later. This crate lets such code ride out the
//! gap instead of failing: it recognises exhaustion, reclaims what it can,
//! backs off and retries, and reports how close the process is to its limit.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: errors and serde utilities
//! - `observability`: tracing instrumentation
//! - `runtime` (default): limit inspection, the retry executor and scoped
//!   file opening
//! - `test-utils`: test doubles for downstream crates

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod utils;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod fs;
#[cfg(feature = "runtime")]
pub mod limits;
#[cfg(feature = "runtime")]
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use fs::{
    open_scoped, open_scoped_blocking, with_scoped_file, OpenMode, ScopedFile, ScopedOpener,
};
#[cfg(feature = "runtime")]
pub use limits::{
    LimitInspector, LimitsError, ResourceLimits, SystemLimitInspector, UsageMonitor, UsageSnapshot,
};
#[cfg(feature = "runtime")]
pub use resilience::{
    execute, execute_blocking, wait_for, AttemptRecord, ExhaustionClassifier, ExhaustionFailure,
    Jitter, NoopReclaimer, OsErrorClassifier, Reclaimer, RetryError, RetryExecutor, RetryOutcome,
    RetryPolicy, RetryResult, SweepReclaimer,
};
#[cfg(feature = "foundation")]
pub use utils::serde::duration_millis;
