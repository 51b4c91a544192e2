//! Surviving transient file-descriptor exhaustion
//!
//! This module provides the retry machinery around operations that open many
//! handles:
//! - **[`classifier`]**: table-driven detection of "too many open files"
//! - **[`backoff`]**: the pure wait computation plus optional jitter
//! - **[`policy`]**: immutable [`RetryPolicy`] values
//! - **[`reclaim`]**: the injectable [`Reclaimer`] run before each wait
//! - **[`retry`]**: the [`RetryExecutor`] that ties them together
//!
//! Only failures classified as exhaustion are retried. Everything else is
//! handed back on the first attempt as [`RetryError::Operation`].
//!
//! ```rust,ignore
//! use fdguard_common::resilience::{execute, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! let contents = execute(&policy, || tokio::fs::read_to_string(&path)).await?;
//! ```
//!
//! There is no process-wide admission control: concurrent retry loops are
//! independent and the operating system arbitrates the shared handle table.

pub mod backoff;
pub mod classifier;
pub mod constants;
pub mod error;
pub mod policy;
pub mod reclaim;
pub mod retry;
pub mod sleeper;
pub mod tracing;

pub use backoff::{wait_for, Jitter};
pub use classifier::{
    is_exhaustion, is_exhaustion_io, ExhaustionClassifier, ExhaustionCode, OsErrorClassifier,
    EXHAUSTION_TABLE, EXHAUSTION_TABLE_VERSION,
};
pub use error::{ExhaustionFailure, RetryError, RetryResult};
pub use policy::{RetryPolicy, RetryPolicyBuilder};
pub use reclaim::{NoopReclaimer, ReclaimError, Reclaimer, Sweep, SweepReclaimer};
pub use retry::{execute, execute_blocking, AttemptRecord, RetryExecutor, RetryOutcome};
pub use sleeper::{Sleeper, TokioSleeper};
pub use self::tracing::{RetrySpan, RetryTracer};
