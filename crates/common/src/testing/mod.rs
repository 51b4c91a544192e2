//! Testing utilities and helpers
//!
//! - **[`mocks`]**: doubles for the inspector, sleeper and reclaimer seams,
//!   plus a scripted exhausting operation
//! - **[`fixtures`]**: ready-made exhaustion and unrelated errors
//!
//! ## Usage
//!
//! ```rust
//! # #[cfg(feature = "runtime")]
//! # {
//! use std::sync::Arc;
//! use fdguard_common::resilience::{RetryExecutor, RetryPolicy};
//! use fdguard_common::testing::{ExhaustionScript, RecordingSleeper};
//!
//! let sleeper = RecordingSleeper::new();
//! let executor = RetryExecutor::new().with_sleeper(Arc::new(sleeper.clone())).without_monitor();
//! let script = ExhaustionScript::new(1);
//!
//! let value = executor.execute_blocking(&RetryPolicy::default(), || script.call()).unwrap();
//! assert_eq!(value, 2);
//! assert_eq!(sleeper.waits().len(), 1);
//! # }
//! ```

pub mod fixtures;
pub mod mocks;

pub use fixtures::{exhaustion_error, permission_error};
pub use mocks::{
    CountingReclaimer, ExhaustionScript, FailingReclaimer, FixedLimitInspector, RecordingSleeper,
};
