//! Handle-limit introspection
//!
//! This module answers two questions about the process's descriptor budget:
//! - **[`inspector`]**: what are the soft/hard ceilings and how many handles
//!   are open right now?
//! - **[`monitor`]**: how close is the process to the soft ceiling, and has a
//!   warning threshold been crossed?
//!
//! Both are recomputed on every call. Nothing here is cached, because the
//! descriptor count changes continuously and limits can be adjusted from
//! outside the process.

pub mod error;
pub mod inspector;
pub mod monitor;

pub use error::{LimitsError, LimitsResult};
pub use inspector::{LimitInspector, ResourceLimits, SystemLimitInspector};
pub use monitor::{UsageMonitor, UsageSnapshot};
