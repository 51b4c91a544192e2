//! # fdguard Infrastructure
//!
//! The "impure" edges around `fdguard-common`.
//!
//! This crate contains:
//! - Configuration loading from files and `FDGUARD_*` environment variables
//! - Logging bootstrap for `tracing` diagnostics
//!
//! ## Architecture
//! - Depends on `fdguard-common` for the policy and monitor types it builds
//! - Holds all environment and filesystem access needed at startup

pub mod config;
pub mod observability;

// Re-export commonly used items
pub use config::{load, load_from_env, load_from_file, Config, ConfigError, ConfigResult};
pub use observability::{init_tracing, LogFormat, LoggingConfig};
