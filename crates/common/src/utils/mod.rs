//! Serialization helpers shared by the policy and configuration types.

pub mod serde;

pub use self::serde::duration_millis;
