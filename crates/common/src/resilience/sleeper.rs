//! Injectable waiting for the retry loop.
//!
//! Backoff waits go through a [`Sleeper`] so tests can observe the waits
//! chosen without spending wall-clock time on them.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Suspends the calling context for a backoff wait.
///
/// `sleep` must suspend only the calling task; `sleep_blocking` only the
/// calling thread.
#[async_trait]
pub trait Sleeper: Send + Sync + fmt::Debug {
    async fn sleep(&self, duration: Duration);

    fn sleep_blocking(&self, duration: Duration);
}

/// Real time: `tokio::time::sleep` for async callers and
/// `std::thread::sleep` for blocking ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    fn sleep_blocking(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
