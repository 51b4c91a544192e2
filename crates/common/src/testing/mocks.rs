//! Test doubles for the limit inspector, sleeper and reclaimer seams
//!
//! Every double is `Clone` and shares its recorded state between clones, so
//! a test can hand one clone to the executor and inspect another.

// Allow missing error/panic docs for test mocks - they are designed to be simple
// and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::io;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::limits::{LimitInspector, LimitsError, LimitsResult, ResourceLimits};
use crate::resilience::reclaim::{ReclaimError, Reclaimer};
use crate::resilience::sleeper::Sleeper;
use crate::testing::fixtures::exhaustion_error;

/// Sleeper that records requested waits and returns immediately
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fdguard_common::resilience::Sleeper;
/// use fdguard_common::testing::RecordingSleeper;
///
/// let sleeper = RecordingSleeper::new();
/// sleeper.sleep_blocking(Duration::from_millis(100));
/// assert_eq!(sleeper.waits(), vec![Duration::from_millis(100)]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits requested so far, async and blocking alike, in order
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().clone()
    }

    pub fn total(&self) -> Duration {
        self.waits.lock().iter().sum()
    }

    pub fn clear(&self) {
        self.waits.lock().clear();
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().push(duration);
    }

    fn sleep_blocking(&self, duration: Duration) {
        self.waits.lock().push(duration);
    }
}

#[derive(Debug, Clone, Copy)]
enum CountBehavior {
    Fixed(u64),
    Exhausted,
    Unsupported,
}

/// Inspector returning scripted limits and counts
#[derive(Debug, Clone)]
pub struct FixedLimitInspector {
    limits: Option<ResourceLimits>,
    count: CountBehavior,
    queries: Arc<AtomicUsize>,
}

impl FixedLimitInspector {
    pub fn new(soft: u64, hard: u64, used: u64) -> Self {
        Self {
            limits: Some(ResourceLimits::new(soft, hard)),
            count: CountBehavior::Fixed(used),
            queries: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Inspector for a platform with no limit or count query
    pub fn unsupported() -> Self {
        Self {
            limits: None,
            count: CountBehavior::Unsupported,
            queries: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Limits with no ceiling (`RLIM_INFINITY`)
    pub fn unlimited(used: u64) -> Self {
        Self {
            limits: Some(ResourceLimits { soft: None, hard: None }),
            count: CountBehavior::Fixed(used),
            queries: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counting fails because the descriptor table is full
    pub fn with_exhausted_count(mut self) -> Self {
        self.count = CountBehavior::Exhausted;
        self
    }

    /// Number of `limits()` calls so far
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl LimitInspector for FixedLimitInspector {
    fn limits(&self) -> LimitsResult<ResourceLimits> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.limits.ok_or(LimitsError::UnsupportedPlatform { operation: "getrlimit" })
    }

    fn count_open_handles(&self) -> LimitsResult<u64> {
        match self.count {
            CountBehavior::Fixed(used) => Ok(used),
            CountBehavior::Exhausted => {
                Err(LimitsError::os("read_dir(fd table)", exhaustion_error()))
            }
            CountBehavior::Unsupported => {
                Err(LimitsError::UnsupportedPlatform { operation: "count_open_handles" })
            }
        }
    }
}

/// Reclaimer that counts invocations and always succeeds
#[derive(Debug, Clone, Default)]
pub struct CountingReclaimer {
    calls: Arc<AtomicUsize>,
}

impl CountingReclaimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Reclaimer for CountingReclaimer {
    fn trigger_reclaim(&self) -> Result<(), ReclaimError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Reclaimer that counts invocations and always fails
#[derive(Debug, Clone, Default)]
pub struct FailingReclaimer {
    calls: Arc<AtomicUsize>,
}

impl FailingReclaimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Reclaimer for FailingReclaimer {
    fn trigger_reclaim(&self) -> Result<(), ReclaimError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ReclaimError::sweep("failing", "reclaim refused"))
    }
}

/// Operation that fails with exhaustion a fixed number of times, then
/// succeeds with its invocation number.
///
/// `failures` of `u32::MAX` never succeeds.
#[derive(Debug, Clone)]
pub struct ExhaustionScript {
    failures: u32,
    invocations: Arc<AtomicU32>,
}

impl ExhaustionScript {
    pub fn new(failures: u32) -> Self {
        Self { failures, invocations: Arc::new(AtomicU32::new(0)) }
    }

    pub fn always_exhausted() -> Self {
        Self::new(u32::MAX)
    }

    /// Invoke the scripted operation
    pub fn call(&self) -> io::Result<u32> {
        let invocation = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        if invocation <= self.failures {
            Err(exhaustion_error())
        } else {
            Ok(invocation)
        }
    }

    /// Async form of [`call`](Self::call)
    pub async fn call_async(&self) -> io::Result<u32> {
        tokio::task::yield_now().await;
        self.call()
    }

    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}
