//! Soft/hard descriptor limits and open-handle counting.
//!
//! [`SystemLimitInspector`] reads `RLIMIT_NOFILE` through `nix` on Unix and
//! counts entries of the per-process descriptor directory (`/proc/self/fd` on
//! Linux, `/dev/fd` on the BSDs and macOS). Other platforms report
//! [`LimitsError::UnsupportedPlatform`], which callers treat as "limits
//! unknown".

use std::fmt;
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::limits::error::{LimitsError, LimitsResult};

/// The process-wide ceiling on open handles at the time of the query.
///
/// `None` means the operating system reports no ceiling (`RLIM_INFINITY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub soft: Option<u64>,
    pub hard: Option<u64>,
}

impl ResourceLimits {
    /// Limits with both ceilings known
    pub fn new(soft: u64, hard: u64) -> Self {
        Self { soft: Some(soft), hard: Some(hard) }
    }

    /// Soft limit usable as a divisor: known and non-zero
    pub fn effective_soft(&self) -> Option<u64> {
        self.soft.filter(|soft| *soft > 0)
    }
}

impl fmt::Display for ResourceLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show =
            |limit: Option<u64>| limit.map_or_else(|| "unlimited".to_string(), |v| v.to_string());
        write!(f, "soft={}, hard={}", show(self.soft), show(self.hard))
    }
}

/// Source of descriptor limits and usage for the calling process.
///
/// Implementations must not have side effects. `count_open_handles` may
/// undercount but must never report more handles than are really open.
pub trait LimitInspector: Send + Sync + fmt::Debug {
    /// Current soft and hard descriptor limits
    fn limits(&self) -> LimitsResult<ResourceLimits>;

    /// Best-effort count of handles currently open in this process
    fn count_open_handles(&self) -> LimitsResult<u64>;
}

/// Inspector backed by the real operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLimitInspector;

impl SystemLimitInspector {
    pub fn new() -> Self {
        Self
    }

    /// Raise the soft limit toward the hard limit.
    ///
    /// `target` of `None` asks for the hard limit itself. The request is
    /// clamped to the hard limit, and a soft limit that is already at or
    /// above the target is left alone. Returns the limits in force after the
    /// call.
    #[cfg(unix)]
    pub fn raise_soft_limit(&self, target: Option<u64>) -> LimitsResult<ResourceLimits> {
        use nix::sys::resource::{getrlimit, setrlimit, Resource, RLIM_INFINITY};

        let (soft, hard) = getrlimit(Resource::RLIMIT_NOFILE)
            .map_err(|errno| LimitsError::os("getrlimit(RLIMIT_NOFILE)", errno))?;

        let desired = match (target, to_limit(hard)) {
            (Some(target), Some(hard_value)) => target.min(hard_value),
            (Some(target), None) => target,
            (None, Some(hard_value)) => hard_value,
            (None, None) => {
                // Unlimited hard ceiling: nothing sensible to raise to.
                return Ok(ResourceLimits { soft: to_limit(soft), hard: None });
            }
        };

        if soft == RLIM_INFINITY || to_limit(soft).is_some_and(|current| current >= desired) {
            debug!(soft = ?to_limit(soft), desired, "Soft descriptor limit already sufficient");
            return Ok(ResourceLimits { soft: to_limit(soft), hard: to_limit(hard) });
        }

        let new_soft = desired
            .try_into()
            .map_err(|_| LimitsError::os("setrlimit(RLIMIT_NOFILE)", nix::errno::Errno::EINVAL))?;
        setrlimit(Resource::RLIMIT_NOFILE, new_soft, hard)
            .map_err(|errno| LimitsError::os("setrlimit(RLIMIT_NOFILE)", errno))?;

        debug!(from = ?to_limit(soft), to = desired, "Raised soft descriptor limit");
        Ok(ResourceLimits { soft: Some(desired), hard: to_limit(hard) })
    }

    /// Raising limits is not supported off Unix.
    #[cfg(not(unix))]
    pub fn raise_soft_limit(&self, _target: Option<u64>) -> LimitsResult<ResourceLimits> {
        Err(LimitsError::UnsupportedPlatform { operation: "raise_soft_limit" })
    }
}

impl LimitInspector for SystemLimitInspector {
    #[cfg(unix)]
    fn limits(&self) -> LimitsResult<ResourceLimits> {
        use nix::sys::resource::{getrlimit, Resource};

        let (soft, hard) = getrlimit(Resource::RLIMIT_NOFILE)
            .map_err(|errno| LimitsError::os("getrlimit(RLIMIT_NOFILE)", errno))?;
        Ok(ResourceLimits { soft: to_limit(soft), hard: to_limit(hard) })
    }

    #[cfg(not(unix))]
    fn limits(&self) -> LimitsResult<ResourceLimits> {
        Err(LimitsError::UnsupportedPlatform { operation: "getrlimit" })
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn count_open_handles(&self) -> LimitsResult<u64> {
        count_dir_entries(Path::new("/proc/self/fd"))
    }

    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    ))]
    fn count_open_handles(&self) -> LimitsResult<u64> {
        count_dir_entries(Path::new("/dev/fd"))
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    )))]
    fn count_open_handles(&self) -> LimitsResult<u64> {
        Err(LimitsError::UnsupportedPlatform { operation: "count_open_handles" })
    }
}

/// Map an `rlim_t` onto `Option<u64>`, with `RLIM_INFINITY` as `None`.
#[cfg(unix)]
fn to_limit(value: nix::sys::resource::rlim_t) -> Option<u64> {
    if value == nix::sys::resource::RLIM_INFINITY {
        return None;
    }
    u64::try_from(value).ok()
}

/// Count entries of a descriptor directory.
///
/// Listing the directory opens one descriptor of its own, which shows up in
/// the listing; it is subtracted so the count never exceeds reality.
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
fn count_dir_entries(dir: &Path) -> LimitsResult<u64> {
    let entries = std::fs::read_dir(dir).map_err(|e| LimitsError::os("read_dir(fd table)", e))?;
    let mut count: u64 = 0;
    for entry in entries {
        entry.map_err(|e| LimitsError::os("read_dir(fd table)", e))?;
        count += 1;
    }
    Ok(count.saturating_sub(1))
}
