//! Integration tests for limit inspection and usage monitoring

#![cfg(feature = "runtime")]

use std::sync::Arc;

use fdguard_common::limits::{
    LimitInspector, ResourceLimits, SystemLimitInspector, UsageMonitor, UsageSnapshot,
};
use fdguard_common::testing::FixedLimitInspector;

/// `Snapshot` never reports negative usage figures and never warns about an
/// unmeasurable quantity.
///
/// # Test Steps
/// 1. Sweep soft limits (including zero) against a range of usage counts
/// 2. Check `percent` and `available` are non-negative when present
/// 3. Check a zero soft limit is always indeterminate and never exceeded
#[test]
fn snapshot_figures_are_never_negative() {
    for soft in [0u64, 1, 64, 1024] {
        for used in [0u64, 1, 63, 64, 65, 5000] {
            let inspector = FixedLimitInspector::new(soft, soft * 2, used);
            let monitor = UsageMonitor::new(Arc::new(inspector));
            for threshold in [0.01, 0.5, 0.8, 1.0] {
                let (snapshot, exceeded) = monitor.snapshot(threshold);
                assert!(snapshot.percent.map_or(true, |p| p >= 0.0));
                assert!(snapshot.available.map_or(true, |a| a <= soft));
                if soft == 0 {
                    assert!(snapshot.is_indeterminate());
                    assert!(!exceeded);
                }
            }
        }
    }
}

/// An unsupported platform yields an indeterminate snapshot instead of an
/// error, so diagnostic paths never fail their caller.
#[test]
fn unsupported_platform_degrades_gracefully() {
    let monitor = UsageMonitor::new(Arc::new(FixedLimitInspector::unsupported()));
    let snapshot = monitor.log_usage(0.8);
    assert_eq!(snapshot, UsageSnapshot::from_measurements(None, None));
    assert!(monitor.has_headroom(1_000_000));
}

/// An unlimited soft limit (`RLIM_INFINITY`) still reports the count but no
/// percentage.
#[test]
fn unlimited_soft_limit_is_indeterminate() {
    let monitor = UsageMonitor::new(Arc::new(FixedLimitInspector::unlimited(42)));
    let (snapshot, exceeded) = monitor.snapshot(0.1);
    assert_eq!(snapshot.used, Some(42));
    assert_eq!(snapshot.soft_limit, None);
    assert!(snapshot.is_indeterminate());
    assert!(!exceeded);
}

/// A batch loop can use the snapshot to throttle before exhaustion.
#[test]
fn batch_loop_pauses_at_threshold() {
    let usages = [100u64, 500, 790, 800, 950];
    let paused: Vec<bool> = usages
        .iter()
        .map(|used| {
            let monitor = UsageMonitor::new(Arc::new(FixedLimitInspector::new(1000, 4096, *used)));
            monitor.snapshot(0.8).1
        })
        .collect();
    assert_eq!(paused, vec![false, false, false, true, true]);
}

/// Snapshots serialise with the documented field names for log shipping.
#[test]
fn snapshot_serialises_documented_fields() {
    let snapshot =
        UsageSnapshot::from_measurements(Some(256), Some(ResourceLimits::new(1024, 4096)));
    let json = serde_json::to_value(snapshot).expect("serialize");
    assert_eq!(json["used"], 256);
    assert_eq!(json["soft_limit"], 1024);
    assert_eq!(json["hard_limit"], 4096);
    assert_eq!(json["percent"], 0.25);
    assert_eq!(json["available"], 768);
}

/// The live system inspector agrees with itself and the monitor on Unix.
#[cfg(unix)]
#[test]
fn system_monitor_reports_live_figures() {
    let inspector = SystemLimitInspector::new();
    let limits = inspector.limits().expect("getrlimit");

    let snapshot = UsageMonitor::system().usage();
    assert_eq!(snapshot.soft_limit, limits.soft);
    assert_eq!(snapshot.hard_limit, limits.hard);

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        assert!(snapshot.used.is_some_and(|used| used >= 1));
        if limits.effective_soft().is_some() {
            assert!(snapshot.percent.is_some());
        }
    }
}

/// Holding descriptors open moves the live count up.
#[cfg(target_os = "linux")]
#[test]
fn live_count_tracks_open_files() {
    let monitor = UsageMonitor::system();
    let files: Vec<_> = (0..16).map(|_| tempfile::tempfile().expect("tempfile")).collect();
    let during = monitor.usage().used.expect("count on linux");
    assert!(during >= 16, "sixteen temp files are open, counted {during}");
    drop(files);
}
