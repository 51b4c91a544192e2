//! Integration tests for the resilience module
//!
//! Exercises the retry executor end to end against scripted exhaustion,
//! unrelated failures, reclamation and concurrent callers.

#![cfg(feature = "runtime")]

use std::io;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fdguard_common::limits::UsageMonitor;
use fdguard_common::resilience::{
    is_exhaustion_io, wait_for, ExhaustionFailure, ReclaimError, Reclaimer, RetryError,
    RetryExecutor, RetryPolicy, SweepReclaimer,
};
use fdguard_common::testing::{
    exhaustion_error, permission_error, CountingReclaimer, ExhaustionScript, FixedLimitInspector,
    RecordingSleeper,
};

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// `{max_retries=3, initial_wait=0.1s, multiplier=2.0, max_wait=1.0s}`
fn scenario_policy() -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(3)
        .initial_wait(millis(100))
        .backoff_multiplier(2.0)
        .max_wait(Duration::from_secs(1))
        .build()
        .expect("valid policy")
}

/// Route retry diagnostics to the test writer so failures show the event log.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("fdguard_common=debug")
        .with_test_writer()
        .try_init();
}

fn recording_executor(sleeper: &RecordingSleeper) -> RetryExecutor {
    RetryExecutor::new().with_sleeper(Arc::new(sleeper.clone())).without_monitor()
}

/// Exhaustion on attempts 1 and 2, success on attempt 3.
///
/// # Test Steps
/// 1. Script an operation that fails twice with exhaustion
/// 2. Run it under the scenario policy
/// 3. Verify waits of 0.1s then 0.2s and exactly three invocations
#[tokio::test]
async fn recovers_after_two_exhaustion_failures() {
    let sleeper = RecordingSleeper::new();
    let script = ExhaustionScript::new(2);

    let value = recording_executor(&sleeper)
        .execute(&scenario_policy(), || script.call_async())
        .await
        .expect("third attempt succeeds");

    assert_eq!(value, 3);
    assert_eq!(script.invocations(), 3);
    assert_eq!(sleeper.waits(), vec![millis(100), millis(200)]);
}

/// An operation that always fails with exhaustion.
///
/// Assertions:
/// - Waits are 0.1s, 0.2s and 0.4s.
/// - The failure reports `attempts_made == 4`.
/// - The operation is never invoked a fifth time.
#[tokio::test]
async fn persistent_exhaustion_surfaces_exhaustion_failure() {
    init_logging();
    let sleeper = RecordingSleeper::new();
    let script = ExhaustionScript::always_exhausted();

    let err = recording_executor(&sleeper)
        .execute(&scenario_policy(), || script.call_async())
        .await
        .expect_err("never recovers");

    assert_eq!(sleeper.waits(), vec![millis(100), millis(200), millis(400)]);
    assert_eq!(script.invocations(), 4);

    match err {
        RetryError::Exhausted(failure) => {
            assert_eq!(failure.attempts_made(), 4);
            assert_eq!(failure.last_error().raw_os_error(), exhaustion_error().raw_os_error());
            assert!(failure.to_string().contains("after 4 attempts"));
        }
        other => panic!("expected exhaustion failure, got {other:?}"),
    }
}

/// A permission error is returned at once, unmodified, with no waits.
#[tokio::test]
async fn unrelated_failure_is_raised_immediately() {
    let sleeper = RecordingSleeper::new();
    let reclaimer = CountingReclaimer::new();
    let calls = AtomicU32::new(0);

    let err = recording_executor(&sleeper)
        .with_reclaimer(Arc::new(reclaimer.clone()))
        .execute(&scenario_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(permission_error()) }
        })
        .await
        .expect_err("permission denied");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(sleeper.waits().is_empty());
    assert_eq!(reclaimer.count(), 0);

    let original = err.into_operation_error().expect("unrelated failure");
    assert_eq!(original.kind(), io::ErrorKind::PermissionDenied);
    assert_eq!(original.to_string(), permission_error().to_string());
}

/// `initial_wait=1.0s, multiplier=10.0, max_wait=5.0s`: the third retry
/// waits 5s, not 100s.
#[test]
fn backoff_caps_large_waits() {
    let policy = RetryPolicy::builder()
        .initial_wait(Duration::from_secs(1))
        .backoff_multiplier(10.0)
        .max_wait(Duration::from_secs(5))
        .build()
        .expect("valid policy");

    assert_eq!(wait_for(3, &policy), Duration::from_secs(5));
}

/// For `k <= max_retries` exhaustion failures the executor returns after
/// exactly `k + 1` invocations; beyond that it stops at `max_retries + 1`.
#[test]
fn invocation_count_is_bounded_by_policy() {
    for max_retries in 0..=4 {
        let policy = RetryPolicy::builder()
            .max_retries(max_retries)
            .initial_wait(millis(1))
            .build()
            .expect("valid policy");

        for failures in 0..=max_retries + 2 {
            let sleeper = RecordingSleeper::new();
            let script = ExhaustionScript::new(failures);
            let result = recording_executor(&sleeper).execute_blocking(&policy, || script.call());

            if failures <= max_retries {
                assert_eq!(result.expect("recovers"), failures + 1);
                assert_eq!(script.invocations(), failures + 1);
            } else {
                assert_eq!(result.expect_err("exhausts").attempts_made(), Some(max_retries + 1));
                assert_eq!(script.invocations(), max_retries + 1);
            }
            assert!(sleeper.waits().iter().all(|wait| *wait <= policy.max_wait()));
        }
    }
}

/// The default policy matches the documented defaults and its waits double
/// up to the 10s cap.
#[test]
fn default_policy_progression() {
    let sleeper = RecordingSleeper::new();
    let policy = RetryPolicy::default();
    let outcome = recording_executor(&sleeper)
        .execute_blocking_with_outcome(&policy, || Err::<(), _>(exhaustion_error()));

    assert_eq!(outcome.attempts, 6);
    assert_eq!(
        sleeper.waits(),
        vec![millis(500), millis(1000), millis(2000), millis(4000), millis(8000)]
    );
    assert_eq!(outcome.total_wait, millis(15_500));
    assert!(outcome.records.iter().all(|record| record.reclaimed));
}

/// Reclamation failures never mask the exhaustion signal.
#[tokio::test]
async fn failing_sweeps_are_swallowed() {
    let sweeps = SweepReclaimer::new();
    let pool_runs = Arc::new(AtomicUsize::new(0));
    sweeps.register("broken", || Err(ReclaimError::sweep("broken", "registry locked")));
    let counter = Arc::clone(&pool_runs);
    sweeps.register("idle-pool", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let sleeper = RecordingSleeper::new();
    let script = ExhaustionScript::new(2);
    let outcome = recording_executor(&sleeper)
        .with_reclaimer(Arc::new(sweeps.clone()))
        .execute_with_outcome(&scenario_policy(), || script.call_async())
        .await;

    assert_eq!(outcome.into_result().expect("recovers"), 3);
    assert_eq!(pool_runs.load(Ordering::SeqCst), 2);
    assert!(sweeps.trigger_reclaim().is_err());
}

/// A sweep that actually frees descriptors lets the next attempt succeed.
#[tokio::test]
async fn reclaim_sweep_enables_recovery() {
    let freed = Arc::new(AtomicUsize::new(0));
    let sweeps = SweepReclaimer::new();
    let flag = Arc::clone(&freed);
    sweeps.register("close-idle", move || {
        flag.store(1, Ordering::SeqCst);
        Ok(())
    });

    let sleeper = RecordingSleeper::new();
    let result = recording_executor(&sleeper)
        .with_reclaimer(Arc::new(sweeps))
        .execute(&scenario_policy(), || {
            let freed = freed.load(Ordering::SeqCst) == 1;
            async move { if freed { Ok("opened") } else { Err(exhaustion_error()) } }
        })
        .await;

    assert_eq!(result.expect("recovered after sweep"), "opened");
    assert_eq!(sleeper.waits(), vec![millis(100)]);
}

/// Concurrent calls sharing one executor and one policy keep separate
/// bookkeeping.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_are_independent() {
    let sleeper = RecordingSleeper::new();
    let executor = recording_executor(&sleeper);
    let policy = Arc::new(scenario_policy());

    let mut handles = Vec::new();
    for failures in 0..4u32 {
        let executor = executor.clone();
        let policy = Arc::clone(&policy);
        handles.push(tokio::spawn(async move {
            let script = ExhaustionScript::new(failures);
            let outcome = executor.execute_with_outcome(&policy, || script.call_async()).await;
            (failures, outcome.attempts, outcome.records.len(), outcome.is_success())
        }));
    }

    for joined in futures::future::join_all(handles).await {
        let (failures, attempts, records, success) = joined.expect("task completes");
        assert!(success);
        assert_eq!(attempts, failures + 1);
        assert_eq!(records, failures as usize);
    }
    assert_eq!(sleeper.waits().len(), 6);
}

/// Usage diagnostics are gathered on exhaustion without changing the result.
#[tokio::test]
async fn monitor_diagnostics_do_not_affect_result() {
    init_logging();
    let sleeper = RecordingSleeper::new();
    let inspector = Arc::new(FixedLimitInspector::new(256, 1024, 256).with_exhausted_count());
    let executor = recording_executor(&sleeper)
        .with_monitor(Arc::new(UsageMonitor::new(inspector.clone())))
        .with_label("copy_batch");

    let script = ExhaustionScript::new(1);
    let value =
        executor.execute(&scenario_policy(), || script.call_async()).await.expect("recovers");

    assert_eq!(value, 2);
    assert_eq!(inspector.queries(), 1);
}

/// `RetryError<io::Error>` collapses into `io::Error` with `?`.
#[test]
fn retry_error_converts_into_io_error() {
    fn open_all(policy: &RetryPolicy, sleeper: &RecordingSleeper) -> io::Result<u32> {
        let script = ExhaustionScript::always_exhausted();
        let value = recording_executor(sleeper).execute_blocking(policy, || script.call())?;
        Ok(value)
    }

    let policy =
        RetryPolicy::builder().max_retries(1).initial_wait(millis(1)).build().expect("valid");
    let err = open_all(&policy, &RecordingSleeper::new()).expect_err("exhausted");
    assert!(is_exhaustion_io(&err));

    let failure = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<ExhaustionFailure<io::Error>>())
        .expect("attempt count kept");
    assert_eq!(failure.attempts_made(), 2);
    assert_eq!(failure.last_error().raw_os_error(), exhaustion_error().raw_os_error());
}

/// Real waits suspend only the calling task: other tasks keep running while
/// one call backs off.
#[tokio::test(start_paused = true)]
async fn backoff_suspends_only_the_caller() {
    let policy = RetryPolicy::builder()
        .max_retries(1)
        .initial_wait(Duration::from_secs(30))
        .max_wait(Duration::from_secs(30))
        .build()
        .expect("valid policy");
    let executor = RetryExecutor::new().without_monitor();

    let script = ExhaustionScript::new(1);
    let retrying = executor.execute(&policy, || script.call_async());
    let other = async {
        tokio::task::yield_now().await;
        "other task ran"
    };

    let (retried, other) = tokio::join!(retrying, other);
    assert_eq!(retried.expect("recovers"), 2);
    assert_eq!(other, "other task ran");
}
