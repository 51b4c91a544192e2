//! Exhaustion-aware retry executor
//!
//! [`RetryExecutor`] wraps an arbitrary operation. When the operation fails
//! with descriptor exhaustion (as decided by its [`ExhaustionClassifier`]) the
//! executor asks its [`Reclaimer`] to free leaked handles, waits according to
//! the [`RetryPolicy`], and invokes the operation again. Any other failure is
//! returned on the spot, unmodified, with no wait and no reclamation.
//!
//! The executor holds no mutable state. Any number of calls may run through
//! one executor (and one policy) concurrently; each call keeps its own
//! attempt bookkeeping. The only suspension point is the backoff wait, which
//! goes through the executor's [`Sleeper`].
//!
//! Dropping the future returned by [`RetryExecutor::execute`] abandons the
//! call at its next await point, including in the middle of a wait. The
//! blocking variants cannot be interrupted during a wait.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::limits::UsageMonitor;
use crate::resilience::backoff::wait_for;
use crate::resilience::classifier::{ExhaustionClassifier, OsErrorClassifier};
use crate::resilience::constants::DEFAULT_OPERATION_LABEL;
use crate::resilience::error::{ExhaustionFailure, RetryError, RetryResult};
use crate::resilience::policy::RetryPolicy;
use crate::resilience::reclaim::{NoopReclaimer, Reclaimer};
use crate::resilience::sleeper::{Sleeper, TokioSleeper};
use crate::resilience::tracing::{RetrySpan, RetryTracer};
use crate::utils::serde::duration_millis;

/// Bookkeeping for one retried attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    /// The failed attempt this record follows (1 is the initial attempt)
    pub attempt_number: u32,
    /// Wait performed before the next attempt
    #[serde(with = "duration_millis")]
    pub waited: Duration,
    /// Whether a reclamation pass ran and completed without error
    pub reclaimed: bool,
}

/// Outcome of an orchestrated call including result and summary statistics.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: RetryResult<T, E>,
    /// Invocations of the operation
    pub attempts: u32,
    /// One record per wait, in order
    pub records: Vec<AttemptRecord>,
    pub total_wait: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> RetryResult<T, E> {
        self.result
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Number of retries performed after the initial attempt
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    /// Waits performed, in order
    pub fn waits(&self) -> Vec<Duration> {
        self.records.iter().map(|record| record.waited).collect()
    }
}

/// Runs operations with exhaustion-aware retries.
///
/// ```rust,ignore
/// let executor = RetryExecutor::new().with_label("copy_evidence");
/// let bytes = executor.execute(&policy, || tokio::fs::read(&path)).await?;
/// ```
#[derive(Clone)]
pub struct RetryExecutor {
    classifier: Arc<dyn ExhaustionClassifier>,
    reclaimer: Arc<dyn Reclaimer>,
    sleeper: Arc<dyn Sleeper>,
    monitor: Option<Arc<UsageMonitor>>,
    label: Cow<'static, str>,
    tracer: RetryTracer,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self {
            classifier: Arc::new(OsErrorClassifier::new()),
            reclaimer: Arc::new(NoopReclaimer),
            sleeper: Arc::new(TokioSleeper),
            monitor: Some(Arc::new(UsageMonitor::system())),
            label: Cow::Borrowed(DEFAULT_OPERATION_LABEL),
            tracer: RetryTracer::new(),
        }
    }
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("label", &self.label)
            .field("classifier", &self.classifier)
            .field("reclaimer", &self.reclaimer)
            .field("sleeper", &self.sleeper)
            .field("monitor", &self.monitor.is_some())
            .finish()
    }
}

impl RetryExecutor {
    /// Executor with the OS classifier, a no-op reclaimer, real sleeps and
    /// usage diagnostics from the system inspector.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ExhaustionClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_reclaimer(mut self, reclaimer: Arc<dyn Reclaimer>) -> Self {
        self.reclaimer = reclaimer;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Attach usage figures to exhaustion events
    pub fn with_monitor(mut self, monitor: Arc<UsageMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn without_monitor(mut self) -> Self {
        self.monitor = None;
        self
    }

    /// Name used for the `operation` field of diagnostic events
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run `operation` until it succeeds, fails with something other than
    /// exhaustion, or exhausts `policy`.
    pub async fn execute<F, Fut, T, E>(
        &self,
        policy: &RetryPolicy,
        operation: F,
    ) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        self.execute_with_outcome(policy, operation).await.into_result()
    }

    /// Like [`execute`](Self::execute), also returning the attempt records.
    pub async fn execute_with_outcome<F, Fut, T, E>(
        &self,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let mut state = RetryLoop::new(self, policy);
        let mut attempt: u32 = 1;

        loop {
            match operation().await {
                Ok(value) => return state.finish(attempt, Ok(value)),
                Err(error) => match state.on_failure(attempt, error) {
                    ControlFlow::Break(err) => return state.finish(attempt, Err(err)),
                    ControlFlow::Continue(wait) => {
                        self.sleeper.sleep(wait).await;
                        attempt = attempt.saturating_add(1);
                    }
                },
            }
        }
    }

    /// Blocking form of [`execute`](Self::execute) for synchronous callers.
    ///
    /// Waits block the calling thread only.
    pub fn execute_blocking<F, T, E>(&self, policy: &RetryPolicy, operation: F) -> RetryResult<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Error + 'static,
    {
        self.execute_blocking_with_outcome(policy, operation).into_result()
    }

    pub fn execute_blocking_with_outcome<F, T, E>(
        &self,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Error + 'static,
    {
        let mut state = RetryLoop::new(self, policy);
        let mut attempt: u32 = 1;

        loop {
            match operation() {
                Ok(value) => return state.finish(attempt, Ok(value)),
                Err(error) => match state.on_failure(attempt, error) {
                    ControlFlow::Break(err) => return state.finish(attempt, Err(err)),
                    ControlFlow::Continue(wait) => {
                        self.sleeper.sleep_blocking(wait);
                        attempt = attempt.saturating_add(1);
                    }
                },
            }
        }
    }
}

/// Per-call state shared by the async and blocking loops
struct RetryLoop<'a> {
    executor: &'a RetryExecutor,
    policy: &'a RetryPolicy,
    // Created on the first exhaustion so the happy path emits nothing.
    span: Option<RetrySpan>,
    records: Vec<AttemptRecord>,
    total_wait: Duration,
}

impl<'a> RetryLoop<'a> {
    fn new(executor: &'a RetryExecutor, policy: &'a RetryPolicy) -> Self {
        Self { executor, policy, span: None, records: Vec::new(), total_wait: Duration::ZERO }
    }

    /// Decide what follows a failed `attempt`: stop with an error, or wait
    /// for the returned duration and try again.
    fn on_failure<E>(&mut self, attempt: u32, error: E) -> ControlFlow<RetryError<E>, Duration>
    where
        E: Error + 'static,
    {
        if !self.executor.classifier.is_exhaustion(&error) {
            match &self.span {
                Some(span) => span.record_unrelated(attempt, &error.to_string()),
                None => debug!(
                    operation = %self.executor.label,
                    error = %error,
                    "Operation failed with unrelated error, not retrying"
                ),
            }
            return ControlFlow::Break(RetryError::Operation(error));
        }

        let executor = self.executor;
        let policy = self.policy;
        let span = self.span.get_or_insert_with(|| {
            executor.tracer.start_retry_span(&executor.label, policy.max_retries())
        });

        let usage = executor.monitor.as_ref().map(|monitor| monitor.usage());
        span.record_exhaustion(attempt, &error.to_string(), usage.as_ref());

        if attempt > policy.max_retries() {
            span.record_exhausted(attempt, self.total_wait, &error.to_string());
            let failure = ExhaustionFailure::new(attempt, error);
            return ControlFlow::Break(RetryError::Exhausted(failure));
        }
        drop(error);

        let reclaimed = policy.trigger_reclaim()
            && match executor.reclaimer.trigger_reclaim() {
                Ok(()) => {
                    span.record_reclaim(attempt, Ok(()));
                    true
                }
                Err(e) => {
                    span.record_reclaim(attempt, Err(&e.to_string()));
                    false
                }
            };

        let wait = policy.jitter().apply(wait_for(attempt, policy), policy.max_wait());
        span.record_wait(attempt, wait);

        self.records.push(AttemptRecord { attempt_number: attempt, waited: wait, reclaimed });
        self.total_wait = self.total_wait.saturating_add(wait);
        ControlFlow::Continue(wait)
    }

    fn finish<T, E>(self, attempts: u32, result: RetryResult<T, E>) -> RetryOutcome<T, E> {
        if result.is_ok() {
            if let Some(span) = &self.span {
                span.record_success(attempts, self.total_wait);
            }
        }
        RetryOutcome { result, attempts, records: self.records, total_wait: self.total_wait }
    }
}

/// Run `operation` through a default [`RetryExecutor`]
pub async fn execute<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error + 'static,
{
    RetryExecutor::new().execute(policy, operation).await
}

/// Blocking counterpart of [`execute`]
pub fn execute_blocking<F, T, E>(policy: &RetryPolicy, operation: F) -> RetryResult<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Error + 'static,
{
    RetryExecutor::new().execute_blocking(policy, operation)
}
