//! Backoff computation for exhaustion retries.
//!
//! [`wait_for`] is pure: the same attempt number and policy always give the
//! same duration. Randomisation lives in [`Jitter`] and is applied separately
//! by the executor, after which the result is capped again.

use std::time::Duration;

use rand::Rng;

use crate::error::{CommonError, CommonResult};
use crate::resilience::policy::RetryPolicy;

/// Wait before retry number `attempt` (1 is the first retry).
///
/// `wait = min(initial_wait * multiplier^(attempt - 1), max_wait)`. Attempt 0
/// is treated as 1. The result saturates at `max_wait` for large attempt
/// numbers and is monotonically non-decreasing in `attempt`.
pub fn wait_for(attempt: u32, policy: &RetryPolicy) -> Duration {
    let max_wait = policy.max_wait();
    let exponent = attempt.max(1) - 1;
    let multiplier = policy.backoff_multiplier().max(1.0);

    let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
    let secs = policy.initial_wait().as_secs_f64() * multiplier.powi(exponent);

    if !secs.is_finite() || secs >= max_wait.as_secs_f64() {
        return max_wait;
    }

    Duration::try_from_secs_f64(secs).map_or(max_wait, |wait| wait.min(max_wait))
}

/// Randomisation applied on top of the computed wait.
///
/// Jitter only ever shortens a wait, so it can never break the `max_wait`
/// ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Jitter {
    /// Use the computed wait as is
    #[default]
    None,
    /// Subtract a random amount of up to `fraction` of the wait (`0.0..=1.0`)
    Proportional(f64),
}

impl Jitter {
    /// Apply jitter to `wait`, never exceeding `cap`
    pub fn apply(&self, wait: Duration, cap: Duration) -> Duration {
        let wait = wait.min(cap);
        match *self {
            Jitter::None => wait,
            Jitter::Proportional(fraction) => {
                if fraction.is_nan() || fraction <= 0.0 || wait.is_zero() {
                    return wait;
                }
                let fraction = fraction.min(1.0);
                let cut = rand::thread_rng().gen_range(0.0..=fraction);
                wait.mul_f64(1.0 - cut).min(wait)
            }
        }
    }

    pub(crate) fn validate(&self) -> CommonResult<()> {
        match *self {
            Jitter::None => Ok(()),
            Jitter::Proportional(fraction) if (0.0..=1.0).contains(&fraction) => Ok(()),
            Jitter::Proportional(fraction) => Err(CommonError::validation_with_value(
                "jitter",
                "fraction must be within 0.0..=1.0",
                fraction.to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial_ms: u64, multiplier: f64, max_ms: u64) -> RetryPolicy {
        RetryPolicy::builder()
            .initial_wait(Duration::from_millis(initial_ms))
            .backoff_multiplier(multiplier)
            .max_wait(Duration::from_millis(max_ms))
            .build()
            .expect("valid policy")
    }

    #[test]
    fn test_exponential_progression() {
        let p = policy(100, 2.0, 1000);
        assert_eq!(wait_for(1, &p), Duration::from_millis(100));
        assert_eq!(wait_for(2, &p), Duration::from_millis(200));
        assert_eq!(wait_for(3, &p), Duration::from_millis(400));
        assert_eq!(wait_for(4, &p), Duration::from_millis(800));
        assert_eq!(wait_for(5, &p), Duration::from_millis(1000));
    }

    #[test]
    fn test_cap_applies_before_overflow() {
        let p = policy(1000, 10.0, 5000);
        assert_eq!(wait_for(3, &p), Duration::from_secs(5));
        assert_eq!(wait_for(u32::MAX, &p), Duration::from_secs(5));
    }

    #[test]
    fn test_attempt_zero_is_first_retry() {
        let p = policy(250, 3.0, 10_000);
        assert_eq!(wait_for(0, &p), wait_for(1, &p));
    }

    #[test]
    fn test_multiplier_one_is_constant() {
        let p = policy(300, 1.0, 10_000);
        for attempt in 1..50 {
            assert_eq!(wait_for(attempt, &p), Duration::from_millis(300));
        }
    }

    #[test]
    fn test_monotonic_and_bounded() {
        for (initial, multiplier, max) in
            [(1, 1.5, 10), (500, 2.0, 10_000), (7, 13.0, 9_999), (10_000, 2.0, 10_000)]
        {
            let p = policy(initial, multiplier, max);
            let mut previous = Duration::ZERO;
            for attempt in 1..=200 {
                let wait = wait_for(attempt, &p);
                assert!(wait >= previous, "attempt {attempt} went backwards");
                assert!(wait <= p.max_wait());
                previous = wait;
            }
        }
    }

    #[test]
    fn test_jitter_none_is_identity_below_cap() {
        let wait = Duration::from_millis(400);
        assert_eq!(Jitter::None.apply(wait, Duration::from_secs(1)), wait);
        let cap = Duration::from_millis(100);
        assert_eq!(Jitter::None.apply(wait, cap), cap);
    }

    #[test]
    fn test_proportional_jitter_stays_within_band() {
        let wait = Duration::from_millis(1000);
        let cap = Duration::from_secs(2);
        for _ in 0..200 {
            let jittered = Jitter::Proportional(0.25).apply(wait, cap);
            assert!(jittered <= wait);
            assert!(jittered >= Duration::from_millis(750));
        }
    }

    #[test]
    fn test_jitter_validation() {
        assert!(Jitter::None.validate().is_ok());
        assert!(Jitter::Proportional(0.0).validate().is_ok());
        assert!(Jitter::Proportional(1.0).validate().is_ok());
        assert!(Jitter::Proportional(-0.1).validate().is_err());
        assert!(Jitter::Proportional(f64::NAN).validate().is_err());
    }
}
