//! Bounded retry with exponential backoff and jitter.
//!
//! Used by orchestration around the gate, never by the engine itself.
//! The delay after failed attempt `n` (1-indexed) is
//! `min(max_delay, base_delay * 2^(n-1))`, shifted by a uniform offset in
//! `±jitter * delay`. There is no delay before the first attempt and none
//! after the last.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least one attempt always runs.
    pub max_attempts: u32,
    /// Delay after the first failure, in milliseconds.
    pub base_delay_ms: u64,
    /// Ceiling on the un-jittered delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter fraction, 0.0..=1.0.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 300,
            max_delay_ms: 2000,
            jitter: 0.3,
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay after failed attempt `attempt` (1-indexed).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Jittered delay after failed attempt `attempt`. A non-finite jitter
    /// fraction is treated as no jitter.
    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.backoff(attempt).as_secs_f64();
        let jitter = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if jitter == 0.0 || base == 0.0 {
            return Duration::from_secs_f64(base);
        }
        let offset = rng.gen_range(-jitter..=jitter) * base;
        Duration::from_secs_f64((base + offset).max(0.0))
    }
}

/// Pause between attempts.
pub trait Sleeper {
    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Result of a retried call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryOutcome {
    /// Whether an attempt succeeded.
    pub ok: bool,
    /// Attempts made.
    pub attempts: u32,
    /// Message of the last attempt.
    pub message: String,
}

/// Runs a fallible `attempt -> (ok, message)` call under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryingClient<S = ThreadSleeper> {
    policy: RetryPolicy,
    sleeper: S,
}

impl RetryingClient<ThreadSleeper> {
    /// Client that sleeps the calling thread.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: ThreadSleeper,
        }
    }
}

impl<S: Sleeper> RetryingClient<S> {
    /// Client with a custom sleeper.
    pub fn with_sleeper(policy: RetryPolicy, sleeper: S) -> Self {
        Self { policy, sleeper }
    }

    /// The active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `attempt` until it reports success or attempts run out.
    /// `attempt` receives the 1-indexed attempt number.
    pub fn run<F>(&self, mut attempt: F) -> RetryOutcome
    where
        F: FnMut(u32) -> (bool, String),
    {
        let max = self.policy.max_attempts.max(1);
        let mut rng = rand::thread_rng();
        let mut n = 1;
        loop {
            let (ok, message) = attempt(n);
            if ok {
                return RetryOutcome {
                    ok,
                    attempts: n,
                    message,
                };
            }
            if n >= max {
                tracing::warn!(attempts = n, %message, "giving up after retries");
                return RetryOutcome {
                    ok: false,
                    attempts: n,
                    message,
                };
            }
            let delay = self.policy.delay(n, &mut rng);
            tracing::warn!(
                attempt = n,
                max_attempts = max,
                %message,
                "attempt failed, retrying in {delay:?}"
            );
            self.sleeper.sleep(delay);
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSleeper(RefCell<Vec<Duration>>);

    impl Sleeper for &RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.0.borrow_mut().push(duration);
        }
    }

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy::default();
        let ms: Vec<u128> = (1..=5).map(|n| p.backoff(n).as_millis()).collect();
        assert_eq!(ms, vec![300, 600, 1200, 2000, 2000]);
    }

    #[test]
    fn first_success_does_not_sleep() {
        let sleeper = RecordingSleeper::default();
        let client = RetryingClient::with_sleeper(no_jitter(), &sleeper);
        let out = client.run(|_| (true, "released:true".into()));
        assert_eq!(out.attempts, 1);
        assert!(out.ok);
        assert!(sleeper.0.borrow().is_empty());
    }

    #[test]
    fn exhausts_attempts_and_surfaces_last_message() {
        let sleeper = RecordingSleeper::default();
        let client = RetryingClient::with_sleeper(no_jitter(), &sleeper);
        let out = client.run(|n| (false, format!("released:false #{n}")));
        assert_eq!(
            out,
            RetryOutcome {
                ok: false,
                attempts: 5,
                message: "released:false #5".into()
            }
        );
        let slept: Vec<u128> = sleeper.0.borrow().iter().map(Duration::as_millis).collect();
        assert_eq!(slept, vec![300, 600, 1200, 2000]);
    }

    #[test]
    fn succeeds_midway() {
        let sleeper = RecordingSleeper::default();
        let client = RetryingClient::with_sleeper(no_jitter(), &sleeper);
        let out = client.run(|n| (n == 3, format!("try {n}")));
        assert!(out.ok);
        assert_eq!(out.attempts, 3);
        assert_eq!(sleeper.0.borrow().len(), 2);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy {
            max_attempts: 0,
            ..no_jitter()
        };
        let client = RetryingClient::with_sleeper(policy, &sleeper);
        assert_eq!(client.run(|_| (false, "x".into())).attempts, 1);
    }

    #[test]
    fn non_finite_jitter_falls_back_to_plain_backoff() {
        let mut rng = StdRng::seed_from_u64(7);
        for jitter in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let policy = RetryPolicy { jitter, ..RetryPolicy::default() };
            for attempt in 1..=5 {
                assert_eq!(policy.delay(attempt, &mut rng), policy.backoff(attempt));
            }
        }
    }

    #[test]
    fn nan_jitter_from_yaml_does_not_abort_a_run() {
        let policy: RetryPolicy =
            serde_yaml::from_str("max_attempts: 2\nbase_delay_ms: 1\njitter: .nan\n").unwrap();
        assert!(policy.jitter.is_nan());
        let sleeper = RecordingSleeper::default();
        let out = RetryingClient::with_sleeper(policy, &sleeper).run(|_| (false, "blocked".into()));
        assert_eq!(out.attempts, 2);
        assert_eq!(*sleeper.0.borrow(), vec![Duration::from_millis(1)]);
    }

    proptest! {
        #[test]
        fn jittered_delay_stays_within_band(attempt in 1u32..8, seed in any::<u64>(), jitter in 0.0f64..1.0) {
            let policy = RetryPolicy { jitter, ..RetryPolicy::default() };
            let base = policy.backoff(attempt).as_secs_f64();
            let d = policy.delay(attempt, &mut StdRng::seed_from_u64(seed)).as_secs_f64();
            prop_assert!(d >= base * (1.0 - jitter) - 1e-9);
            prop_assert!(d <= base * (1.0 + jitter) + 1e-9);
        }
    }
}
