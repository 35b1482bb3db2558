//! Retry with back-off for throttled remote calls.
//!
//! Errors opt in to retrying through [`IsRetryable`]; anything that is not
//! retryable is returned on the first failure. Waiting goes through a
//! [`Sleeper`] so the 30-minute default back-off is observable in tests.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::contract::Sleeper;

/// Classifies an error as transient (worth another attempt) or fatal.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

/// How often and how patiently to retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Wait before the first retry.
    #[serde(rename = "initial_delay_secs", with = "secs")]
    pub initial_delay: Duration,
    /// Upper bound for any single wait.
    #[serde(rename = "max_delay_secs", with = "secs")]
    pub max_delay: Duration,
    /// 1.0 keeps the delay fixed.
    pub backoff_multiplier: f64,
    /// Stretch each wait by a random 0-100%.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(8),
            initial_delay: Duration::from_secs(30 * 60),
            max_delay: Duration::from_secs(2 * 60 * 60),
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Fixed delay, `max_attempts` tries.
    pub fn fixed(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    fn allows_another(&self, attempts_made: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts_made < max,
            None => true,
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let scaled = current.as_secs_f64() * self.backoff_multiplier.max(1.0);
        Duration::try_from_secs_f64(scaled)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Outcome of a retry loop that did not succeed.
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// The error was not retryable.
    Fatal(E),
    /// Every allowed attempt failed with a retryable error; holds the last one.
    Exhausted { attempts: u32, last: E },
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `policy` runs out of attempts.
pub async fn with_retry<F, Fut, T, E, S>(
    policy: &RetryPolicy,
    sleeper: &S,
    mut operation: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    S: Sleeper + ?Sized,
{
    let mut attempts = 0u32;
    let mut delay = policy.initial_delay;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::info!(attempts, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && policy.allows_another(attempts) => {
                let wait = if policy.jitter { add_jitter(delay) } else { delay };
                tracing::warn!(
                    error = %e,
                    attempt = attempts,
                    max_attempts = ?policy.max_attempts,
                    delay_secs = wait.as_secs(),
                    "Operation throttled, backing off before retry"
                );
                sleeper.sleep(wait).await;
                delay = policy.next_delay(delay);
            }
            Err(e) if e.is_retryable() => {
                tracing::error!(error = %e, attempts, "Operation failed after all retry attempts exhausted");
                return Err(RetryFailure::Exhausted { attempts, last: e });
            }
            Err(e) => {
                tracing::error!(error = %e, "Operation failed with non-retryable error");
                return Err(RetryFailure::Fatal(e));
            }
        }
    }
}

/// Uniform jitter between `delay` and `2 * delay`. Falls back to `delay`
/// when the stretched value does not fit a `Duration`.
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + factor)).unwrap_or(delay)
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
