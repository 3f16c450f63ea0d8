//! Bounded retries around fetch attempts
//!
//! A [`RetryPolicy`] runs an operation up to `max_attempts` times, sleeping
//! between attempts. Individual failures are logged and swallowed here; only
//! exhaustion of the whole budget surfaces, as [`FetchExhausted`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::retry;
use crate::errors::FetchExhausted;

/// Delay schedule between attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Same delay every time
    Fixed {
        #[serde(with = "humantime_serde")]
        delay: Duration,
    },
    /// Uniformly random delay in `[min, max]`
    Jitter {
        #[serde(with = "humantime_serde")]
        min: Duration,
        #[serde(with = "humantime_serde")]
        max: Duration,
    },
    /// Doubling from `base`, capped at `max`
    Exponential {
        #[serde(with = "humantime_serde")]
        base: Duration,
        #[serde(with = "humantime_serde")]
        max: Duration,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Jitter {
            min: retry::JITTER_MIN,
            max: retry::JITTER_MAX,
        }
    }
}

impl BackoffStrategy {
    fn schedule(&self) -> DelaySchedule {
        match self {
            Self::Fixed { delay } => DelaySchedule::Fixed(*delay),
            Self::Jitter { min, max } => DelaySchedule::Jitter {
                min: *min,
                max: (*max).max(*min),
            },
            Self::Exponential { base, max } => DelaySchedule::Exponential(
                ExponentialBackoffBuilder::new()
                    .with_initial_interval(*base)
                    .with_max_interval((*max).max(*base))
                    .with_multiplier(2.0)
                    .with_randomization_factor(0.0)
                    .with_max_elapsed_time(None)
                    .build(),
            ),
        }
    }
}

/// Per-call iterator over inter-attempt delays
enum DelaySchedule {
    Fixed(Duration),
    Jitter { min: Duration, max: Duration },
    Exponential(ExponentialBackoff),
}

impl DelaySchedule {
    fn next_delay(&mut self) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Jitter { min, max } => {
                let min_ms = min.as_millis() as u64;
                let max_ms = max.as_millis() as u64;
                Duration::from_millis(fastrand::u64(min_ms..=max_ms))
            }
            Self::Exponential(backoff) => backoff.next_backoff().unwrap_or(backoff.max_interval),
        }
    }
}

/// Retry budget and backoff for one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            backoff: BackoffStrategy::default(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Capped exponential backoff doubling from `base`
    pub fn exponential(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self::new(max_attempts, BackoffStrategy::Exponential { base, max })
    }

    /// No delay between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(
            max_attempts,
            BackoffStrategy::Fixed {
                delay: Duration::ZERO,
            },
        )
    }

    /// Delays this policy would sleep between attempts, in order
    pub fn delays(&self) -> Vec<Duration> {
        let mut schedule = self.backoff.schedule();
        (1..self.max_attempts.max(1))
            .map(|_| schedule.next_delay())
            .collect()
    }

    /// Run `op` until it succeeds or the attempt budget is spent
    ///
    /// `op` receives the 1-based attempt number. `label` identifies the query
    /// in logs and in the returned error.
    pub async fn call<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, FetchExhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut schedule = self.backoff.schedule();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(query = %label, attempt, "Fetch succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!(
                        query = %label,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Fetch attempt failed"
                    );
                    last_error = e.to_string();

                    if attempt < max_attempts {
                        let delay = schedule.next_delay();
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        Err(FetchExhausted {
            query: label.to_string(),
            attempts: max_attempts,
            last_error,
        })
    }
}

/// Run `op` up to `max_attempts` times with capped exponential backoff from `base_delay`
pub async fn call_with_retry<T, E, F, Fut>(
    label: &str,
    max_attempts: u32,
    base_delay: Duration,
    op: F,
) -> Result<T, FetchExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    RetryPolicy::exponential(max_attempts, base_delay, retry::BACKOFF_MAX)
        .call(label, op)
        .await
}
