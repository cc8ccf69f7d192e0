//! Bounded retry with backoff around a single remote call.
//!
//! A call is attempted at most `max_attempts` times. Only errors that report
//! themselves as [`Retryable`] are attempted again; anything else ends the
//! loop on the spot. Delays come from the `backoff` crate and are served
//! through a [`Sleeper`] so tests can run without real time passing.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::{Backoff, Constant};
use backoff::ExponentialBackoff;
use tracing::{debug, warn};

use crate::types::{BackoffKind, DigestError, RetryConfig, SummarizeError};

/// Classification of a failure for retry purposes.
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Minimum wait requested by the remote side, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for SummarizeError {
    fn is_retryable(&self) -> bool {
        SummarizeError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        SummarizeError::retry_after(self)
    }
}

impl Retryable for DigestError {
    fn is_retryable(&self) -> bool {
        match self {
            DigestError::Summarize(e) => e.is_retryable(),
            DigestError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            DigestError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            DigestError::Summarize(e) => e.retry_after(),
            _ => None,
        }
    }
}

/// Suspends the current task between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Why a retried call finally failed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error; `last` is the final one.
    Exhausted { attempts: u32, last: E },
    /// A non-retryable error ended the loop.
    Permanent(E),
}

impl<E> RetryError<E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Permanent(e) => e,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted { attempts, last } => {
                write!(f, "retries exhausted after {} attempts: {}", attempts, last)
            }
            RetryError::Permanent(e) => write!(f, "{}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

impl<E: Into<DigestError>> From<RetryError<E>> for DigestError {
    fn from(err: RetryError<E>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => DigestError::RetriesExhausted {
                attempts,
                last: Box::new(last.into()),
            },
            RetryError::Permanent(e) => e.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff: BackoffKind,
}

impl RetryPolicy {
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: delay,
            backoff: BackoffKind::Constant,
        }
    }

    pub fn exponential(max_attempts: u32, initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff: BackoffKind::Exponential {
                multiplier,
                max_delay_ms: max_delay.as_millis() as u64,
            },
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff: config.backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn schedule(&self) -> DelaySchedule {
        match self.backoff {
            BackoffKind::Constant => DelaySchedule::Constant(Constant::new(self.initial_delay)),
            BackoffKind::Exponential { multiplier, max_delay_ms } => {
                DelaySchedule::Exponential(ExponentialBackoff {
                    current_interval: self.initial_delay,
                    initial_interval: self.initial_delay,
                    randomization_factor: 0.0,
                    multiplier,
                    max_interval: Duration::from_millis(max_delay_ms).max(self.initial_delay),
                    max_elapsed_time: None,
                    ..Default::default()
                })
            }
        }
    }

    /// Invoke `call` until it succeeds, fails permanently, or runs out of attempts.
    pub async fn run<T, E, F, Fut>(&self, sleeper: &dyn Sleeper, mut call: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let mut schedule = self.schedule();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Succeeded on attempt {}/{}", attempt, self.max_attempts);
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                debug!("Attempt {} failed permanently: {}", attempt, err);
                return Err(RetryError::Permanent(err));
            }

            if attempt >= self.max_attempts {
                warn!("Giving up after {} attempts: {}", attempt, err);
                return Err(RetryError::Exhausted { attempts: attempt, last: err });
            }

            let scheduled = schedule.next_delay(self.initial_delay);
            let delay = err.retry_after().map_or(scheduled, |requested| requested.max(scheduled));
            warn!(
                "Attempt {}/{} failed: {}; retrying in {:?}",
                attempt, self.max_attempts, err, delay
            );
            sleeper.sleep(delay).await;
        }
    }
}

enum DelaySchedule {
    Constant(Constant),
    Exponential(ExponentialBackoff),
}

impl DelaySchedule {
    fn next_delay(&mut self, fallback: Duration) -> Duration {
        let next = match self {
            DelaySchedule::Constant(backoff) => backoff.next_backoff(),
            DelaySchedule::Exponential(backoff) => backoff.next_backoff(),
        };
        next.unwrap_or(fallback)
    }
}
