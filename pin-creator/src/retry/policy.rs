//! Bounded exponential backoff with deadline and cancellation awareness.
//!
//! The delay after failed attempt `n` (1-indexed) is
//! `min(base * multiplier^(n-1), max_delay)`. There is no jitter: a run has a
//! single caller, and deterministic delays keep the schedule testable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use super::Clock;
use crate::cancellation::{Interrupted, RunContext};

/// How a failed attempt should be treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure<E> {
    /// Worth another attempt after backing off.
    Retryable(E),
    /// Retrying cannot help; stop immediately.
    Permanent(E),
}

/// Why [`RetryPolicy::run_until_success`] gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The deadline passed or would pass during the next wait, or the context
    /// was cancelled.
    Timeout {
        /// Attempts started before giving up.
        attempts: u32,
        /// What interrupted the loop.
        interrupted: Interrupted,
        /// The last retryable failure, if one was seen.
        last: Option<E>,
    },
    /// The operation reported a permanent failure.
    Permanent(E),
    /// Every allowed attempt failed with a retryable error.
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// The final failure.
        last: E,
    },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout {
                attempts,
                interrupted,
                last: Some(last),
            } => write!(
                f,
                "{interrupted} after {attempts} attempt(s); last error: {last}"
            ),
            Self::Timeout {
                attempts,
                interrupted,
                last: None,
            } => write!(f, "{interrupted} after {attempts} attempt(s)"),
            Self::Permanent(e) => write!(f, "permanent failure: {e}"),
            Self::Exhausted { attempts, last } => {
                write!(f, "retries exhausted after {attempts} attempt(s): {last}")
            }
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Growth factor applied per attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
    /// Maximum delay cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Maximum attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> u32 {
    2
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    8
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Per-invocation bookkeeping for a retry loop.
#[derive(Debug)]
struct RetryState<E> {
    attempt: u32,
    next_delay: Duration,
    deadline: Option<Instant>,
    last: Option<E>,
}

impl RetryPolicy {
    /// Creates a policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = duration_ms(delay);
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = duration_ms(delay);
        self
    }

    /// Sets the maximum number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay to wait after failed attempt `attempt` (1-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = u64::from(self.multiplier.saturating_pow(exponent));
        let delay = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Runs `operation` until it succeeds, fails permanently, exhausts the
    /// attempt budget, or runs out of time on `ctx`.
    pub async fn run_until_success<T, E, F, Fut>(
        &self,
        ctx: &RunContext,
        clock: &dyn Clock,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure<E>>>,
        E: fmt::Display,
    {
        let mut state = RetryState {
            attempt: 0,
            next_delay: Duration::ZERO,
            deadline: ctx.deadline(),
            last: None,
        };

        loop {
            if let Some(interrupted) = ctx.check(clock.now()) {
                return Err(RetryError::Timeout {
                    attempts: state.attempt,
                    interrupted,
                    last: state.last.take(),
                });
            }

            state.attempt += 1;
            let error = match ctx.run(operation()).await {
                Err(interrupted) => {
                    return Err(RetryError::Timeout {
                        attempts: state.attempt,
                        interrupted,
                        last: state.last.take(),
                    });
                }
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(Failure::Permanent(e))) => return Err(RetryError::Permanent(e)),
                Ok(Err(Failure::Retryable(e))) => e,
            };

            if state.attempt >= self.max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: state.attempt,
                    last: error,
                });
            }

            state.next_delay = self.delay_for_attempt(state.attempt);
            if let Some(deadline) = state.deadline {
                if clock.now() + state.next_delay > deadline {
                    return Err(RetryError::Timeout {
                        attempts: state.attempt,
                        interrupted: Interrupted::DeadlineExceeded,
                        last: Some(error),
                    });
                }
            }

            tracing::debug!(
                attempt = state.attempt,
                delay_ms = duration_ms(state.next_delay),
                error = %error,
                "Retrying after error"
            );

            tokio::select! {
                biased;
                () = ctx.token().cancelled() => {
                    return Err(RetryError::Timeout {
                        attempts: state.attempt,
                        interrupted: Interrupted::Cancelled(
                            ctx.token().reason().unwrap_or_else(|| "cancelled".to_string()),
                        ),
                        last: Some(error),
                    });
                }
                () = clock.sleep(state.next_delay) => {}
            }

            state.last = Some(error);
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
