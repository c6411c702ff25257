//! Retry executor: bounded re-execution of fallible async operations.
//!
//! The executor owns two budgets, a maximum attempt count and a wall-clock
//! allowance, and both are checked before every attempt. A failing run
//! terminates with [`EsperarError::RetryExhausted`] wrapping the last concrete
//! error, so callers never lose the underlying cause. Errors the taxonomy
//! marks non-retryable (bad index, unsupported strategy, ambiguity) abort
//! immediately without consuming further attempts.

use crate::result::{EsperarError, EsperarResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

/// Delay growth between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Backoff {
    /// No delay between attempts
    None,
    /// `base * attempt`
    Linear,
    /// `base * 2^(attempt - 1)`
    Exponential,
}

/// Attempt and time budgets for one retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first included
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Upper clamp on any single delay
    pub max_delay: Duration,
    /// Wall-clock allowance across all attempts and delays
    pub budget: Duration,
    /// Delay growth mode
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            budget: Duration::from_secs(10),
            backoff: Backoff::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Default policy (3 attempts, 100ms exponential, 10s budget)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tight policy for operations expected to settle quickly
    #[must_use]
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(500),
            budget: Duration::from_secs(2),
            backoff: Backoff::Exponential,
        }
    }

    /// Patient policy for slow backends and heavy pages
    #[must_use]
    pub fn slow() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            budget: Duration::from_secs(30),
            backoff: Backoff::Exponential,
        }
    }

    /// Set the attempt budget
    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the base delay
    #[must_use]
    pub const fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the wall-clock budget
    #[must_use]
    pub const fn budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Set the backoff mode
    #[must_use]
    pub const fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay to sleep after failed attempt number `attempt` (1-based),
    /// clamped to `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let raw = match self.backoff {
            Backoff::None => return Duration::ZERO,
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => self
                .base_delay
                .saturating_mul(2u32.saturating_pow(attempt - 1)),
        };
        raw.min(self.max_delay)
    }
}

/// Run `operation` under `policy` until it succeeds or a budget runs out.
///
/// Both budgets are checked before each attempt, so an exhausted policy never
/// starts work it has no allowance for.
///
/// # Errors
///
/// Non-retryable errors pass through unchanged on the attempt that produced
/// them. Exhaustion returns [`EsperarError::RetryExhausted`] carrying the
/// attempt count, total elapsed time, and the last concrete error.
pub async fn run<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> EsperarResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EsperarResult<T>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut last_error: Option<EsperarError> = None;

    loop {
        if attempts >= policy.max_attempts || start.elapsed() >= policy.budget {
            let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            let source = last_error.unwrap_or_else(|| EsperarError::Driver {
                message: "retry budget exhausted before the first attempt".to_string(),
            });
            return Err(EsperarError::RetryExhausted {
                attempts,
                elapsed_ms,
                source: Box::new(source),
            });
        }
        attempts += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if !error.is_retryable() => return Err(error),
            Err(error) => {
                debug!(attempt = attempts, %error, "attempt failed");
                last_error = Some(error);
            }
        }

        // Never sleep past the budget; the next loop turn will terminate.
        let remaining = policy.budget.saturating_sub(start.elapsed());
        if !remaining.is_zero() {
            tokio::time::sleep(policy.delay_for(attempts).min(remaining)).await;
        }
    }
}
