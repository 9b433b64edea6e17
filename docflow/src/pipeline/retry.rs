//! Backoff policy for stage retries.
//!
//! The policy is a pure wait computation; the attempt budget and the
//! decision to re-raise the final failure live with the caller.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::errors::DocflowError;

/// Jitter applied on top of the computed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jitter {
    /// No jitter.
    #[default]
    None,
    /// Random wait from 0 to the computed delay.
    Full,
}

/// Exponential backoff clamped to a wait window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Multiplier applied to the exponential term, in seconds.
    pub base_multiplier: f64,
    /// Lower clamp for the wait.
    pub min_wait: Duration,
    /// Upper clamp for the wait.
    pub max_wait: Duration,
    /// Jitter strategy.
    pub jitter: Jitter,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_multiplier: 1.0,
            min_wait: Duration::from_secs(2),
            max_wait: Duration::from_secs(10),
            jitter: Jitter::None,
        }
    }
}

impl BackoffPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base multiplier, in seconds.
    #[must_use]
    pub fn with_base_multiplier(mut self, multiplier: f64) -> Self {
        self.base_multiplier = multiplier;
        self
    }

    /// Sets the minimum wait.
    #[must_use]
    pub fn with_min_wait(mut self, min: Duration) -> Self {
        self.min_wait = min;
        self
    }

    /// Sets the maximum wait.
    #[must_use]
    pub fn with_max_wait(mut self, max: Duration) -> Self {
        self.max_wait = max;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Computes the wait after a failed attempt.
    ///
    /// `attempt` is 1-indexed: the wait after the first failed attempt is
    /// `wait_for(1)`. Growth is `multiplier * 2^attempt` seconds, clamped
    /// to `[min_wait, max_wait]`.
    #[must_use]
    pub fn wait_for(&self, attempt: u32) -> Duration {
        let exp = self.base_multiplier * 2f64.powi(attempt.min(63) as i32);
        let clamped = exp
            .max(self.min_wait.as_secs_f64())
            .min(self.max_wait.as_secs_f64());

        let secs = match self.jitter {
            Jitter::None => clamped,
            Jitter::Full => {
                if clamped <= 0.0 {
                    0.0
                } else {
                    rand::thread_rng().gen_range(0.0..=clamped)
                }
            }
        };

        Duration::from_secs_f64(secs)
    }
}

/// Runs an operation up to `max_attempts` times, sleeping per the policy
/// between attempts.
///
/// The first attempt never waits, and the final failure is always returned
/// to the caller.
pub async fn retry_with_policy<T, F, Fut>(
    policy: &BackoffPolicy,
    max_attempts: u32,
    mut operation: F,
) -> Result<T, DocflowError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DocflowError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < max_attempts => {
                let wait = policy.wait_for(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    wait_ms = wait.as_millis() as u64,
                    error = %error,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
