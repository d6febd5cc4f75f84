//! Bounded, fixed-delay retry for operations that depend on a peer which may
//! not be listening yet.
//!
//! The delay is constant between attempts. There is no exponential backoff:
//! the race being covered is a local service still starting up, so the
//! worst-case wait is simply `(max_attempts - 1) * delay`.

use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of attempts.
pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(5) {
    Some(n) => n,
    None => unreachable!(),
};

/// Default delay between attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// How many times to attempt an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: NonZeroU32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    #[must_use]
    pub fn new(max_attempts: NonZeroU32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Upper bound on the time spent sleeping between attempts.
    #[must_use]
    pub fn worst_case_wait(&self) -> Duration {
        self.delay * (self.max_attempts.get() - 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_DELAY)
    }
}

/// Serialized form of a [`RetryPolicy`] as it appears in configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: NonZeroU32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: u64::try_from(DEFAULT_DELAY.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.delay_ms))
    }
}

/// Every attempt failed.
#[derive(thiserror::Error, Debug)]
#[error("gave up after {attempts} attempt(s): {last_error}")]
pub struct RetryExhaustedError<E>
where
    E: std::error::Error + 'static,
{
    /// Number of attempts made.
    pub attempts: u32,
    /// The error from the final attempt.
    #[source]
    pub last_error: E,
}

/// Run `operation` until it succeeds or `policy.max_attempts` is reached.
///
/// Returns as soon as an attempt succeeds, without sleeping afterwards. Each
/// failure before the last is logged with its 1-based attempt number and
/// followed by `policy.delay`.
///
/// # Errors
///
/// Returns `RetryExhaustedError` carrying the last error once every attempt
/// has failed.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryExhaustedError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.get();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(policy.delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(attempt, max_attempts, error = %e, "Final attempt failed");
                return Err(RetryExhaustedError {
                    attempts: attempt,
                    last_error: e,
                });
            }
        }
    }
}
