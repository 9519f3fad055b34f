//! Retry policy for remote embedding calls.
//!
//! The wait before retry `k` (1-based) is drawn uniformly from
//! `[0, min(max_delay, multiplier * 2^(k-1))]`. Only errors classified as
//! transient are retried; anything else is returned on the spot.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use super::{EmbeddingError, EmbeddingResult};

/// Default number of attempts, the first call included.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Default backoff multiplier.
pub const DEFAULT_MULTIPLIER: Duration = Duration::from_secs(1);

/// Default backoff ceiling.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Bounded retry with random exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub multiplier: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            multiplier: DEFAULT_MULTIPLIER,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Upper bound of the wait before retry number `retry` (1-based).
    pub fn backoff_ceiling(&self, retry: usize) -> Duration {
        let exponent = retry.saturating_sub(1).min(31) as u32;
        let scaled = self.multiplier.saturating_mul(1u32 << exponent);
        scaled.min(self.max_delay)
    }

    /// Draw the wait before retry number `retry`.
    pub fn backoff<R: Rng + ?Sized>(&self, retry: usize, rng: &mut R) -> Duration {
        let ceiling = self.backoff_ceiling(retry).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(0..=ceiling))
    }

    /// Run `operation` until it succeeds, fails permanently, or the attempt budget runs out.
    ///
    /// # Arguments
    /// * `label` - Name of the operation, used in log lines
    /// * `operation` - Produces a fresh future for every attempt
    ///
    /// # Errors
    /// Returns the first non-transient error unchanged, or
    /// `EmbeddingError::RetriesExhausted` carrying the last transient error
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> EmbeddingResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EmbeddingResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.backoff(attempt, &mut rand::thread_rng());
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        label, attempt, attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_transient() => {
                    return Err(EmbeddingError::RetriesExhausted {
                        attempts,
                        last_error: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }
}
