//! Backoff policy for calls against the asynchronous retrieval endpoint.
//!
//! The remote queue answers "job still running" until an archive is ready,
//! so downloads are driven through a bounded retry loop with exponential
//! backoff rather than a fixed-interval wait.

use std::future::Future;
use std::time::Duration;

use log::warn;
use thiserror::Error;

/// Implemented by stage errors that can tell a transient condition from a
/// fatal one.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 8,
            initial_delay: Duration::from_secs(10),
            multiplier: 2.0,
            max_delay: Duration::from_secs(300),
        }
    }
}

#[derive(Error, Debug)]
pub enum RetryError<E>
where
    E: std::error::Error,
{
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error(transparent)]
    Fatal(E),
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (zero-based), capped at
    /// `max_delay`. The cap is applied in float seconds so a large
    /// `multiplier^attempt` cannot overflow `Duration`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powf(f64::from(attempt));
        let seconds = (self.initial_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());

        Duration::from_secs_f64(seconds)
    }

    /// Drives `op` until it succeeds, fails with a non-retryable error, or
    /// runs out of attempts.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + Retryable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(RetryError::Fatal(e)),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(RetryError::Exhausted { attempts: attempt, last: e });
                    }

                    let delay = self.delay_for(attempt - 1);
                    warn!("attempt {} failed ({}), retrying in {:?}", attempt, e, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

// -- Tests -------------------------------------------------------------------
