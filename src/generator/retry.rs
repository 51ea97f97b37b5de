//! Bounded retry with linear backoff.
//!
//! `max_attempts` counts every call, the first one included. Between
//! attempt `n` and `n + 1` the loop sleeps `n × base_delay`. Non-retryable
//! failures end the loop immediately.

use super::{GenerationError, GenerationRequest, ImageGenerator};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// Delay before the attempt following `attempt` (1-based).
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    policy.base_delay * attempt
}

/// Terminal outcome of a retried generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    #[error("generation rejected ({source}); not retried")]
    Rejected { source: GenerationError },
    #[error("generation failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: GenerationError },
}

impl RetryError {
    pub fn last_error(&self) -> &GenerationError {
        match self {
            Self::Rejected { source } => source,
            Self::Exhausted { last, .. } => last,
        }
    }
}

/// Run `request` against `generator` under `policy`.
pub fn generate_with_retry(
    generator: &dyn ImageGenerator,
    request: &GenerationRequest,
    policy: &RetryPolicy,
) -> Result<Vec<u8>, RetryError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match generator.generate(request) {
            Ok(bytes) => {
                debug!(attempt, "generation succeeded");
                return Ok(bytes);
            }
            Err(err) if !err.is_retryable() => {
                warn!(attempt, kind = %err.kind, "generation rejected: {}", err.message);
                return Err(RetryError::Rejected { source: err });
            }
            Err(err) if attempt >= max_attempts => {
                warn!(attempt, kind = %err.kind, "generation attempts exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }
            Err(err) => {
                let delay = backoff_delay(policy, attempt);
                warn!(
                    attempt,
                    kind = %err.kind,
                    delay_ms = delay.as_millis() as u64,
                    "generation failed, retrying: {}",
                    err.message
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}
