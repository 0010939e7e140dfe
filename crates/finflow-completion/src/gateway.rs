use std::sync::Arc;
use std::time::Duration;

use crate::service::CompletionService;
use crate::types::{Completion, CompletionOptions};
use crate::{CompletionError, Result};

// ─── RetryPolicy ──────────────────────────────────────────────────────────

/// Exponential backoff for rate-limited calls: attempt `n` (0-based) waits
/// `base_delay * 2^n` before retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        // Cap the exponent so a misconfigured retry count cannot overflow.
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

// ─── CompletionGateway ────────────────────────────────────────────────────

/// The single entry point the engine uses to reach a [`CompletionService`].
///
/// Rate-limit failures are retried with [`RetryPolicy`] backoff; once the
/// retries are exhausted the call fails with `RateLimited`. Every other
/// failure is returned immediately as `Failed`.
#[derive(Clone)]
pub struct CompletionGateway {
    service: Arc<dyn CompletionService>,
    policy: RetryPolicy,
}

impl CompletionGateway {
    pub fn new(service: Arc<dyn CompletionService>, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    /// Run one completion. `latency` on the returned value covers the whole
    /// call, including any backoff.
    pub async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<Completion> {
        let started = tokio::time::Instant::now();
        let mut attempt = 0u32;
        loop {
            match self.service.complete(prompt, options).await {
                Ok(mut completion) => {
                    completion.latency = started.elapsed();
                    return Ok(completion);
                }
                Err(CompletionError::RateLimited(msg)) => {
                    if attempt >= self.policy.max_retries {
                        tracing::warn!(
                            service = self.service.name(),
                            attempts = attempt + 1,
                            "rate limit retries exhausted"
                        );
                        return Err(CompletionError::RateLimited(format!(
                            "{msg} (gave up after {} retries)",
                            self.policy.max_retries
                        )));
                    }
                    let delay = self.policy.delay_for(attempt);
                    tracing::debug!(
                        service = self.service.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(other) => return Err(other.into_failed()),
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
