//! # Conflict Retry
//!
//! Bounded exponential backoff around an optimistic read-compute-commit cycle.

use crate::config::RetryConfig;
use crate::domain::LoyaltyError;
use crate::metrics::ProtocolMetrics;
use rand::{Rng, RngCore};
use std::future::Future;
use std::time::Duration;

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at `max_delay_ms`, with equal jitter in `[d/2, d]` when enabled.
pub fn backoff_delay(config: &RetryConfig, attempt: u32, rng: &mut impl RngCore) -> Duration {
    let exp = attempt.saturating_sub(1).min(32);
    let raw_ms = config
        .base_delay_ms
        .saturating_mul(1u64 << exp)
        .min(config.max_delay_ms);

    if !config.jitter || raw_ms <= 1 {
        return Duration::from_millis(raw_ms);
    }

    let half_ms = raw_ms / 2;
    let jitter_ms = rng.gen_range(0..=raw_ms - half_ms);
    Duration::from_millis(half_ms.saturating_add(jitter_ms))
}

/// Run `cycle` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` cycles have lost to concurrent writers.
///
/// The closure receives the 1-based attempt number and must redo the whole
/// fetch-compute-commit cycle; nothing from a failed attempt is reused.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    metrics: &ProtocolMetrics,
    operation: &'static str,
    mut cycle: F,
) -> Result<T, LoyaltyError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LoyaltyError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match cycle(attempt).await {
            Err(err) if err.is_retryable() => {
                metrics.record_conflict();
                if attempt >= max_attempts {
                    metrics.record_conflict_exhausted();
                    tracing::warn!(
                        operation,
                        attempts = attempt,
                        "[loyalty] giving up after repeated concurrent modifications"
                    );
                    return Err(LoyaltyError::ConcurrentModification { attempts: attempt });
                }

                let delay = {
                    let mut rng = rand::thread_rng();
                    backoff_delay(config, attempt, &mut rng)
                };
                tracing::debug!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "[loyalty] stale snapshot, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
