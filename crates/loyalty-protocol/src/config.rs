//! # Protocol Configuration
//!
//! Tunables for the points engine and messaging.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded exponential backoff for optimistic commits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Full fetch-compute-commit cycles before `ConcurrentModification`.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay.
    pub max_delay_ms: u64,
    /// Randomize each delay within `[d/2, d]`.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 50,
            max_delay_ms: 2_000,
            jitter: true,
        }
    }
}

/// Loyalty protocol configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Conflict retry policy.
    pub retry: RetryConfig,
    /// A submit slower than this is reported as `Indeterminate`.
    pub submit_timeout_ms: u64,
    /// Maximum message or broadcast body, in bytes.
    pub max_message_len: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            submit_timeout_ms: 30_000,
            max_message_len: 1_024,
        }
    }
}

impl ProtocolConfig {
    /// Create a config for testing (fast retries, short timeouts).
    pub fn for_testing() -> Self {
        Self {
            retry: RetryConfig {
                max_attempts: 5,
                base_delay_ms: 1,
                max_delay_ms: 10,
                jitter: true,
            },
            submit_timeout_ms: 500,
            max_message_len: 256,
        }
    }

    /// Submit timeout as a `Duration`.
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}
