//! Metrics hooks for protocol operations
//!
//! Lock-free counters kept by the protocol service. Every recording also
//! forwards to the process-wide Prometheus collectors in `loyalty-telemetry`.

use std::sync::atomic::{AtomicU64, Ordering};

use loyalty_telemetry::metrics as prom;
use loyalty_telemetry::HistogramTimer;

/// Counters for one protocol instance.
#[derive(Debug, Default)]
pub struct ProtocolMetrics {
    /// Committed ledger instructions
    pub commits: AtomicU64,
    /// Stale-snapshot conflicts that triggered a retry
    pub conflicts_retried: AtomicU64,
    /// Operations that ran out of retry attempts
    pub conflicts_exhausted: AtomicU64,
    /// Submits with unknown outcome
    pub indeterminate: AtomicU64,
    /// Rejected for missing capability
    pub unauthorized: AtomicU64,
    /// Tier changes caused by points operations
    pub tier_transitions: AtomicU64,
}

impl ProtocolMetrics {
    /// Create a zeroed collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed instruction.
    pub fn record_commit(&self, operation: &str) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        prom::OPERATIONS
            .with_label_values(&[operation, "committed"])
            .inc();
    }

    /// Record a conflict.
    pub fn record_conflict(&self) {
        self.conflicts_retried.fetch_add(1, Ordering::Relaxed);
        prom::COMMIT_CONFLICTS.inc();
    }

    /// Record retry exhaustion.
    pub fn record_conflict_exhausted(&self) {
        self.conflicts_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an ambiguous submit.
    pub fn record_indeterminate(&self, operation: &str) {
        self.indeterminate.fetch_add(1, Ordering::Relaxed);
        prom::OPERATIONS
            .with_label_values(&[operation, "indeterminate"])
            .inc();
    }

    /// Record an authority rejection.
    pub fn record_unauthorized(&self, operation: &str) {
        self.unauthorized.fetch_add(1, Ordering::Relaxed);
        prom::OPERATIONS
            .with_label_values(&[operation, "unauthorized"])
            .inc();
    }

    /// Record a tier change.
    pub fn record_tier_transition(&self, upgrade: bool) {
        self.tier_transitions.fetch_add(1, Ordering::Relaxed);
        prom::TIER_TRANSITIONS
            .with_label_values(&[if upgrade { "up" } else { "down" }])
            .inc();
    }

    /// Observe ledger submit latency until the timer drops.
    pub fn submit_timer(&self, operation: &str) -> HistogramTimer {
        HistogramTimer::new(&prom::SUBMIT_DURATION.with_label_values(&[operation]))
    }

    /// Current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commits: self.commits.load(Ordering::Relaxed),
            conflicts_retried: self.conflicts_retried.load(Ordering::Relaxed),
            conflicts_exhausted: self.conflicts_exhausted.load(Ordering::Relaxed),
            indeterminate: self.indeterminate.load(Ordering::Relaxed),
            unauthorized: self.unauthorized.load(Ordering::Relaxed),
            tier_transitions: self.tier_transitions.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ProtocolMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct MetricsSnapshot {
    pub commits: u64,
    pub conflicts_retried: u64,
    pub conflicts_exhausted: u64,
    pub indeterminate: u64,
    pub unauthorized: u64,
    pub tier_transitions: u64,
}
