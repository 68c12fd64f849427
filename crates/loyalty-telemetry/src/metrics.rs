//! Prometheus metrics for the loyalty protocol.
//!
//! All metrics follow the naming convention: `loyalty_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Histogram, HistogramVec, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Protocol operations by outcome
    pub static ref OPERATIONS: CounterVec = CounterVec::new(
        Opts::new("loyalty_operations_total", "Protocol operations by outcome"),
        &["operation", "outcome"]  // outcome: committed/indeterminate/unauthorized
    ).expect("metric creation failed");

    /// Stale-snapshot commits that triggered a retry
    pub static ref COMMIT_CONFLICTS: Counter = Counter::new(
        "loyalty_commit_conflicts_total",
        "Optimistic commits rejected for a stale version"
    ).expect("metric creation failed");

    /// Tier changes caused by points operations
    pub static ref TIER_TRANSITIONS: CounterVec = CounterVec::new(
        Opts::new("loyalty_tier_transitions_total", "Pass tier changes"),
        &["direction"]  // direction: up/down
    ).expect("metric creation failed");

    /// Ledger submit latency
    pub static ref SUBMIT_DURATION: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "loyalty_ledger_submit_duration_seconds",
            "Time spent waiting for ledger submits"
        ).buckets(exponential_buckets(0.001, 2.0, 15).expect("valid buckets")),
        &["operation"]
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(OPERATIONS.clone()),
        Box::new(COMMIT_CONFLICTS.clone()),
        Box::new(TIER_TRANSITIONS.clone()),
        Box::new(SUBMIT_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
