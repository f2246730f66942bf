//! Refresh metrics tracking using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::time::Instant;

/// Metrics collector for a periodic refresher.
///
/// Every instrument carries a `source` attribute once [`RefreshMetrics::for_source`]
/// has been applied (the layer builder does this automatically).
///
/// # Examples
///
/// ```rust,no_run
/// use periodic_config::metrics::RefreshMetrics;
/// use opentelemetry::global;
///
/// let metrics = RefreshMetrics::new(global::meter("periodic-config")).for_source("settings-db");
///
/// let timer = metrics.start_fetch();
/// // ... fetch ...
/// metrics.record_success(timer, 42);
/// ```
#[derive(Clone)]
pub struct RefreshMetrics {
    fetch_attempts: Counter<u64>,
    fetch_success: Counter<u64>,
    fetch_failures: Counter<u64>,
    skipped_ticks: Counter<u64>,
    fetch_duration: Histogram<f64>,
    snapshot_keys: Gauge<u64>,
    attributes: Vec<KeyValue>,
}

impl RefreshMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let fetch_attempts = meter
            .u64_counter("periodic_config.fetch.attempts")
            .with_description("Total number of fetch attempts")
            .build();

        let fetch_success = meter
            .u64_counter("periodic_config.fetch.success")
            .with_description("Number of fetches that swapped in a new snapshot")
            .build();

        let fetch_failures = meter
            .u64_counter("periodic_config.fetch.failures")
            .with_description("Number of failed fetches")
            .build();

        let skipped_ticks = meter
            .u64_counter("periodic_config.ticks.skipped")
            .with_description("Ticks dropped because a fetch was still in flight")
            .build();

        let fetch_duration = meter
            .f64_histogram("periodic_config.fetch.duration")
            .with_description("Duration of fetch operations in seconds")
            .with_unit("s")
            .build();

        let snapshot_keys = meter
            .u64_gauge("periodic_config.snapshot.keys")
            .with_description("Number of keys in the current snapshot")
            .build();

        Self {
            fetch_attempts,
            fetch_success,
            fetch_failures,
            skipped_ticks,
            fetch_duration,
            snapshot_keys,
            attributes: Vec::new(),
        }
    }

    /// Tag all recorded values with the source id.
    pub fn for_source(mut self, id: impl Into<String>) -> Self {
        self.attributes = vec![KeyValue::new("source", id.into())];
        self
    }

    /// Start a fetch timer and count the attempt.
    pub fn start_fetch(&self) -> Instant {
        self.fetch_attempts.add(1, &self.attributes);
        Instant::now()
    }

    /// Record a successful fetch that produced a snapshot with `keys` entries.
    pub fn record_success(&self, start: Instant, keys: usize) {
        self.fetch_success.add(1, &self.attributes);
        self.fetch_duration
            .record(start.elapsed().as_secs_f64(), &self.attributes);
        self.snapshot_keys.record(keys as u64, &self.attributes);
    }

    /// Record a failed fetch.
    pub fn record_failure(&self, start: Instant) {
        self.fetch_failures.add(1, &self.attributes);
        self.fetch_duration
            .record(start.elapsed().as_secs_f64(), &self.attributes);
    }

    /// Record a tick dropped by the single-flight rule.
    pub fn record_skipped_tick(&self) {
        self.skipped_ticks.add(1, &self.attributes);
    }
}
