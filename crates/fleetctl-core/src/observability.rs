//! Ambient logging/metrics facade (spec §6 "Observability"), grounded on the
//! teacher's `status::ReadyState` + `tracing`-backed metrics shim: a small
//! trait seam so call sites depend on `Observability` rather than directly on
//! `tracing`/a specific metrics backend, letting tests swap in a recording
//! fake.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Coarse health signal surfaced on the process status endpoint. A critical
/// circuit breaker tripping to `Open` drives this to `Down` (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum HealthState {
    Up,
    Degraded,
    Down,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthState::Up => "up",
            HealthState::Degraded => "degraded",
            HealthState::Down => "down",
        };
        f.write_str(s)
    }
}

const HEALTH_UP: u8 = 0;
const HEALTH_DEGRADED: u8 = 1;
const HEALTH_DOWN: u8 = 2;

/// Process-wide health flag, shared via `Arc` between the resilience fabric
/// (which writes it) and the status endpoint (which reads it).
#[derive(Default)]
pub struct HealthFlag(AtomicU8);

impl HealthFlag {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(HEALTH_UP)))
    }

    pub fn set(&self, state: HealthState) {
        let value = match state {
            HealthState::Up => HEALTH_UP,
            HealthState::Degraded => HEALTH_DEGRADED,
            HealthState::Down => HEALTH_DOWN,
        };
        self.0.store(value, Ordering::Release);
    }

    pub fn get(&self) -> HealthState {
        match self.0.load(Ordering::Acquire) {
            HEALTH_DOWN => HealthState::Down,
            HEALTH_DEGRADED => HealthState::Degraded,
            _ => HealthState::Up,
        }
    }
}

/// Metrics surface used by every crate: counters for attempt/success/failure
/// style events and histograms for latencies (spec §6's
/// `ping.attempt/success/failure` and percentile examples).
pub trait Metrics: Send + Sync {
    fn increment_counter(&self, name: &'static str, labels: &[(&'static str, &str)]);
    fn record_histogram(&self, name: &'static str, value: f64, labels: &[(&'static str, &str)]);
}

/// A `tracing`-backed `Metrics` impl: counters and histograms are emitted as
/// structured `tracing::info!` events rather than pushed to a specific
/// backend, leaving the choice of exporter (Prometheus, OTLP, ...) to
/// whatever `tracing_subscriber` layer the binary installs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl Metrics for TracingMetrics {
    fn increment_counter(&self, name: &'static str, labels: &[(&'static str, &str)]) {
        tracing::info!(metric = name, kind = "counter", ?labels, "metric.counter");
    }

    fn record_histogram(&self, name: &'static str, value: f64, labels: &[(&'static str, &str)]) {
        tracing::info!(metric = name, kind = "histogram", value, ?labels, "metric.histogram");
    }
}

/// Installs the process-wide `tracing` subscriber (spec §6: structured JSON
/// logs with `request_id`/`service_name` fields, level from `RUST_LOG`).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(true).json().try_init();
}

/// Running percentile estimates over a bounded sample buffer, used by the
/// heartbeat producer to report p50/p90/p95/p99 latencies (spec §4.1) without
/// pulling in a full metrics backend.
pub struct LatencyHistogram {
    samples: std::sync::Mutex<Vec<Duration>>,
    capacity: usize,
}

impl LatencyHistogram {
    pub fn new(capacity: usize) -> Self {
        Self { samples: std::sync::Mutex::new(Vec::with_capacity(capacity)), capacity: capacity.max(1) }
    }

    pub fn observe(&self, sample: Duration) {
        let mut samples = self.samples.lock().expect("latency histogram lock poisoned");
        if samples.len() == self.capacity {
            samples.remove(0);
        }
        samples.push(sample);
    }

    /// Returns `(p50, p90, p95, p99)` over the current buffer, or all-zero
    /// durations when no samples have been observed yet.
    pub fn percentiles(&self) -> (Duration, Duration, Duration, Duration) {
        let mut samples = self.samples.lock().expect("latency histogram lock poisoned").clone();
        if samples.is_empty() {
            return (Duration::ZERO, Duration::ZERO, Duration::ZERO, Duration::ZERO);
        }
        samples.sort();
        let at = |p: f64| {
            let idx = ((samples.len() as f64 - 1.0) * p).round() as usize;
            samples[idx.min(samples.len() - 1)]
        };
        (at(0.50), at(0.90), at(0.95), at(0.99))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_flag_round_trips() {
        let flag = HealthFlag::new();
        assert_eq!(flag.get(), HealthState::Up);
        flag.set(HealthState::Down);
        assert_eq!(flag.get(), HealthState::Down);
    }

    #[test]
    fn histogram_percentiles_track_inserted_samples() {
        let histogram = LatencyHistogram::new(100);
        for ms in 1..=100u64 {
            histogram.observe(Duration::from_millis(ms));
        }
        let (p50, p90, p95, p99) = histogram.percentiles();
        assert!(p50 < p90);
        assert!(p90 < p95);
        assert!(p95 <= p99);
    }
}
