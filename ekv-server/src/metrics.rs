//! # Server Metrics
//!
//! Counters and a latency histogram for the development server, rendered
//! into the `INFO` reply.
//!
//! Every counter is an independent atomic; `INFO` reads a snapshot, so the
//! numbers in one reply may be skewed by commands finishing concurrently.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default latency bucket boundaries in microseconds.
pub const DEFAULT_LATENCY_BUCKETS_US: [u64; 12] =
    [1, 2, 5, 10, 20, 50, 100, 200, 500, 1_000, 2_000, 5_000];

/// Snapshot of all server metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Commands received.
    pub commands_total: u64,
    /// Commands answered with an error reply.
    pub errors_total: u64,
    /// Commands currently executing.
    pub inflight: u64,
    /// Connections accepted.
    pub connections_total: u64,
    pub latency: LatencySnapshot,
}

/// Snapshot of the latency histogram.
#[derive(Debug, Clone)]
pub struct LatencySnapshot {
    /// Bucket boundaries in microseconds.
    pub bounds_us: Vec<u64>,
    /// Bucket counts, including the overflow bucket at the end.
    pub buckets: Vec<u64>,
    pub samples: u64,
    pub sum_us: u64,
}

impl LatencySnapshot {
    /// Upper bound (µs) of the bucket holding the `q` quantile, `None` when
    /// there are no samples or the quantile lands in the overflow bucket.
    pub fn quantile_upper_bound_us(&self, q: f64) -> Option<u64> {
        if self.samples == 0 {
            return None;
        }
        let target = ((self.samples as f64) * q).ceil().max(1.0) as u64;
        let mut seen = 0;
        for (idx, count) in self.buckets.iter().enumerate() {
            seen += count;
            if seen >= target {
                return self.bounds_us.get(idx).copied();
            }
        }
        None
    }
}

/// Thread-safe metrics aggregator. `Relaxed` ordering is enough: fields are
/// independent counters.
pub struct Metrics {
    commands_total: AtomicU64,
    errors_total: AtomicU64,
    inflight: AtomicU64,
    connections_total: AtomicU64,
    latency: LatencyHistogram,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            commands_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            inflight: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            latency: LatencyHistogram::new(DEFAULT_LATENCY_BUCKETS_US.to_vec()),
        }
    }

    pub fn record_connection(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command_start(&self) {
        self.commands_total.fetch_add(1, Ordering::Relaxed);
        self.inflight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command_end(&self, latency: Duration, failed: bool) {
        self.inflight.fetch_sub(1, Ordering::Relaxed);
        if failed {
            self.errors_total.fetch_add(1, Ordering::Relaxed);
        }
        self.latency.record(latency);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands_total: self.commands_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            inflight: self.inflight.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            latency: self.latency.snapshot(),
        }
    }

    /// Renders the `# Stats` section of `INFO`.
    pub fn render_info(&self) -> String {
        let snap = self.snapshot();
        let mut out = String::from("# Stats\r\n");
        let _ = write!(out, "total_connections_received:{}\r\n", snap.connections_total);
        let _ = write!(out, "total_commands_processed:{}\r\n", snap.commands_total);
        let _ = write!(out, "total_error_replies:{}\r\n", snap.errors_total);
        let _ = write!(out, "inflight_commands:{}\r\n", snap.inflight);
        let _ = write!(out, "latency_samples:{}\r\n", snap.latency.samples);
        let _ = write!(out, "latency_sum_us:{}\r\n", snap.latency.sum_us);
        match snap.latency.quantile_upper_bound_us(0.99) {
            Some(bound) => {
                let _ = write!(out, "latency_p99_le_us:{bound}\r\n");
            }
            None => out.push_str("latency_p99_le_us:inf\r\n"),
        }
        out
    }
}

/// Fixed-bucket latency histogram. Bucket lookup is a linear scan over a
/// short, sorted list of bounds.
pub struct LatencyHistogram {
    bounds_us: Vec<u64>,
    buckets: Vec<AtomicU64>,
    sum_us: AtomicU64,
    samples: AtomicU64,
}

impl LatencyHistogram {
    /// Creates a histogram with ascending bucket boundaries (microseconds).
    pub fn new(bounds_us: Vec<u64>) -> Self {
        let buckets = (0..=bounds_us.len()).map(|_| AtomicU64::new(0)).collect();
        LatencyHistogram {
            bounds_us,
            buckets,
            sum_us: AtomicU64::new(0),
            samples: AtomicU64::new(0),
        }
    }

    pub fn record(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.samples.fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(micros, Ordering::Relaxed);

        let bucket_idx = self
            .bounds_us
            .iter()
            .position(|&bound| micros <= bound)
            .unwrap_or(self.bounds_us.len());
        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            bounds_us: self.bounds_us.clone(),
            buckets: self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect(),
            samples: self.samples.load(Ordering::Relaxed),
            sum_us: self.sum_us.load(Ordering::Relaxed),
        }
    }
}
