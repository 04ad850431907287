//! Observability hooks for forecast requests.
//!
//! The [`Forecaster`](crate::Forecaster) owns an `Arc<dyn MetricsSink>` handed
//! to it at construction. [`NoopMetrics`] is the default; [`AtomicMetrics`]
//! keeps lock-free in-process counters and histograms; [`RecorderMetrics`]
//! forwards to whatever `metrics` recorder the binary installed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

use crate::types::{Horizon, Provenance};

/// Observer for completed forecasts.
pub trait MetricsSink: Send + Sync {
    /// Record one completed forecast.
    ///
    /// `latency` is the search wall-clock time (zero when no search ran),
    /// `result_count` the number of analogs that fed the ensemble.
    fn record_forecast(
        &self,
        horizon: Horizon,
        k: usize,
        provenance: Provenance,
        latency: Duration,
        result_count: usize,
    );
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_forecast(&self, _: Horizon, _: usize, _: Provenance, _: Duration, _: usize) {}
}

/// Upper bucket bounds of [`LatencyHistogram`], in microseconds.
pub const LATENCY_BUCKETS_US: [u64; 13] = [
    50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 25_000, 50_000, 100_000, 250_000, 1_000_000,
];

/// Fixed-bucket histogram with atomic counts. The last slot collects
/// everything above the largest bound.
#[derive(Debug, Default)]
pub struct LatencyHistogram {
    buckets: [AtomicU64; LATENCY_BUCKETS_US.len() + 1],
    count: AtomicU64,
    sum_us: AtomicU64,
}

impl LatencyHistogram {
    pub fn record(&self, latency: Duration) {
        let us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        let slot = LATENCY_BUCKETS_US
            .iter()
            .position(|&bound| us <= bound)
            .unwrap_or(LATENCY_BUCKETS_US.len());
        self.buckets[slot].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(us, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> Duration {
        let count = self.count();
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.sum_us.load(Ordering::Relaxed) / count)
    }

    /// Upper bound of the bucket holding the `p`-quantile. Observations past
    /// the last bound report [`Duration::MAX`].
    pub fn percentile(&self, p: f64) -> Duration {
        let counts: Vec<u64> = self
            .buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }
        let target = ((p.clamp(0.0, 1.0) * total as f64).ceil() as u64).max(1);
        let mut seen = 0;
        for (slot, count) in counts.iter().enumerate() {
            seen += count;
            if seen >= target {
                return LATENCY_BUCKETS_US
                    .get(slot)
                    .map_or(Duration::MAX, |&us| Duration::from_micros(us));
            }
        }
        Duration::MAX
    }
}

/// In-process metrics built from atomics.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    real: AtomicU64,
    fallback: AtomicU64,
    latency: DashMap<(Horizon, usize), LatencyHistogram>,
    result_count: DashMap<Horizon, AtomicU64>,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn real_searches(&self) -> u64 {
        self.real.load(Ordering::Relaxed)
    }

    pub fn fallback_searches(&self) -> u64 {
        self.fallback.load(Ordering::Relaxed)
    }

    /// Last result count recorded for `horizon`.
    pub fn result_count(&self, horizon: Horizon) -> Option<u64> {
        self.result_count
            .get(&horizon)
            .map(|g| g.load(Ordering::Relaxed))
    }

    /// Number of latency observations for `(horizon, k)`.
    pub fn latency_count(&self, horizon: Horizon, k: usize) -> u64 {
        self.latency.get(&(horizon, k)).map_or(0, |h| h.count())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut latency: Vec<LatencySummary> = self
            .latency
            .iter()
            .map(|entry| {
                let (horizon, k) = *entry.key();
                let h = entry.value();
                LatencySummary {
                    horizon,
                    k,
                    count: h.count(),
                    mean_us: h.mean().as_micros() as u64,
                    p50_us: duration_us(h.percentile(0.50)),
                    p95_us: duration_us(h.percentile(0.95)),
                    p99_us: duration_us(h.percentile(0.99)),
                }
            })
            .collect();
        latency.sort_by_key(|s| (s.horizon, s.k));

        MetricsSnapshot {
            real_searches: self.real_searches(),
            fallback_searches: self.fallback_searches(),
            result_count: self
                .result_count
                .iter()
                .map(|e| (*e.key(), e.value().load(Ordering::Relaxed)))
                .collect(),
            latency,
        }
    }
}

fn duration_us(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

impl MetricsSink for AtomicMetrics {
    fn record_forecast(
        &self,
        horizon: Horizon,
        k: usize,
        provenance: Provenance,
        latency: Duration,
        result_count: usize,
    ) {
        match provenance {
            Provenance::Real => self.real.fetch_add(1, Ordering::Relaxed),
            Provenance::Fallback => self.fallback.fetch_add(1, Ordering::Relaxed),
        };
        self.latency
            .entry((horizon, k))
            .or_default()
            .record(latency);
        self.result_count
            .entry(horizon)
            .or_default()
            .store(result_count as u64, Ordering::Relaxed);
    }
}

/// Serializable view of [`AtomicMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub real_searches: u64,
    pub fallback_searches: u64,
    pub result_count: BTreeMap<Horizon, u64>,
    pub latency: Vec<LatencySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub horizon: Horizon,
    pub k: usize,
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
}

/// Forwards to the global `metrics` recorder.
///
/// Emits `analog_searches_total{provenance}`,
/// `analog_search_latency_seconds{horizon,k}` and `analog_result_count{horizon}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecorderMetrics;

impl MetricsSink for RecorderMetrics {
    fn record_forecast(
        &self,
        horizon: Horizon,
        k: usize,
        provenance: Provenance,
        latency: Duration,
        result_count: usize,
    ) {
        ::metrics::counter!("analog_searches_total", "provenance" => provenance.as_str()).increment(1);
        ::metrics::histogram!(
            "analog_search_latency_seconds",
            "horizon" => horizon.label(),
            "k" => k.to_string()
        )
        .record(latency.as_secs_f64());
        ::metrics::gauge!("analog_result_count", "horizon" => horizon.label()).set(result_count as f64);
    }
}
