//! In-process engine metrics (spec.md §6's `getStats()` surface). No
//! external exporter: this crate's Non-goals exclude a metrics wire format,
//! but the ambient counters themselves are still carried synchronously.

use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    pub total_requests: u64,
    pub allowed_decisions: u64,
    pub denied_decisions: u64,
    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p99_ms: f64,
    pub avg_latency_ms: f64,
}

impl EngineMetrics {
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }
}

struct Inner {
    metrics: EngineMetrics,
    latency_samples: Vec<f64>,
}

const MAX_SAMPLES: usize = 10_000;

/// Synchronous counters behind a single `RwLock`, read on `get_metrics` and
/// written once per `check()` call.
pub struct MetricsCollector {
    inner: RwLock<Inner>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                metrics: EngineMetrics::default(),
                latency_samples: Vec::with_capacity(MAX_SAMPLES),
            }),
        }
    }

    pub fn record_decision(&self, allowed: bool, latency: Duration) {
        let mut inner = self.inner.write().expect("metrics lock poisoned");
        inner.metrics.total_requests += 1;
        if allowed {
            inner.metrics.allowed_decisions += 1;
        } else {
            inner.metrics.denied_decisions += 1;
        }

        let latency_ms = latency.as_secs_f64() * 1000.0;
        inner.latency_samples.push(latency_ms);
        if inner.latency_samples.len() > MAX_SAMPLES {
            inner.latency_samples.drain(0..1_000);
        }

        let sum: f64 = inner.latency_samples.iter().sum();
        inner.metrics.avg_latency_ms = sum / inner.latency_samples.len() as f64;

        let mut sorted = inner.latency_samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        inner.metrics.latency_p50_ms = percentile(&sorted, 0.50);
        inner.metrics.latency_p90_ms = percentile(&sorted, 0.90);
        inner.metrics.latency_p99_ms = percentile(&sorted, 0.99);
    }

    pub fn snapshot(&self) -> EngineMetrics {
        self.inner.read().expect("metrics lock poisoned").metrics.clone()
    }

    pub fn reset(&self) {
        let mut inner = self.inner.write().expect("metrics lock poisoned");
        inner.metrics = EngineMetrics::default();
        inner.latency_samples.clear();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64) * p) as usize;
    let idx = idx.min(sorted.len() - 1);
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_allow_and_deny_counts() {
        let collector = MetricsCollector::new();
        collector.record_decision(true, Duration::from_millis(1));
        collector.record_decision(false, Duration::from_millis(1));
        collector.record_decision(true, Duration::from_millis(1));
        let snap = collector.snapshot();
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.allowed_decisions, 2);
        assert_eq!(snap.denied_decisions, 1);
        assert!((snap.allow_rate() - 0.666).abs() < 0.01);
    }

    #[test]
    fn reset_clears_all_state() {
        let collector = MetricsCollector::new();
        collector.record_decision(true, Duration::from_millis(5));
        collector.reset();
        let snap = collector.snapshot();
        assert_eq!(snap.total_requests, 0);
    }

    #[test]
    fn latency_percentiles_are_populated() {
        let collector = MetricsCollector::new();
        collector.record_decision(true, Duration::from_millis(5));
        collector.record_decision(true, Duration::from_millis(10));
        collector.record_decision(true, Duration::from_millis(15));
        let snap = collector.snapshot();
        assert!(snap.latency_p50_ms > 0.0);
        assert!((snap.avg_latency_ms - 10.0).abs() < 1.0);
    }
}
