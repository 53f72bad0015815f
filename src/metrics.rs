//! Prediction counters and latency statistics for the engine.

use crate::schema::Disease;
use crate::types::prediction::{PredictionResult, RiskLabel};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector shared by every prediction path
pub struct EngineMetrics {
    /// Successful predictions
    pub predictions: AtomicU64,
    /// Failed predictions
    pub failures: AtomicU64,
    /// Requests that never reached the engine (undecodable input)
    pub malformed: AtomicU64,
    /// Outcomes by disease and label
    outcomes: RwLock<BTreeMap<(Disease, RiskLabel), u64>>,
    /// Failures by error kind
    failures_by_kind: RwLock<BTreeMap<&'static str, u64>>,
    /// Prediction latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Classifier risk score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            outcomes: RwLock::new(BTreeMap::new()),
            failures_by_kind: RwLock::new(BTreeMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, result: &PredictionResult, elapsed: Duration) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        *self
            .outcomes
            .write()
            .entry((result.disease, result.label))
            .or_insert(0) += 1;

        if let Some(score) = result.risk_score {
            let bucket = (score * 10.0).clamp(0.0, 9.0) as usize;
            self.score_buckets.write()[bucket] += 1;
        }

        self.record_latency(elapsed);
    }

    /// Record a failed prediction under its error kind
    pub fn record_failure(&self, kind: &'static str, elapsed: Duration) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        *self.failures_by_kind.write().entry(kind).or_insert(0) += 1;
        self.record_latency(elapsed);
    }

    /// Count a request that could not be decoded. No latency is sampled.
    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_latency(&self, elapsed: Duration) {
        let mut times = self.latencies.write();
        times.push(elapsed.as_micros() as u64);
        // Keep only the most recent samples
        if times.len() > 10000 {
            times.drain(0..5000);
        }
    }

    /// Latency statistics over the retained samples
    pub fn get_latency_stats(&self) -> LatencyStats {
        let mut sorted = self.latencies.read().clone();
        if sorted.is_empty() {
            return LatencyStats::default();
        }
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted[count - 1],
        }
    }

    /// Predictions per second since creation
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_outcomes(&self) -> BTreeMap<(Disease, RiskLabel), u64> {
        self.outcomes.read().clone()
    }

    pub fn get_failures_by_kind(&self) -> BTreeMap<&'static str, u64> {
        self.failures_by_kind.read().clone()
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        *self.score_buckets.read()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let ok = self.predictions.load(Ordering::Relaxed);
        let failed = self.failures.load(Ordering::Relaxed);
        let latency = self.get_latency_stats();

        info!(
            predictions = ok,
            failures = failed,
            malformed = self.malformed.load(Ordering::Relaxed),
            throughput = format!("{:.1} req/s", self.get_throughput()),
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Prediction summary"
        );

        for ((disease, label), count) in self.get_outcomes() {
            info!(disease = %disease, label = %label, count, "Outcomes");
        }
        for (kind, count) in self.get_failures_by_kind() {
            info!(kind, count, "Failures");
        }

        let buckets = self.get_score_distribution();
        let total: u64 = buckets.iter().sum();
        if total > 0 {
            for (i, &count) in buckets.iter().enumerate() {
                let pct = count as f64 / total as f64 * 100.0;
                info!(
                    "  risk score {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                    i as f64 / 10.0,
                    (i + 1) as f64 / 10.0,
                    count,
                    pct,
                    "█".repeat(((pct / 2.0) as usize).min(20))
                );
            }
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::input::RawInput;

    fn result(disease: Disease, label: RiskLabel, risk_score: Option<f64>) -> PredictionResult {
        PredictionResult {
            disease,
            label,
            strategy: disease.strategy(),
            inputs: RawInput::new(),
            risk_score,
            triggered_rules: Vec::new(),
        }
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = EngineMetrics::new();

        metrics.record_prediction(&result(Disease::Diabetes, RiskLabel::Risky, Some(0.8)), Duration::from_micros(100));
        metrics.record_prediction(&result(Disease::Diabetes, RiskLabel::Risky, Some(1.0)), Duration::from_micros(300));
        metrics.record_prediction(&result(Disease::Thyroid, RiskLabel::Healthy, None), Duration::from_micros(200));
        metrics.record_failure("validation", Duration::from_micros(10));

        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.get_outcomes()[&(Disease::Diabetes, RiskLabel::Risky)], 2);
        assert_eq!(metrics.get_failures_by_kind()["validation"], 1);

        let buckets = metrics.get_score_distribution();
        assert_eq!(buckets[8], 1);
        assert_eq!(buckets[9], 1);
        assert_eq!(buckets.iter().sum::<u64>(), 2);
    }

    #[test]
    fn test_malformed_requests_skip_latency() {
        let metrics = EngineMetrics::new();
        metrics.record_prediction(&result(Disease::Heart, RiskLabel::Healthy, Some(0.2)), Duration::from_micros(400));
        metrics.record_malformed();
        metrics.record_malformed();

        assert_eq!(metrics.malformed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.failures.load(Ordering::Relaxed), 0);
        assert!(metrics.get_failures_by_kind().is_empty());

        let stats = metrics.get_latency_stats();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.mean_us, 400);
        assert_eq!(stats.p50_us, 400);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = EngineMetrics::new();
        assert_eq!(metrics.get_latency_stats(), LatencyStats::default());

        for us in 1..=100 {
            metrics.record_failure("io", Duration::from_micros(us));
        }
        let stats = metrics.get_latency_stats();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.mean_us, 50);
        assert_eq!(stats.p50_us, 51);
        assert_eq!(stats.p99_us, 100);
        assert_eq!(stats.max_us, 100);
    }
}
