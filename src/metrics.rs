//! Request and prediction metrics for the review sentiment service.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept for percentile calculation
const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector for the HTTP service
pub struct ServiceMetrics {
    /// Requests by endpoint path
    requests_by_endpoint: RwLock<BTreeMap<String, u64>>,
    /// Successful predictions
    pub predictions_total: AtomicU64,
    /// Requests rejected with 422
    pub validation_failures: AtomicU64,
    /// Requests that failed after validation
    pub inference_failures: AtomicU64,
    /// Successful predictions by label
    predictions_by_label: RwLock<BTreeMap<i64, u64>>,
    /// Prediction latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Positive-class probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            requests_by_endpoint: RwLock::new(BTreeMap::new()),
            predictions_total: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            inference_failures: AtomicU64::new(0),
            predictions_by_label: RwLock::new(BTreeMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record an incoming request
    pub fn record_request(&self, endpoint: &str) {
        if let Ok(mut by_endpoint) = self.requests_by_endpoint.write() {
            *by_endpoint.entry(endpoint.to_string()).or_insert(0) += 1;
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, latency: Duration, label: i64, probability: f64) {
        self.predictions_total.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_label) = self.predictions_by_label.write() {
            *by_label.entry(label).or_insert(0) += 1;
        }

        self.record_latency(latency);

        let bucket = (probability.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.probability_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a request rejected by validation
    pub fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failure during feature extraction or inference
    pub fn record_inference_failure(&self, latency: Duration) {
        self.inference_failures.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);
    }

    fn record_latency(&self, latency: Duration) {
        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            if times.len() > LATENCY_WINDOW {
                times.drain(0..LATENCY_WINDOW / 2);
            }
        }
    }

    /// Get latency statistics
    pub fn get_latency_stats(&self) -> LatencyStats {
        let Ok(times) = self.latencies.read() else {
            return LatencyStats::default();
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
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

    /// Total requests across all endpoints
    pub fn get_request_total(&self) -> u64 {
        self.get_requests_by_endpoint().values().sum()
    }

    /// Get requests by endpoint
    pub fn get_requests_by_endpoint(&self) -> BTreeMap<String, u64> {
        self.requests_by_endpoint
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Get successful predictions by label
    pub fn get_predictions_by_label(&self) -> BTreeMap<i64, u64> {
        self.predictions_by_label
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Get probability distribution
    pub fn get_probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Get current throughput (predictions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_total.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Export metrics in Prometheus text format
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str(
            "# HELP review_http_requests_total HTTP requests by endpoint\n\
             # TYPE review_http_requests_total counter\n",
        );
        for (endpoint, count) in self.get_requests_by_endpoint() {
            let _ = writeln!(out, "review_http_requests_total{{endpoint=\"{}\"}} {}", endpoint, count);
        }

        let _ = write!(
            out,
            "\n# HELP review_predictions_total Successful predictions\n\
             # TYPE review_predictions_total counter\n\
             review_predictions_total {}\n",
            self.predictions_total.load(Ordering::Relaxed)
        );
        out.push_str(
            "\n# HELP review_predictions_by_label_total Successful predictions by label\n\
             # TYPE review_predictions_by_label_total counter\n",
        );
        for (label, count) in self.get_predictions_by_label() {
            let _ = writeln!(out, "review_predictions_by_label_total{{label=\"{}\"}} {}", label, count);
        }

        let _ = write!(
            out,
            "\n# HELP review_validation_failures_total Requests rejected by validation\n\
             # TYPE review_validation_failures_total counter\n\
             review_validation_failures_total {}\n\n\
             # HELP review_inference_failures_total Requests that failed during inference\n\
             # TYPE review_inference_failures_total counter\n\
             review_inference_failures_total {}\n",
            self.validation_failures.load(Ordering::Relaxed),
            self.inference_failures.load(Ordering::Relaxed)
        );

        let latency = self.get_latency_stats();
        out.push_str(
            "\n# HELP review_prediction_latency_microseconds Prediction latency\n\
             # TYPE review_prediction_latency_microseconds summary\n",
        );
        for (quantile, value) in [("0.5", latency.p50_us), ("0.95", latency.p95_us), ("0.99", latency.p99_us)] {
            let _ = writeln!(
                out,
                "review_prediction_latency_microseconds{{quantile=\"{}\"}} {}",
                quantile, value
            );
        }
        let _ = writeln!(
            out,
            "review_prediction_latency_microseconds_count {}",
            latency.count
        );

        out.push_str(
            "\n# HELP review_probability_bucket Positive-class probability distribution\n\
             # TYPE review_probability_bucket gauge\n",
        );
        for (i, count) in self.get_probability_distribution().iter().enumerate() {
            let _ = writeln!(
                out,
                "review_probability_bucket{{range=\"{:.1}-{:.1}\"}} {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count
            );
        }

        out
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let requests = self.get_request_total();
        let predictions = self.predictions_total.load(Ordering::Relaxed);
        let validation_failures = self.validation_failures.load(Ordering::Relaxed);
        let inference_failures = self.inference_failures.load(Ordering::Relaxed);
        let latency = self.get_latency_stats();

        info!(
            requests = requests,
            predictions = predictions,
            validation_failures = validation_failures,
            inference_failures = inference_failures,
            throughput = format!("{:.1} pred/s", self.get_throughput()),
            "Service metrics summary"
        );
        info!(
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Prediction latency"
        );

        for (label, count) in self.get_predictions_by_label() {
            let pct = if predictions > 0 {
                (count as f64 / predictions as f64) * 100.0
            } else {
                0.0
            };
            info!(label = label, count = count, "Label share {:.1}%", pct);
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_request("/predict");
        metrics.record_request("/predict");
        metrics.record_request("/");
        metrics.record_prediction(Duration::from_micros(100), 1, 0.91);
        metrics.record_prediction(Duration::from_micros(300), 0, 0.12);
        metrics.record_validation_failure();
        metrics.record_inference_failure(Duration::from_micros(50));

        assert_eq!(metrics.get_request_total(), 3);
        assert_eq!(metrics.predictions_total.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.validation_failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.inference_failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.get_predictions_by_label().get(&1), Some(&1));

        let distribution = metrics.get_probability_distribution();
        assert_eq!(distribution[9], 1);
        assert_eq!(distribution[1], 1);

        let latency = metrics.get_latency_stats();
        assert_eq!(latency.count, 3);
        assert_eq!(latency.max_us, 300);
    }

    #[test]
    fn test_probability_one_lands_in_last_bucket() {
        let metrics = ServiceMetrics::new();
        metrics.record_prediction(Duration::from_micros(10), 1, 1.0);
        assert_eq!(metrics.get_probability_distribution()[9], 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = ServiceMetrics::new();
        metrics.record_request("/predict");
        metrics.record_prediction(Duration::from_micros(120), 1, 0.75);

        let text = metrics.to_prometheus();
        assert!(text.contains("review_http_requests_total{endpoint=\"/predict\"} 1"));
        assert!(text.contains("review_predictions_total 1"));
        assert!(text.contains("review_predictions_by_label_total{label=\"1\"} 1"));
        assert!(text.contains("review_prediction_latency_microseconds_count 1"));
        assert!(text.contains("review_probability_bucket{range=\"0.7-0.8\"} 1"));
    }

    #[test]
    fn test_empty_latency_stats() {
        let stats = ServiceMetrics::new().get_latency_stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.p99_us, 0);
    }
}
