//! HdrHistogram-based statistics for a single load test batch.
//!
//! Provides [`MetricsRecorder`] for ingesting [`InvocationResult`] values and
//! [`LoadTestStatistics`], the immutable summary returned to callers.
//!
//! # Design
//!
//! - **Single-owner**: No `Arc<Mutex>` -- worker tasks send results through an
//!   mpsc channel and one task owns the recorder.
//! - **Success-only percentiles**: Failed requests are counted and classified
//!   but kept out of the latency histogram, so a burst of fast rejections
//!   does not make an endpoint look quicker.
//! - **Microsecond resolution**: Mock and local endpoints answer in well under
//!   a millisecond; percentiles are reported in fractional milliseconds.
//! - **No coordinated omission correction**: the batch is closed-loop with a
//!   fixed request count, so every recorded value is a real request.

use std::collections::BTreeMap;
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

use crate::loadtest::error::InvokeError;

/// Outcome of one invocation, including any retries.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    /// Latency of the final attempt.
    pub latency: Duration,
    /// Time from the first attempt to the final outcome, including retry waits.
    pub elapsed: Duration,
    /// Number of attempts made (at least 1).
    pub attempts: u32,
    /// `Ok(())` for success, the terminal error otherwise.
    pub result: Result<(), InvokeError>,
}

impl InvocationResult {
    /// Create a successful result.
    pub fn success(latency: Duration, elapsed: Duration, attempts: u32) -> Self {
        Self {
            latency,
            elapsed,
            attempts,
            result: Ok(()),
        }
    }

    /// Create a failed result carrying the terminal error.
    pub fn failure(latency: Duration, elapsed: Duration, attempts: u32, err: InvokeError) -> Self {
        Self {
            latency,
            elapsed,
            attempts,
            result: Err(err),
        }
    }

    /// Returns `true` if the invocation eventually succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Latency summary over successful requests, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    /// 50th percentile (median).
    pub p50_ms: f64,
    /// 90th percentile.
    pub p90_ms: f64,
    /// 95th percentile.
    pub p95_ms: f64,
    /// 99th percentile.
    pub p99_ms: f64,
    /// Fastest successful request.
    pub min_ms: f64,
    /// Slowest successful request.
    pub max_ms: f64,
    /// Arithmetic mean.
    pub mean_ms: f64,
}

/// Aggregate statistics for one load test batch.
///
/// Computed once by [`MetricsRecorder::finish`] and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadTestStatistics {
    /// Invocations requested for the batch.
    pub num_invocations: u64,
    /// Maximum in-flight requests used for the batch.
    pub concurrency: u64,
    /// Wall-clock duration of the whole batch, in seconds.
    pub duration_secs: f64,
    /// Invocations that eventually succeeded.
    pub success_count: u64,
    /// Invocations that exhausted their retry budget or failed terminally.
    pub failure_count: u64,
    /// Successful invocations per second of wall-clock time.
    pub throughput_rps: f64,
    /// Latency percentiles over successful invocations.
    pub latency: LatencySummary,
    /// Final-attempt latency of every invocation, in seconds, in arrival order.
    pub latencies_secs: Vec<f64>,
    /// Attempts made across all invocations, retries included.
    pub total_attempts: u64,
    /// Failure counts by error category.
    pub error_categories: BTreeMap<String, u64>,
    /// Message of the last failure seen, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl LoadTestStatistics {
    /// Total recorded invocations (success + failure).
    pub fn invocation_count(&self) -> u64 {
        self.success_count + self.failure_count
    }

    /// Failure rate as a fraction (0.0..=1.0). Returns 0.0 for an empty batch.
    pub fn error_rate(&self) -> f64 {
        let total = self.invocation_count();
        if total == 0 {
            return 0.0;
        }
        self.failure_count as f64 / total as f64
    }

    /// Returns `true` if every invocation succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0
    }
}

/// Single-owner recorder that turns invocation results into statistics.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use endpoint_bench::loadtest::metrics::{InvocationResult, MetricsRecorder};
///
/// let mut recorder = MetricsRecorder::new();
/// let d = Duration::from_millis(40);
/// recorder.record(&InvocationResult::success(d, d, 1));
///
/// let stats = recorder.finish(1, 1, Duration::from_millis(40));
/// assert_eq!(stats.success_count, 1);
/// assert!((stats.throughput_rps - 25.0).abs() < 1e-9);
/// ```
pub struct MetricsRecorder {
    /// Successful request latencies in microseconds.
    histogram: Histogram<u64>,
    success_count: u64,
    failure_count: u64,
    total_attempts: u64,
    latencies_secs: Vec<f64>,
    error_categories: BTreeMap<String, u64>,
    last_error: Option<String>,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    /// Create an empty recorder.
    ///
    /// The histogram keeps 3 significant figures and auto-resizes.
    pub fn new() -> Self {
        let mut histogram = Histogram::<u64>::new(3).expect("3 sigfigs is always valid");
        histogram.auto(true);

        Self {
            histogram,
            success_count: 0,
            failure_count: 0,
            total_attempts: 0,
            latencies_secs: Vec::new(),
            error_categories: BTreeMap::new(),
            last_error: None,
        }
    }

    /// Record one invocation result.
    pub fn record(&mut self, result: &InvocationResult) {
        self.total_attempts += u64::from(result.attempts);
        self.latencies_secs.push(result.latency.as_secs_f64());

        match &result.result {
            Ok(()) => {
                let micros = u64::try_from(result.latency.as_micros()).unwrap_or(u64::MAX);
                let _ = self.histogram.record(micros);
                self.success_count += 1;
            },
            Err(err) => {
                self.failure_count += 1;
                *self
                    .error_categories
                    .entry(err.error_category().to_owned())
                    .or_insert(0) += 1;
                self.last_error = Some(err.to_string());
            },
        }
    }

    /// Number of results recorded so far.
    pub fn count(&self) -> u64 {
        self.success_count + self.failure_count
    }

    fn quantile_ms(&self, q: f64) -> f64 {
        if self.histogram.is_empty() {
            return 0.0;
        }
        self.histogram.value_at_quantile(q) as f64 / 1000.0
    }

    fn latency_summary(&self) -> LatencySummary {
        if self.histogram.is_empty() {
            return LatencySummary::default();
        }
        LatencySummary {
            p50_ms: self.quantile_ms(0.50),
            p90_ms: self.quantile_ms(0.90),
            p95_ms: self.quantile_ms(0.95),
            p99_ms: self.quantile_ms(0.99),
            min_ms: self.histogram.min() as f64 / 1000.0,
            max_ms: self.histogram.max() as f64 / 1000.0,
            mean_ms: self.histogram.mean() / 1000.0,
        }
    }

    /// Consume the recorder and compute the batch statistics.
    pub fn finish(
        self,
        num_invocations: u64,
        concurrency: u64,
        duration: Duration,
    ) -> LoadTestStatistics {
        let duration_secs = duration.as_secs_f64();
        let throughput_rps = if duration_secs > 0.0 {
            self.success_count as f64 / duration_secs
        } else {
            0.0
        };
        let latency = self.latency_summary();

        LoadTestStatistics {
            num_invocations,
            concurrency,
            duration_secs,
            success_count: self.success_count,
            failure_count: self.failure_count,
            throughput_rps,
            latency,
            latencies_secs: self.latencies_secs,
            total_attempts: self.total_attempts,
            error_categories: self.error_categories,
            last_error: self.last_error,
        }
    }
}
