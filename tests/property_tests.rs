//! Property-based tests for load test statistics and probe scaling.

use async_trait::async_trait;
use proptest::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use endpoint_bench::loadtest::client::EndpointClient;
use endpoint_bench::loadtest::engine::run_load_test;
use endpoint_bench::loadtest::error::InvokeError;
use endpoint_bench::loadtest::metrics::{InvocationResult, MetricsRecorder};
use endpoint_bench::loadtest::payload::Payload;
use endpoint_bench::loadtest::probe::{scale_up, ProbeAttempt, ProbeDimension};
use endpoint_bench::loadtest::retry::RetryPolicy;

/// Fails every `fail_every`-th call with a terminal error.
struct ModuloClient {
    fail_every: u64,
    calls: AtomicU64,
}

#[async_trait]
impl EndpointClient for ModuloClient {
    fn endpoint_name(&self) -> &str {
        "modulo"
    }

    async fn invoke(&self, _payload: &Payload) -> Result<serde_json::Value, InvokeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(5)).await;
        if self.fail_every > 0 && call % self.fail_every == 0 {
            return Err(InvokeError::Http {
                status: 400,
                body: String::new(),
            });
        }
        Ok(serde_json::json!({}))
    }

    async fn delete_model(&self) -> Result<(), InvokeError> {
        Ok(())
    }

    async fn delete_endpoint(&self) -> Result<(), InvokeError> {
        Ok(())
    }
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    /// Success plus failure count equals the number of recorded results.
    #[test]
    fn recorder_counts_match_results(
        successes in 0u64..100,
        failures in 0u64..50,
        latency_ms in 1u64..500,
    ) {
        let mut recorder = MetricsRecorder::new();
        let d = Duration::from_millis(latency_ms);
        for _ in 0..successes {
            recorder.record(&InvocationResult::success(d, d, 1));
        }
        for _ in 0..failures {
            recorder.record(&InvocationResult::failure(d, d, 1, InvokeError::Timeout));
        }
        let stats = recorder.finish(successes + failures, 1, Duration::from_secs(1));
        prop_assert_eq!(stats.success_count, successes);
        prop_assert_eq!(stats.failure_count, failures);
        prop_assert_eq!(stats.latencies_secs.len() as u64, successes + failures);
        prop_assert!(stats.error_rate() >= 0.0 && stats.error_rate() <= 1.0);
    }

    /// Throughput is successes over duration, never negative.
    #[test]
    fn throughput_is_successes_per_second(
        successes in 0u64..200,
        duration_ms in 0u64..60_000,
    ) {
        let mut recorder = MetricsRecorder::new();
        for _ in 0..successes {
            let d = Duration::from_millis(10);
            recorder.record(&InvocationResult::success(d, d, 1));
        }
        let duration = Duration::from_millis(duration_ms);
        let stats = recorder.finish(successes, 1, duration);

        prop_assert!(stats.throughput_rps >= 0.0);
        if duration_ms == 0 {
            prop_assert_eq!(stats.throughput_rps, 0.0);
        } else {
            let expected = successes as f64 / duration.as_secs_f64();
            prop_assert!((stats.throughput_rps - expected).abs() < 1e-9);
        }
    }

    /// p50 <= p90 <= p95 <= p99 <= max.
    #[test]
    fn percentiles_monotonic(latencies in prop::collection::vec(1u64..10_000, 1..200)) {
        let mut recorder = MetricsRecorder::new();
        for lat in &latencies {
            let d = Duration::from_millis(*lat);
            recorder.record(&InvocationResult::success(d, d, 1));
        }
        let l = recorder.finish(latencies.len() as u64, 1, Duration::from_secs(1)).latency;
        prop_assert!(l.min_ms <= l.p50_ms);
        prop_assert!(l.p50_ms <= l.p90_ms);
        prop_assert!(l.p90_ms <= l.p95_ms);
        prop_assert!(l.p95_ms <= l.p99_ms);
        prop_assert!(l.p99_ms <= l.max_ms);
    }

    /// Scaling by a factor above one always grows the value.
    #[test]
    fn scale_up_strictly_grows(value in 1u64..1_000_000, factor in 1.01f64..3.0) {
        let next = scale_up(value, factor);
        prop_assert!(next > value);
        prop_assert!(next as f64 >= value as f64 * factor);
    }

    /// Scaling one dimension leaves the others untouched.
    #[test]
    fn scaled_attempt_touches_one_dimension(
        input in 1u64..10_000,
        output in 1u64..10_000,
        concurrency in 1u64..100,
    ) {
        let attempt = ProbeAttempt::new(input, output, concurrency);
        let next = attempt.scaled(ProbeDimension::MaxNewTokens, 1.2);
        prop_assert_eq!(next.input_length, input);
        prop_assert_eq!(next.concurrent_requests, concurrency);
        prop_assert_eq!(next.max_new_tokens, scale_up(output, 1.2));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A batch of N invocations always reports exactly N results, for any
    /// concurrency between 1 and N, with failures counted.
    #[test]
    fn load_test_reports_every_invocation(
        n in 1u64..60,
        c_seed in 1u64..60,
        fail_every in 0u64..5,
    ) {
        let c = 1 + (c_seed - 1) % n;
        let client = Arc::new(ModuloClient { fail_every, calls: AtomicU64::new(0) });
        let payload = Payload::new("p", serde_json::json!({}));

        let stats = paused_runtime()
            .block_on(run_load_test(client.clone(), &payload, n, c, RetryPolicy::no_retry()))
            .unwrap();

        prop_assert_eq!(stats.invocation_count(), n);
        prop_assert_eq!(client.calls.load(Ordering::SeqCst), n);
        prop_assert_eq!(stats.concurrency, c);
        let expected_failures = if fail_every == 0 { 0 } else { n / fail_every };
        prop_assert_eq!(stats.failure_count, expected_failures);
        prop_assert!(stats.throughput_rps >= 0.0);
    }
}
