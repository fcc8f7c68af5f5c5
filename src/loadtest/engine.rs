//! Bounded-concurrency load test driver.
//!
//! [`LoadTestDriver`] issues a fixed number of invocations against one
//! endpoint:
//! - Spawns up to `concurrency` worker tasks via [`TaskTracker`]
//! - Workers claim invocation slots from a shared atomic counter, so exactly
//!   `num_invocations` requests are issued regardless of scheduling
//! - Results flow through a bounded mpsc channel to a single-owner
//!   [`MetricsRecorder`]
//!
//! Invocation failures are counted, never raised. The only errors returned
//! are argument errors and a lost result (a worker panicked).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;

use crate::loadtest::client::EndpointClient;
use crate::loadtest::error::LoadTestError;
use crate::loadtest::metrics::{InvocationResult, LoadTestStatistics, MetricsRecorder};
use crate::loadtest::payload::Payload;
use crate::loadtest::retry::{invoke_with_retry, RetryPolicy};

/// Result channel capacity per worker.
const RESULTS_PER_WORKER: usize = 16;

/// Named load test modes layered on the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadTestMode {
    /// One request in flight at a time: single-stream latency.
    Latency,
    /// Up to the configured worker cap in flight: aggregate throughput.
    Throughput,
}

impl LoadTestMode {
    /// Concurrency used by this mode given the configured worker cap.
    pub fn concurrency(self, max_workers: u64) -> u64 {
        match self {
            Self::Latency => 1,
            Self::Throughput => max_workers,
        }
    }
}

impl fmt::Display for LoadTestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latency => f.write_str("latency"),
            Self::Throughput => f.write_str("throughput"),
        }
    }
}

/// Load test driver bound to one endpoint client and retry policy.
#[derive(Clone)]
pub struct LoadTestDriver {
    client: Arc<dyn EndpointClient>,
    retry: RetryPolicy,
}

impl LoadTestDriver {
    /// Creates a driver with the default retry policy.
    pub fn new(client: Arc<dyn EndpointClient>) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the per-invocation retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run `mode` with `num_invocations` requests.
    pub async fn run_mode(
        &self,
        mode: LoadTestMode,
        payload: &Payload,
        num_invocations: u64,
        max_workers: u64,
    ) -> Result<LoadTestStatistics, LoadTestError> {
        self.run(payload, num_invocations, mode.concurrency(max_workers))
            .await
    }

    /// Issue `num_invocations` requests with at most `concurrency` in flight.
    ///
    /// Concurrency above `num_invocations` is clamped. The batch duration is
    /// measured from just before the first worker starts until the last
    /// result has been received.
    pub async fn run(
        &self,
        payload: &Payload,
        num_invocations: u64,
        concurrency: u64,
    ) -> Result<LoadTestStatistics, LoadTestError> {
        if num_invocations == 0 {
            return Err(LoadTestError::invalid_argument(
                "num_invocations must be at least 1",
            ));
        }
        if concurrency == 0 {
            return Err(LoadTestError::invalid_argument(
                "concurrency must be at least 1",
            ));
        }
        let workers = concurrency.min(num_invocations);

        tracing::debug!(
            endpoint = self.client.endpoint_name(),
            payload = %payload.name,
            num_invocations,
            concurrency = workers,
            "Starting load test"
        );

        let tracker = TaskTracker::new();
        let next_slot = Arc::new(AtomicU64::new(0));
        let payload = Arc::new(payload.clone());
        let buffer_size = (workers as usize).saturating_mul(RESULTS_PER_WORKER);
        let (result_tx, mut result_rx) = mpsc::channel::<InvocationResult>(buffer_size);

        let start = Instant::now();
        for worker_id in 0..workers {
            tracker.spawn(worker_loop(
                worker_id,
                self.client.clone(),
                payload.clone(),
                self.retry,
                next_slot.clone(),
                num_invocations,
                result_tx.clone(),
            ));
        }
        tracker.close();

        // Drop original sender -- workers hold their own clones
        drop(result_tx);

        let mut recorder = MetricsRecorder::new();
        while let Some(result) = result_rx.recv().await {
            recorder.record(&result);
        }
        tracker.wait().await;
        let duration = start.elapsed();

        let received = recorder.count();
        if received != num_invocations {
            return Err(LoadTestError::MissingResults {
                expected: num_invocations,
                received,
            });
        }

        let stats = recorder.finish(num_invocations, workers, duration);
        tracing::debug!(
            endpoint = self.client.endpoint_name(),
            payload = %payload.name,
            successes = stats.success_count,
            failures = stats.failure_count,
            duration_secs = stats.duration_secs,
            "Load test finished"
        );
        Ok(stats)
    }
}

/// Issue `num_invocations` requests of `payload` against `client` with at
/// most `concurrency` in flight.
pub async fn run_load_test(
    client: Arc<dyn EndpointClient>,
    payload: &Payload,
    num_invocations: u64,
    concurrency: u64,
    retry: RetryPolicy,
) -> Result<LoadTestStatistics, LoadTestError> {
    LoadTestDriver::new(client)
        .with_retry_policy(retry)
        .run(payload, num_invocations, concurrency)
        .await
}

/// Worker task: claims slots until all invocations are issued.
async fn worker_loop(
    worker_id: u64,
    client: Arc<dyn EndpointClient>,
    payload: Arc<Payload>,
    retry: RetryPolicy,
    next_slot: Arc<AtomicU64>,
    total: u64,
    result_tx: mpsc::Sender<InvocationResult>,
) {
    loop {
        let slot = next_slot.fetch_add(1, Ordering::Relaxed);
        if slot >= total {
            return;
        }

        let result = invoke_with_retry(client.as_ref(), &payload, &retry).await;
        if let Err(ref err) = result.result {
            tracing::warn!(
                endpoint = client.endpoint_name(),
                payload = %payload.name,
                worker_id,
                attempts = result.attempts,
                error = %err,
                "Invocation failed"
            );
        }

        if result_tx.send(result).await.is_err() {
            // Receiver dropped -- the driver is gone
            return;
        }
    }
}
