//! Per-invocation retry policy.
//!
//! A transient failure is retried after a fixed wait until the time elapsed
//! since the first attempt reaches the total retry budget. The terminal error
//! is returned inside the [`InvocationResult`]; it is never raised.

use std::time::Duration;
use tokio::time::Instant;

use crate::loadtest::client::EndpointClient;
use crate::loadtest::metrics::InvocationResult;
use crate::loadtest::payload::Payload;

/// Default wait between attempts.
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(30);

/// Default total retry budget per invocation.
pub const DEFAULT_MAX_TOTAL_RETRY_TIME: Duration = Duration::from_secs(120);

/// Fixed-wait retry policy bounded by total elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between a failed attempt and the next one.
    pub retry_wait: Duration,
    /// Stop retrying once this much time has passed since the first attempt.
    pub max_total_retry_time: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_wait: DEFAULT_RETRY_WAIT,
            max_total_retry_time: DEFAULT_MAX_TOTAL_RETRY_TIME,
        }
    }
}

impl RetryPolicy {
    /// Create a policy from a wait and a total budget.
    pub fn new(retry_wait: Duration, max_total_retry_time: Duration) -> Self {
        Self {
            retry_wait,
            max_total_retry_time,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Build a policy from fractional seconds as they appear in config files.
    ///
    /// Negative or non-finite values are treated as zero.
    pub fn from_secs_f64(retry_wait_secs: f64, max_total_retry_secs: f64) -> Self {
        Self::new(secs(retry_wait_secs), secs(max_total_retry_secs))
    }
}

fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

/// Invoke `client` with `payload`, retrying transient failures per `policy`.
///
/// The returned latency is that of the final attempt, so retry waits do not
/// pollute latency percentiles. The total time including waits is kept in
/// [`InvocationResult::elapsed`].
pub async fn invoke_with_retry(
    client: &dyn EndpointClient,
    payload: &Payload,
    policy: &RetryPolicy,
) -> InvocationResult {
    let first_attempt = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let attempt_start = Instant::now();
        let result = client.invoke(payload).await;
        let latency = attempt_start.elapsed();

        let err = match result {
            Ok(_) => {
                return InvocationResult::success(latency, first_attempt.elapsed(), attempts);
            },
            Err(err) => err,
        };

        let elapsed = first_attempt.elapsed();
        if !err.is_transient() || elapsed >= policy.max_total_retry_time {
            return InvocationResult::failure(latency, elapsed, attempts, err);
        }

        tracing::debug!(
            endpoint = client.endpoint_name(),
            payload = %payload.name,
            attempt = attempts,
            error = %err,
            "Invocation failed, retrying in {:?}",
            policy.retry_wait
        );
        tokio::time::sleep(policy.retry_wait).await;
    }
}
