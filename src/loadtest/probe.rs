//! Adaptive probe for an endpoint's safe operating limits.
//!
//! [`ProbeEngine`] scales one [`ProbeDimension`] of a text-generation request
//! upward by a constant factor, running one full concurrent round per
//! iteration, until the endpoint fails or the iteration budget runs out. It
//! reports the last configuration that completed without a single failed
//! invocation.
//!
//! # Stop conditions
//!
//! - **Exhausted**: `max_iters` rounds all succeeded.
//! - **Failed**: a round had at least one failed invocation, or the load test
//!   lost results. The engine waits a fixed recovery window so the endpoint
//!   can settle before anything else talks to it, then stops.
//!
//! Argument errors (zero concurrency, unusable scale factor) are returned as
//! `Err` without a recovery pause; they say nothing about the endpoint.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::loadtest::client::EndpointClient;
use crate::loadtest::engine::LoadTestDriver;
use crate::loadtest::error::LoadTestError;
use crate::loadtest::payload::Payload;
use crate::loadtest::retry::RetryPolicy;

/// Default iteration budget per probe.
pub const MAX_ITERS: u32 = 25;

/// Default growth factor applied to the probed dimension after a success.
pub const DEFAULT_SCALE_FACTOR: f64 = 1.2;

/// Pause after a failed round before the probe returns.
pub const RECOVERY_WAIT: Duration = Duration::from_secs(180);

/// Sampling temperature sent with probe payloads.
pub const DEFAULT_TEMPERATURE: f64 = 900.0;

/// Baseline input length when a probe plan leaves it unspecified.
pub const DEFAULT_INPUT_LENGTH: u64 = 500;

/// Baseline generation length when a probe plan leaves it unspecified.
pub const DEFAULT_MAX_NEW_TOKENS: u64 = 500;

/// Baseline concurrency when a probe plan leaves it unspecified.
pub const DEFAULT_CONCURRENT_REQUESTS: u64 = 1;

/// A tunable axis of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeDimension {
    /// Number of input tokens in the prompt.
    InputLength,
    /// Maximum number of tokens to generate.
    MaxNewTokens,
    /// Requests in flight at once.
    ConcurrentRequests,
}

impl fmt::Display for ProbeDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InputLength => "input_length",
            Self::MaxNewTokens => "max_new_tokens",
            Self::ConcurrentRequests => "concurrent_requests",
        };
        f.write_str(s)
    }
}

/// One configuration tried by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeAttempt {
    /// Number of input tokens in the prompt.
    pub input_length: u64,
    /// Maximum number of tokens to generate.
    pub max_new_tokens: u64,
    /// Requests in flight at once; also the number of requests per round.
    pub concurrent_requests: u64,
}

impl ProbeAttempt {
    /// Create an attempt from its three dimension values.
    pub fn new(input_length: u64, max_new_tokens: u64, concurrent_requests: u64) -> Self {
        Self {
            input_length,
            max_new_tokens,
            concurrent_requests,
        }
    }

    /// Value of `dimension`.
    pub fn get(&self, dimension: ProbeDimension) -> u64 {
        match dimension {
            ProbeDimension::InputLength => self.input_length,
            ProbeDimension::MaxNewTokens => self.max_new_tokens,
            ProbeDimension::ConcurrentRequests => self.concurrent_requests,
        }
    }

    /// Set `dimension` to `value`.
    pub fn set(&mut self, dimension: ProbeDimension, value: u64) {
        match dimension {
            ProbeDimension::InputLength => self.input_length = value,
            ProbeDimension::MaxNewTokens => self.max_new_tokens = value,
            ProbeDimension::ConcurrentRequests => self.concurrent_requests = value,
        }
    }

    /// Copy of this attempt with `dimension` scaled by `factor`, rounded up.
    pub fn scaled(&self, dimension: ProbeDimension, factor: f64) -> Self {
        let mut next = *self;
        next.set(dimension, scale_up(self.get(dimension), factor));
        next
    }

    /// Text-generation payload for this attempt.
    pub fn payload(&self, temperature: f64) -> Payload {
        Payload::text_generation(self.input_length, self.max_new_tokens, temperature)
    }
}

impl fmt::Display for ProbeAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "input_length={} max_new_tokens={} concurrent_requests={}",
            self.input_length, self.max_new_tokens, self.concurrent_requests
        )
    }
}

/// Multiply `value` by `factor` and round up.
///
/// ```
/// use endpoint_bench::loadtest::probe::scale_up;
///
/// assert_eq!(scale_up(500, 1.2), 600);
/// assert_eq!(scale_up(864, 1.2), 1037);
/// assert_eq!(scale_up(1, 1.2), 2);
/// ```
pub fn scale_up(value: u64, factor: f64) -> u64 {
    let scaled = (value as f64 * factor).ceil();
    if scaled >= u64::MAX as f64 {
        u64::MAX
    } else {
        scaled as u64
    }
}

/// Why a probe stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeStop {
    /// Every round within the iteration budget succeeded.
    Exhausted,
    /// A round failed; `attempt` is the configuration that failed.
    Failed {
        /// The failing configuration.
        attempt: ProbeAttempt,
        /// Human-readable failure description.
        reason: String,
    },
}

/// Result of one probe run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeOutcome {
    /// Dimension that was scaled.
    pub dimension: ProbeDimension,
    /// Configuration of the first round.
    pub start: ProbeAttempt,
    /// Last configuration verified successful; `None` if the first round failed.
    pub last_success: Option<ProbeAttempt>,
    /// Rounds run, including a failed final round.
    pub iterations: u32,
    /// Why the probe stopped.
    pub stop: ProbeStop,
}

impl ProbeOutcome {
    /// Returns `true` if the probe ended on a failure rather than the budget.
    pub fn found_limit(&self) -> bool {
        matches!(self.stop, ProbeStop::Failed { .. })
    }
}

/// Tuning knobs for [`ProbeEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    /// Maximum rounds per probe.
    pub max_iters: u32,
    /// Growth factor for the probed dimension.
    pub scale_factor: f64,
    /// Pause after a failed round.
    pub recovery_wait: Duration,
    /// Per-invocation retry policy inside each round.
    pub retry: RetryPolicy,
    /// Sampling temperature sent with every payload.
    pub temperature: f64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            max_iters: MAX_ITERS,
            scale_factor: DEFAULT_SCALE_FACTOR,
            recovery_wait: RECOVERY_WAIT,
            retry: RetryPolicy::default(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// One entry of the standard probe suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePlan {
    /// Dimension to scale.
    pub dimension: ProbeDimension,
    /// Starting configuration; the non-probed values stay fixed.
    pub start: ProbeAttempt,
}

impl ProbePlan {
    const fn new(
        dimension: ProbeDimension,
        input_length: u64,
        max_new_tokens: u64,
        concurrent_requests: u64,
    ) -> Self {
        Self {
            dimension,
            start: ProbeAttempt {
                input_length,
                max_new_tokens,
                concurrent_requests,
            },
        }
    }
}

/// The six probes run by [`ProbeEngine::run_probe`], in order.
pub const PROBE_SUITE: [ProbePlan; 6] = [
    ProbePlan::new(
        ProbeDimension::MaxNewTokens,
        100,
        DEFAULT_MAX_NEW_TOKENS,
        DEFAULT_CONCURRENT_REQUESTS,
    ),
    ProbePlan::new(
        ProbeDimension::MaxNewTokens,
        1000,
        DEFAULT_MAX_NEW_TOKENS,
        DEFAULT_CONCURRENT_REQUESTS,
    ),
    ProbePlan::new(
        ProbeDimension::InputLength,
        DEFAULT_INPUT_LENGTH,
        100,
        DEFAULT_CONCURRENT_REQUESTS,
    ),
    ProbePlan::new(
        ProbeDimension::InputLength,
        DEFAULT_INPUT_LENGTH,
        500,
        DEFAULT_CONCURRENT_REQUESTS,
    ),
    ProbePlan::new(
        ProbeDimension::ConcurrentRequests,
        DEFAULT_INPUT_LENGTH,
        100,
        DEFAULT_CONCURRENT_REQUESTS,
    ),
    ProbePlan::new(
        ProbeDimension::ConcurrentRequests,
        1000,
        100,
        DEFAULT_CONCURRENT_REQUESTS,
    ),
];

/// Probe driver bound to one endpoint.
pub struct ProbeEngine {
    driver: LoadTestDriver,
    settings: ProbeSettings,
}

impl ProbeEngine {
    /// Creates an engine with default settings.
    pub fn new(client: Arc<dyn EndpointClient>) -> Self {
        Self::with_settings(client, ProbeSettings::default())
    }

    /// Creates an engine with explicit settings.
    pub fn with_settings(client: Arc<dyn EndpointClient>, settings: ProbeSettings) -> Self {
        let driver = LoadTestDriver::new(client).with_retry_policy(settings.retry);
        Self { driver, settings }
    }

    /// Returns the engine's settings.
    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Scale `dimension` from the given starting values until the endpoint
    /// fails or the iteration budget is spent.
    pub async fn probe(
        &self,
        dimension: ProbeDimension,
        input_length: u64,
        max_new_tokens: u64,
        concurrent_requests: u64,
    ) -> Result<ProbeOutcome, LoadTestError> {
        if self.settings.max_iters == 0 {
            return Err(LoadTestError::invalid_argument("max_iters must be at least 1"));
        }
        let factor = self.settings.scale_factor;
        if !factor.is_finite() || factor <= 0.0 {
            return Err(LoadTestError::invalid_argument(format!(
                "scale_factor must be a positive number, got {factor}"
            )));
        }
        if concurrent_requests == 0 {
            return Err(LoadTestError::invalid_argument(
                "concurrent_requests must be at least 1",
            ));
        }

        let start = ProbeAttempt::new(input_length, max_new_tokens, concurrent_requests);
        let mut current = start;
        let mut last_success = None;
        let mut iterations = 0u32;

        tracing::info!(%dimension, start = %start, "Running probe");

        for iteration in 0..self.settings.max_iters {
            iterations += 1;
            let payload = current.payload(self.settings.temperature);
            let requests = current.concurrent_requests;

            let failure = match self.driver.run(&payload, requests, requests).await {
                Ok(stats) if stats.all_succeeded() => {
                    tracing::info!(
                        %dimension,
                        attempt = %current,
                        iteration,
                        duration_secs = stats.duration_secs,
                        "Probe round succeeded"
                    );
                    last_success = Some(current);
                    current = current.scaled(dimension, factor);
                    continue;
                },
                Ok(stats) => format!(
                    "{}/{} invocations failed: {}",
                    stats.failure_count,
                    stats.num_invocations,
                    stats.last_error.as_deref().unwrap_or("unknown error")
                ),
                Err(err @ LoadTestError::MissingResults { .. }) => err.to_string(),
                Err(err) => return Err(err),
            };

            tracing::warn!(
                %dimension,
                attempt = %current,
                iteration,
                reason = %failure,
                "Probe round failed, waiting {:?} for the endpoint to recover",
                self.settings.recovery_wait
            );
            tokio::time::sleep(self.settings.recovery_wait).await;

            return Ok(ProbeOutcome {
                dimension,
                start,
                last_success,
                iterations,
                stop: ProbeStop::Failed {
                    attempt: current,
                    reason: failure,
                },
            });
        }

        Ok(ProbeOutcome {
            dimension,
            start,
            last_success,
            iterations,
            stop: ProbeStop::Exhausted,
        })
    }

    /// Run one [`ProbePlan`].
    pub async fn probe_plan(&self, plan: &ProbePlan) -> Result<ProbeOutcome, LoadTestError> {
        self.probe(
            plan.dimension,
            plan.start.input_length,
            plan.start.max_new_tokens,
            plan.start.concurrent_requests,
        )
        .await
    }

    /// Run the standard six-probe suite in order and collect every outcome.
    pub async fn run_probe(&self) -> Result<Vec<ProbeOutcome>, LoadTestError> {
        let mut outcomes = Vec::with_capacity(PROBE_SUITE.len());
        for plan in &PROBE_SUITE {
            outcomes.push(self.probe_plan(plan).await?);
        }
        Ok(outcomes)
    }
}
