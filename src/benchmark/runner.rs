//! Multi-model benchmark orchestration.
//!
//! [`Benchmarker`] runs every configured payload through the enabled load
//! test modes against one endpoint per model:
//! - [`Benchmarker::run_single_predictor`] benchmarks an existing endpoint and
//!   tears it down afterwards, whatever happens
//! - [`Benchmarker::run_single_model_id`] deploys first
//! - [`Benchmarker::run_multiple_model_ids`] fans models out on a [`JoinSet`]
//!   bounded by `max_concurrent_benchmarks`, isolating per-model failures

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};

use crate::benchmark::config::BenchmarkConfig;
use crate::benchmark::deploy::{endpoint_name_for_model, ModelDeployer};
use crate::benchmark::error::BenchmarkError;
use crate::loadtest::client::EndpointClient;
use crate::loadtest::engine::{LoadTestDriver, LoadTestMode};
use crate::loadtest::metrics::LoadTestStatistics;

/// Statistics for one payload against one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadMetrics {
    /// Model the endpoint serves.
    pub model_id: String,
    /// Endpoint the load tests ran against.
    pub endpoint_name: String,
    /// Payload that was sent.
    pub payload_name: String,
    /// Concurrency-1 load test, when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LoadTestStatistics>,
    /// `max_workers` load test, when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<LoadTestStatistics>,
}

impl PayloadMetrics {
    fn new(model_id: &str, endpoint_name: &str, payload_name: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            endpoint_name: endpoint_name.to_string(),
            payload_name: payload_name.to_string(),
            latency: None,
            throughput: None,
        }
    }

    /// Statistics recorded for `mode`, if it ran.
    pub fn stats(&self, mode: LoadTestMode) -> Option<&LoadTestStatistics> {
        match mode {
            LoadTestMode::Latency => self.latency.as_ref(),
            LoadTestMode::Throughput => self.throughput.as_ref(),
        }
    }

    fn set_stats(&mut self, mode: LoadTestMode, stats: LoadTestStatistics) {
        match mode {
            LoadTestMode::Latency => self.latency = Some(stats),
            LoadTestMode::Throughput => self.throughput = Some(stats),
        }
    }
}

/// Outcome of a multi-model benchmark.
#[derive(Debug, Default)]
pub struct BenchmarkRun {
    /// Metrics of every model that completed, in completion order.
    pub metrics: Vec<PayloadMetrics>,
    /// Failure of every model that did not complete, keyed by model id.
    pub errors: BTreeMap<String, BenchmarkError>,
}

impl BenchmarkRun {
    /// Returns `true` if no model failed.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Benchmark orchestrator. Cheap to clone; the config is shared.
#[derive(Clone)]
pub struct Benchmarker {
    config: Arc<BenchmarkConfig>,
    deployer: Arc<dyn ModelDeployer>,
}

impl Benchmarker {
    /// Creates a benchmarker from a validated config and a deployer.
    pub fn new(config: BenchmarkConfig, deployer: Arc<dyn ModelDeployer>) -> Self {
        Self {
            config: Arc::new(config),
            deployer,
        }
    }

    /// Returns the config.
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Benchmark every payload against an already deployed endpoint.
    ///
    /// When `clean_up` is set, the model and endpoint are deleted exactly
    /// once after the payloads finish, fail, or panic. A panic is resumed
    /// after cleanup. Cleanup failures are logged and never replace the
    /// benchmark result.
    pub async fn run_single_predictor(
        &self,
        model_id: &str,
        client: Arc<dyn EndpointClient>,
        clean_up: bool,
    ) -> Result<Vec<PayloadMetrics>, BenchmarkError> {
        let outcome = AssertUnwindSafe(self.benchmark_payloads(model_id, &client))
            .catch_unwind()
            .await;

        if clean_up {
            tracing::info!(model_id, "Cleaning up resources");
            clean_up_endpoint(model_id, client.as_ref()).await;
        } else {
            tracing::info!(model_id, "Skipping resource cleanup");
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Deploy an endpoint for `model_id` and benchmark it.
    pub async fn run_single_model_id(
        &self,
        model_id: &str,
    ) -> Result<Vec<PayloadMetrics>, BenchmarkError> {
        let endpoint_name =
            endpoint_name_for_model(&self.config.settings.endpoint_prefix, model_id);
        tracing::info!(model_id, endpoint = %endpoint_name, "Deploying endpoint");
        let client = self.deployer.deploy(model_id, &endpoint_name).await?;
        self.run_single_predictor(model_id, client, self.config.settings.clean_up)
            .await
    }

    /// Benchmark many models concurrently.
    ///
    /// At most `max_concurrent_benchmarks` models run at once. A failing or
    /// panicking model lands in [`BenchmarkRun::errors`] and does not affect
    /// the others.
    pub async fn run_multiple_model_ids(&self, models: &[String]) -> BenchmarkRun {
        let semaphore = Arc::new(Semaphore::new(
            self.config.settings.max_concurrent_benchmarks.max(1),
        ));
        let mut tasks = JoinSet::new();
        let mut task_models = HashMap::with_capacity(models.len());

        for model_id in models {
            let this = self.clone();
            let semaphore = semaphore.clone();
            let task_model_id = model_id.clone();
            let handle = tasks.spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("benchmark semaphore is never closed");
                AssertUnwindSafe(this.run_single_model_id(&task_model_id))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(BenchmarkError::from_panic(panic.as_ref())))
            });
            task_models.insert(handle.id(), model_id.clone());
        }

        collect_results(tasks, task_models).await
    }

    async fn benchmark_payloads(
        &self,
        model_id: &str,
        client: &Arc<dyn EndpointClient>,
    ) -> Result<Vec<PayloadMetrics>, BenchmarkError> {
        let settings = &self.config.settings;
        let endpoint_name = client.endpoint_name().to_string();
        let driver = LoadTestDriver::new(client.clone()).with_retry_policy(settings.retry_policy());
        let modes = settings.modes();

        let mut metrics = Vec::with_capacity(self.config.payload.len());
        for payload in &self.config.payload {
            let mut record = PayloadMetrics::new(model_id, &endpoint_name, &payload.name);
            for &mode in &modes {
                tracing::info!(
                    model_id,
                    payload = %payload.name,
                    body_bytes = payload.body_len(),
                    %mode,
                    "Running load test"
                );
                let stats = driver
                    .run_mode(mode, payload, settings.num_invocations, settings.max_workers)
                    .await?;
                tracing::info!(
                    model_id,
                    payload = %payload.name,
                    %mode,
                    p50_ms = stats.latency.p50_ms,
                    throughput_rps = stats.throughput_rps,
                    failures = stats.failure_count,
                    "Load test finished"
                );
                record.set_stats(mode, stats);
            }
            metrics.push(record);
        }
        Ok(metrics)
    }
}

/// Drain `tasks` in completion order, keyed back to model ids by task id.
///
/// A task that fails to join is recorded under its model id like any other
/// failure.
async fn collect_results(
    mut tasks: JoinSet<Result<Vec<PayloadMetrics>, BenchmarkError>>,
    mut task_models: HashMap<Id, String>,
) -> BenchmarkRun {
    let mut run = BenchmarkRun::default();
    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(join_err) => (join_err.id(), Err(BenchmarkError::from_join_error(join_err))),
        };
        let Some(model_id) = task_models.remove(&id) else {
            tracing::error!(task = %id, "Benchmark task has no model id");
            continue;
        };
        match result {
            Ok(metrics) => {
                tracing::info!(
                    model_id = %model_id,
                    payloads = metrics.len(),
                    "Benchmarking finished"
                );
                run.metrics.extend(metrics);
            },
            Err(err) => {
                tracing::warn!(model_id = %model_id, error = %err, "Benchmarking failed");
                run.errors.insert(model_id, err);
            },
        }
    }
    run
}

/// Delete the model, then the endpoint. Failures are logged only.
async fn clean_up_endpoint(model_id: &str, client: &dyn EndpointClient) {
    if let Err(err) = client.delete_model().await {
        tracing::warn!(model_id, error = %err, "Failed to delete model");
    }
    if let Err(err) = client.delete_endpoint().await {
        tracing::warn!(model_id, error = %err, "Failed to delete endpoint");
    }
}
