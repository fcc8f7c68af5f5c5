//! Endpoint deployment and naming.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::benchmark::config::EndpointConfig;
use crate::benchmark::error::BenchmarkError;
use crate::loadtest::client::{EndpointClient, HttpEndpointClient};

/// Longest endpoint name most hosting services accept.
pub const MAX_ENDPOINT_NAME_LEN: usize = 63;

/// Stands up an inference endpoint for a model.
#[async_trait]
pub trait ModelDeployer: Send + Sync {
    /// Deploy `model_id` under `endpoint_name` and return a client bound to it.
    async fn deploy(
        &self,
        model_id: &str,
        endpoint_name: &str,
    ) -> Result<Arc<dyn EndpointClient>, BenchmarkError>;
}

/// Deployer for endpoints that already exist, declared in the config file.
///
/// "Deploying" binds a fresh [`HttpEndpointClient`] to the configured URLs;
/// teardown only happens when the config provides delete URLs.
#[derive(Debug, Clone)]
pub struct StaticDeployer {
    http: reqwest::Client,
    endpoints: BTreeMap<String, EndpointConfig>,
}

impl StaticDeployer {
    /// Create a deployer sharing `http` across every endpoint client.
    pub fn new(http: reqwest::Client, endpoints: BTreeMap<String, EndpointConfig>) -> Self {
        Self { http, endpoints }
    }

    /// Model ids this deployer knows about.
    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }
}

#[async_trait]
impl ModelDeployer for StaticDeployer {
    async fn deploy(
        &self,
        model_id: &str,
        endpoint_name: &str,
    ) -> Result<Arc<dyn EndpointClient>, BenchmarkError> {
        let endpoint = self
            .endpoints
            .get(model_id)
            .ok_or_else(|| BenchmarkError::UnknownModel {
                model_id: model_id.to_string(),
            })?;

        tracing::info!(
            model_id,
            endpoint = endpoint_name,
            url = %endpoint.url,
            "Binding pre-provisioned endpoint"
        );

        let client = HttpEndpointClient::new(self.http.clone(), endpoint_name, &endpoint.url)
            .with_delete_model_url(endpoint.delete_model_url.clone())
            .with_delete_endpoint_url(endpoint.delete_url.clone());
        Ok(Arc::new(client))
    }
}

/// Append a millisecond timestamp to `base`, trimming `base` so the result
/// fits in [`MAX_ENDPOINT_NAME_LEN`] characters.
///
/// Characters outside `[A-Za-z0-9-]` become `-`.
///
/// ```
/// use chrono::TimeZone;
/// use endpoint_bench::benchmark::deploy::endpoint_name_from_base;
///
/// let at = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
/// assert_eq!(
///     endpoint_name_from_base("bench-hf-llm/falcon", at),
///     "bench-hf-llm-falcon-2024-03-01-12-30-05-000"
/// );
/// ```
pub fn endpoint_name_from_base(base: &str, at: DateTime<Utc>) -> String {
    join_within_limit(base, &timestamp(at))
}

/// Unique endpoint name for benchmarking `model_id`.
///
/// `huggingface` is shortened to `hf` to leave room for the timestamp. A
/// digest of the raw model id keeps ids that sanitize or trim to the same
/// text apart.
pub fn endpoint_name_for_model(prefix: &str, model_id: &str) -> String {
    endpoint_name_for_model_at(prefix, model_id, Utc::now())
}

fn endpoint_name_for_model_at(prefix: &str, model_id: &str, at: DateTime<Utc>) -> String {
    let base = format!("{prefix}-{}", model_id.replace("huggingface", "hf"));
    let suffix = format!("{}-{}", model_tag(model_id), timestamp(at));
    join_within_limit(&base, &suffix)
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d-%H-%M-%S-%3f").to_string()
}

/// First six hex characters of the SHA-256 of `model_id`.
fn model_tag(model_id: &str) -> String {
    Sha256::digest(model_id.as_bytes())
        .iter()
        .take(3)
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn join_within_limit(base: &str, suffix: &str) -> String {
    let keep = MAX_ENDPOINT_NAME_LEN.saturating_sub(suffix.len() + 1);
    let base: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .take(keep)
        .collect();
    format!("{base}-{suffix}")
}
