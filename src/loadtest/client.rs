//! Endpoint client contract and its HTTP implementation.
//!
//! [`EndpointClient`] is the seam between the load testing engine and a live
//! inference endpoint. The engine only needs `invoke`; the benchmark runner
//! also calls the teardown methods. [`HttpEndpointClient`] posts payloads as
//! JSON over a shared [`reqwest::Client`] built once from [`ClientSettings`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::loadtest::error::InvokeError;
use crate::loadtest::payload::Payload;

/// A live inference endpoint.
///
/// Implementations must be shareable across worker tasks: the load test
/// driver holds one `Arc<dyn EndpointClient>` and invokes it concurrently.
#[async_trait]
pub trait EndpointClient: Send + Sync {
    /// Name of the endpoint this client is bound to.
    fn endpoint_name(&self) -> &str;

    /// Send one payload and return the decoded response body.
    async fn invoke(&self, payload: &Payload) -> Result<serde_json::Value, InvokeError>;

    /// Delete the model resource backing the endpoint.
    async fn delete_model(&self) -> Result<(), InvokeError>;

    /// Delete the endpoint itself.
    async fn delete_endpoint(&self) -> Result<(), InvokeError>;
}

/// Connection settings for the shared HTTP client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// TCP/TLS connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Per-read timeout in seconds. Generation requests can be slow, so this
    /// is generous by default.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_read_timeout() -> u64 {
    60
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

impl ClientSettings {
    /// Build the process-wide HTTP client. Call once and clone the result
    /// into every [`HttpEndpointClient`].
    pub fn build_http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .read_timeout(Duration::from_secs(self.read_timeout_secs))
            .build()
    }
}

/// JSON-over-HTTP endpoint client.
///
/// Teardown URLs are optional: pre-provisioned endpoints that are not owned
/// by the benchmark have nothing to delete, and teardown becomes a no-op.
#[derive(Debug, Clone)]
pub struct HttpEndpointClient {
    http: reqwest::Client,
    endpoint_name: String,
    invoke_url: String,
    delete_model_url: Option<String>,
    delete_endpoint_url: Option<String>,
}

impl HttpEndpointClient {
    /// Create a client bound to `endpoint_name` that invokes `invoke_url`.
    pub fn new(
        http: reqwest::Client,
        endpoint_name: impl Into<String>,
        invoke_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint_name: endpoint_name.into(),
            invoke_url: invoke_url.into(),
            delete_model_url: None,
            delete_endpoint_url: None,
        }
    }

    /// Sets the URL receiving `DELETE` on [`EndpointClient::delete_model`].
    pub fn with_delete_model_url(mut self, url: Option<String>) -> Self {
        self.delete_model_url = url;
        self
    }

    /// Sets the URL receiving `DELETE` on [`EndpointClient::delete_endpoint`].
    pub fn with_delete_endpoint_url(mut self, url: Option<String>) -> Self {
        self.delete_endpoint_url = url;
        self
    }

    async fn send_delete(&self, url: Option<&str>, what: &str) -> Result<(), InvokeError> {
        let Some(url) = url else {
            tracing::debug!(endpoint = %self.endpoint_name, "No {what} teardown URL, skipping");
            return Ok(());
        };
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|e| InvokeError::classify_reqwest(&e))?;
        let status = response.status();
        if status.is_success() || status.as_u16() == 404 {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(InvokeError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl EndpointClient for HttpEndpointClient {
    fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    async fn invoke(&self, payload: &Payload) -> Result<serde_json::Value, InvokeError> {
        let response = self
            .http
            .post(&self.invoke_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload.body)
            .send()
            .await
            .map_err(|e| InvokeError::classify_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InvokeError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| InvokeError::classify_reqwest(&e))?;
        serde_json::from_slice(&bytes).map_err(|e| InvokeError::InvalidResponse {
            message: e.to_string(),
        })
    }

    async fn delete_model(&self) -> Result<(), InvokeError> {
        self.send_delete(self.delete_model_url.as_deref(), "model")
            .await
    }

    async fn delete_endpoint(&self) -> Result<(), InvokeError> {
        self.send_delete(self.delete_endpoint_url.as_deref(), "endpoint")
            .await
    }
}
