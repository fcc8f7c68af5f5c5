//! TOML-based benchmark configuration.
//!
//! A config file declares the payloads to send, run-wide settings, HTTP
//! client timeouts, and the endpoints each model id maps to.
//!
//! # Example TOML
//!
//! ```toml
//! [settings]
//! num_invocations = 10
//! max_workers = 30
//! max_concurrent_benchmarks = 2
//! clean_up = false
//!
//! [client]
//! read_timeout_secs = 120
//!
//! [[payload]]
//! name = "short"
//! body = { inputs = "Hello", parameters = { max_new_tokens = 64 } }
//!
//! [endpoints."huggingface-llm-falcon-7b"]
//! url = "http://localhost:8080/invocations"
//! delete_url = "http://localhost:8080/admin/endpoint"
//! ```
//!
//! Endpoint URLs live in the config file rather than on the command line
//! because one run fans out across many models.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::loadtest::client::ClientSettings;
use crate::loadtest::engine::LoadTestMode;
use crate::loadtest::error::LoadTestError;
use crate::loadtest::payload::Payload;
use crate::loadtest::retry::{RetryPolicy, DEFAULT_MAX_TOTAL_RETRY_TIME, DEFAULT_RETRY_WAIT};

/// Default invocations per load test.
pub const NUM_INVOCATIONS: u64 = 10;

/// Default concurrency of the throughput load test.
pub const MAX_CONCURRENT_INVOCATIONS_PER_MODEL: u64 = 30;

/// Default number of models benchmarked at once.
pub const MAX_CONCURRENT_BENCHMARKS: usize = 4;

/// Top-level benchmark configuration parsed from a TOML file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BenchmarkConfig {
    /// Run-wide settings.
    #[serde(default)]
    pub settings: Settings,
    /// HTTP client timeouts.
    #[serde(default)]
    pub client: ClientSettings,
    /// Payloads sent to every endpoint. The field is `payload` because TOML
    /// `[[payload]]` array-of-tables syntax creates a key called `payload`.
    #[serde(default)]
    pub payload: Vec<Payload>,
    /// Pre-provisioned endpoints keyed by model id.
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

/// Run-wide settings. Every field has a default.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Invocations per load test.
    #[serde(default = "default_num_invocations")]
    pub num_invocations: u64,
    /// Concurrency of the throughput load test.
    #[serde(default = "default_max_workers")]
    pub max_workers: u64,
    /// Models benchmarked at once.
    #[serde(default = "default_max_concurrent_benchmarks")]
    pub max_concurrent_benchmarks: usize,
    /// Seconds to wait between retries of one invocation.
    #[serde(default = "default_retry_wait_secs")]
    pub retry_wait_secs: f64,
    /// Total retry budget per invocation, in seconds.
    #[serde(default = "default_max_total_retry_secs")]
    pub max_total_retry_secs: f64,
    /// Run the concurrency-1 latency load test.
    #[serde(default = "default_true")]
    pub run_latency_load_test: bool,
    /// Run the `max_workers` throughput load test.
    #[serde(default = "default_true")]
    pub run_throughput_load_test: bool,
    /// Tear down endpoints after benchmarking.
    #[serde(default = "default_true")]
    pub clean_up: bool,
    /// Prefix of generated endpoint names.
    #[serde(default = "default_endpoint_prefix")]
    pub endpoint_prefix: String,
}

fn default_num_invocations() -> u64 {
    NUM_INVOCATIONS
}

fn default_max_workers() -> u64 {
    MAX_CONCURRENT_INVOCATIONS_PER_MODEL
}

fn default_max_concurrent_benchmarks() -> usize {
    MAX_CONCURRENT_BENCHMARKS
}

fn default_retry_wait_secs() -> f64 {
    DEFAULT_RETRY_WAIT.as_secs_f64()
}

fn default_max_total_retry_secs() -> f64 {
    DEFAULT_MAX_TOTAL_RETRY_TIME.as_secs_f64()
}

fn default_true() -> bool {
    true
}

fn default_endpoint_prefix() -> String {
    "bench".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            num_invocations: default_num_invocations(),
            max_workers: default_max_workers(),
            max_concurrent_benchmarks: default_max_concurrent_benchmarks(),
            retry_wait_secs: default_retry_wait_secs(),
            max_total_retry_secs: default_max_total_retry_secs(),
            run_latency_load_test: true,
            run_throughput_load_test: true,
            clean_up: true,
            endpoint_prefix: default_endpoint_prefix(),
        }
    }
}

impl Settings {
    /// Retry policy applied to every invocation.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs_f64(self.retry_wait_secs, self.max_total_retry_secs)
    }

    /// Enabled load test modes, latency first.
    pub fn modes(&self) -> Vec<LoadTestMode> {
        let mut modes = Vec::with_capacity(2);
        if self.run_latency_load_test {
            modes.push(LoadTestMode::Latency);
        }
        if self.run_throughput_load_test {
            modes.push(LoadTestMode::Throughput);
        }
        modes
    }
}

/// A pre-provisioned endpoint for one model.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EndpointConfig {
    /// Invocation URL receiving `POST` requests.
    pub url: String,
    /// URL receiving `DELETE` when the endpoint is torn down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_url: Option<String>,
    /// URL receiving `DELETE` when the model is torn down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_model_url: Option<String>,
}

impl BenchmarkConfig {
    /// Parse a TOML string into a validated [`BenchmarkConfig`].
    pub fn from_toml(content: &str) -> Result<Self, LoadTestError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a [`BenchmarkConfig`] from a file path.
    ///
    /// Returns [`LoadTestError::ConfigIo`] if the file cannot be read,
    /// [`LoadTestError::ConfigParse`] if the TOML is malformed, or
    /// [`LoadTestError::ConfigValidation`] if validation fails.
    pub fn load(path: &Path) -> Result<Self, LoadTestError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadTestError::ConfigIo {
            source,
            path: path.display().to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Validate that the config is semantically correct.
    ///
    /// Checks:
    /// - At least one payload, with unique non-empty names
    /// - Invocation count, worker and benchmark concurrency are at least 1
    /// - Retry durations are finite and non-negative
    /// - At least one load test mode is enabled
    /// - Client timeouts are positive
    pub fn validate(&self) -> Result<(), LoadTestError> {
        if self.payload.is_empty() {
            return Err(LoadTestError::validation(
                "Config must contain at least one [[payload]] block",
            ));
        }

        let mut seen = HashSet::new();
        for payload in &self.payload {
            if payload.name.trim().is_empty() {
                return Err(LoadTestError::validation("Payload names must not be empty"));
            }
            if !seen.insert(payload.name.as_str()) {
                return Err(LoadTestError::validation(format!(
                    "Duplicate payload name '{}'",
                    payload.name
                )));
            }
        }

        let s = &self.settings;
        if s.num_invocations == 0 {
            return Err(LoadTestError::validation(
                "settings.num_invocations must be at least 1",
            ));
        }
        if s.max_workers == 0 {
            return Err(LoadTestError::validation(
                "settings.max_workers must be at least 1",
            ));
        }
        if s.max_concurrent_benchmarks == 0 {
            return Err(LoadTestError::validation(
                "settings.max_concurrent_benchmarks must be at least 1",
            ));
        }
        for (field, value) in [
            ("retry_wait_secs", s.retry_wait_secs),
            ("max_total_retry_secs", s.max_total_retry_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(LoadTestError::validation(format!(
                    "settings.{field} must be a non-negative number, got {value}"
                )));
            }
        }
        if !s.run_latency_load_test && !s.run_throughput_load_test {
            return Err(LoadTestError::validation(
                "At least one of run_latency_load_test or run_throughput_load_test must be true",
            ));
        }

        if self.client.connect_timeout_secs == 0 || self.client.read_timeout_secs == 0 {
            return Err(LoadTestError::validation(
                "client timeouts must be at least 1 second",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::time::Duration;

    const MINIMAL: &str = r#"
[[payload]]
name = "short"
body = { inputs = "Hello", parameters = { max_new_tokens = 64 } }
"#;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = BenchmarkConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.settings, Settings::default());
        assert_eq!(config.client, ClientSettings::default());
        assert_eq!(config.payload.len(), 1);
        assert_eq!(config.payload[0].body["parameters"]["max_new_tokens"], 64);
        assert!(config.endpoints.is_empty());
        assert_eq!(config.settings.num_invocations, 10);
        assert_eq!(config.settings.max_workers, 30);
        assert_eq!(config.settings.endpoint_prefix, "bench");
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[settings]
num_invocations = 5
max_workers = 8
max_concurrent_benchmarks = 2
retry_wait_secs = 0.5
max_total_retry_secs = 3
run_throughput_load_test = false
clean_up = false
endpoint_prefix = "nightly"

[client]
read_timeout_secs = 120

[[payload]]
name = "long"
body = { inputs = "Once upon a time", parameters = { max_new_tokens = 512 } }

[[payload]]
name = "short"
body = { inputs = "Hi" }

[endpoints."huggingface-llm-falcon-7b"]
url = "http://localhost:8080/invocations"
delete_url = "http://localhost:8080/admin/endpoint"
"#;
        let config = BenchmarkConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.settings.num_invocations, 5);
        assert_eq!(config.settings.max_concurrent_benchmarks, 2);
        assert!(!config.settings.clean_up);
        assert_eq!(config.client.read_timeout_secs, 120);
        assert_eq!(config.client.connect_timeout_secs, 5);
        assert_eq!(
            config.settings.retry_policy(),
            RetryPolicy::new(Duration::from_millis(500), Duration::from_secs(3))
        );
        assert_eq!(config.settings.modes(), vec![LoadTestMode::Latency]);

        let endpoint = &config.endpoints["huggingface-llm-falcon-7b"];
        assert_eq!(endpoint.url, "http://localhost:8080/invocations");
        assert!(endpoint.delete_url.is_some());
        assert!(endpoint.delete_model_url.is_none());
    }

    #[test]
    fn test_payloads_keep_configured_order() {
        let toml_str = r#"
[[payload]]
name = "zeta"
body = {}

[[payload]]
name = "alpha"
body = {}
"#;
        let config = BenchmarkConfig::from_toml(toml_str).unwrap();
        let names: Vec<_> = config.payload.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_validate_requires_payload() {
        let result = BenchmarkConfig::from_toml("[settings]\nnum_invocations = 3\n");
        assert!(matches!(
            result.unwrap_err(),
            LoadTestError::ConfigValidation { .. }
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_payload_names() {
        let toml_str = format!("{MINIMAL}\n{MINIMAL}");
        let err = BenchmarkConfig::from_toml(&toml_str).unwrap_err();
        assert!(err.to_string().contains("Duplicate payload name 'short'"));
    }

    #[test]
    fn test_validate_rejects_zero_counts() {
        for field in ["num_invocations", "max_workers", "max_concurrent_benchmarks"] {
            let toml_str = format!("[settings]\n{field} = 0\n{MINIMAL}");
            let err = BenchmarkConfig::from_toml(&toml_str).unwrap_err();
            assert!(err.to_string().contains(field), "{field}: {err}");
        }
    }

    #[test]
    fn test_validate_rejects_negative_retry() {
        let toml_str = format!("[settings]\nretry_wait_secs = -1.0\n{MINIMAL}");
        let err = BenchmarkConfig::from_toml(&toml_str).unwrap_err();
        assert!(err.to_string().contains("retry_wait_secs"));
    }

    #[test]
    fn test_validate_requires_a_mode() {
        let toml_str = format!(
            "[settings]\nrun_latency_load_test = false\nrun_throughput_load_test = false\n{MINIMAL}"
        );
        assert!(BenchmarkConfig::from_toml(&toml_str).is_err());
    }

    #[test]
    fn test_parse_error_is_config_parse() {
        let err = BenchmarkConfig::from_toml("[[payload]\nname=").unwrap_err();
        assert!(matches!(err, LoadTestError::ConfigParse { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = BenchmarkConfig::load(file.path()).unwrap();
        assert_eq!(config.payload[0].name, "short");
    }

    #[test]
    fn test_load_missing_file_is_config_io() {
        let err = BenchmarkConfig::load(Path::new("/nonexistent/bench.toml")).unwrap_err();
        assert!(matches!(err, LoadTestError::ConfigIo { .. }));
    }
}
