//! Error types for the load testing engine.
//!
//! Defines [`LoadTestError`] for configuration and argument errors and
//! [`InvokeError`] for transport and service errors returned by an inference
//! endpoint during a load test.

/// Errors that stop a load test or probe before it can produce statistics.
///
/// These are configuration or programming errors. Endpoint failures never
/// surface here; they are counted in the statistics instead.
#[derive(Debug, thiserror::Error)]
pub enum LoadTestError {
    /// TOML parse failure -- the config file contains invalid TOML syntax
    /// or does not match the expected schema.
    #[error("Failed to parse config TOML: {source}")]
    ConfigParse {
        #[from]
        source: toml::de::Error,
    },

    /// Semantic validation failure -- the config parsed successfully but
    /// contains invalid values (e.g., no payloads, zero workers).
    #[error("Config validation error: {message}")]
    ConfigValidation { message: String },

    /// File I/O failure -- the config file could not be read from disk.
    #[error("Failed to read config file '{path}': {source}")]
    ConfigIo {
        source: std::io::Error,
        path: String,
    },

    /// A load test or probe was called with an unusable argument
    /// (zero invocations, zero concurrency, non-finite scale factor).
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The recorder received fewer results than invocations were issued.
    /// Only happens when a worker task panicked mid-invocation.
    #[error("Load test lost results: expected {expected}, received {received}")]
    MissingResults { expected: u64, received: u64 },
}

impl LoadTestError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }
}

/// Transport and service errors returned by an inference endpoint.
///
/// Each variant represents a distinct error category that the metrics pipeline
/// can count and report separately.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// HTTP error status returned by the endpoint.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request exceeded the configured read timeout.
    #[error("Request timed out")]
    Timeout,

    /// Connection-level failure (DNS resolution, TCP connect, TLS handshake).
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// The endpoint answered but the body could not be decoded.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    /// The endpoint reported a model-level fault (out of memory, worker
    /// crashed, model still loading).
    #[error("Endpoint fault: {message}")]
    Endpoint { message: String },
}

impl InvokeError {
    /// Returns `true` if the invocation may succeed when retried.
    ///
    /// Timeouts, connection failures, endpoint faults, HTTP 408, 429 and 5xx
    /// are transient. Other 4xx statuses and undecodable bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Connection { .. } | Self::Endpoint { .. } => true,
            Self::Http { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::InvalidResponse { .. } => false,
        }
    }

    /// Returns the error category as a static string for metrics classification.
    ///
    /// Categories: `"http"`, `"timeout"`, `"connection"`, `"invalid_response"`,
    /// `"endpoint"`.
    pub fn error_category(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Timeout => "timeout",
            Self::Connection { .. } => "connection",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Endpoint { .. } => "endpoint",
        }
    }

    /// Classify a [`reqwest::Error`] into the appropriate [`InvokeError`] variant.
    pub fn classify_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection {
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else if err.is_decode() {
            Self::InvalidResponse {
                message: err.to_string(),
            }
        } else {
            Self::Connection {
                message: err.to_string(),
            }
        }
    }
}
