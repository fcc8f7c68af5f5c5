//! Model-level benchmark errors.

use crate::loadtest::error::LoadTestError;

/// A failure that aborts the benchmark of one model.
///
/// Collected per model id in [`BenchmarkRun::errors`](super::runner::BenchmarkRun)
/// so one bad model never stops the others.
#[derive(Debug, thiserror::Error)]
pub enum BenchmarkError {
    /// The model has no endpoint the deployer knows about.
    #[error("No endpoint configured for model '{model_id}'")]
    UnknownModel { model_id: String },

    /// Deploying the endpoint failed.
    #[error("Failed to deploy '{model_id}': {message}")]
    Deploy { model_id: String, message: String },

    /// A load test could not run (bad arguments or lost results).
    #[error(transparent)]
    LoadTest(#[from] LoadTestError),

    /// The benchmark task panicked.
    #[error("Benchmark task panicked: {message}")]
    Panicked { message: String },

    /// The benchmark task was cancelled before it finished.
    #[error("Benchmark task was cancelled")]
    Cancelled,
}

impl BenchmarkError {
    /// Short category string for reports.
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownModel { .. } => "unknown_model",
            Self::Deploy { .. } => "deploy",
            Self::LoadTest(_) => "load_test",
            Self::Panicked { .. } => "panic",
            Self::Cancelled => "cancelled",
        }
    }

    /// Build a [`BenchmarkError::Panicked`] from a caught panic payload.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked { message }
    }

    /// Convert a task that failed to join into a model error.
    pub(crate) fn from_join_error(err: tokio::task::JoinError) -> Self {
        match err.try_into_panic() {
            Ok(panic) => Self::from_panic(panic.as_ref()),
            Err(_) => Self::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_panic_extracts_messages() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        let err = BenchmarkError::from_panic(boxed.as_ref());
        assert_eq!(err.to_string(), "Benchmark task panicked: boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert!(matches!(
            BenchmarkError::from_panic(boxed.as_ref()),
            BenchmarkError::Panicked { message } if message == "owned"
        ));

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert!(BenchmarkError::from_panic(boxed.as_ref())
            .to_string()
            .contains("unknown"));
    }

    #[test]
    fn test_load_test_errors_convert() {
        let err: BenchmarkError = LoadTestError::InvalidArgument {
            message: "concurrency must be at least 1".to_string(),
        }
        .into();
        assert_eq!(err.category(), "load_test");
        assert!(err.to_string().contains("concurrency"));
    }
}
