//! JSON report serialization for benchmark and probe results.
//!
//! Reports are schema-versioned and self-contained: the resolved settings
//! are embedded next to the results so a report can be read without the
//! config file that produced it.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::benchmark::config::{BenchmarkConfig, Settings};
use crate::benchmark::runner::{BenchmarkRun, PayloadMetrics};
use crate::loadtest::probe::{ProbeOutcome, ProbeSettings};

/// Schema version for the JSON report formats.
///
/// Increment when making breaking changes to the report structure.
const SCHEMA_VERSION: &str = "1.0";

/// Multi-model benchmark report.
#[derive(Debug, Serialize)]
pub struct BenchmarkReport {
    /// Report format version for parser compatibility.
    pub schema_version: String,
    /// ISO-8601 timestamp when the report was generated.
    pub timestamp: String,
    /// Resolved settings, CLI overrides applied.
    pub settings: Settings,
    /// Names of the payloads that were sent.
    pub payloads: Vec<String>,
    /// Per-payload metrics of every model that completed.
    pub metrics: Vec<PayloadMetrics>,
    /// Failed models keyed by model id.
    pub errors: BTreeMap<String, ReportError>,
}

/// A model failure in the report.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ReportError {
    /// Short classification (`deploy`, `load_test`, `panic`, `unknown_model`).
    pub category: String,
    /// Human-readable message.
    pub message: String,
}

impl BenchmarkReport {
    /// Build a report from a finished run and the config it ran with.
    pub fn from_run(run: &BenchmarkRun, config: &BenchmarkConfig) -> Self {
        let errors = run
            .errors
            .iter()
            .map(|(model_id, err)| {
                (
                    model_id.clone(),
                    ReportError {
                        category: err.category().to_string(),
                        message: err.to_string(),
                    },
                )
            })
            .collect();

        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            settings: config.settings.clone(),
            payloads: config.payload.iter().map(|p| p.name.clone()).collect(),
            metrics: run.metrics.clone(),
            errors,
        }
    }
}

/// Probe suite report for one endpoint.
#[derive(Debug, Serialize)]
pub struct ProbeReport {
    /// Report format version for parser compatibility.
    pub schema_version: String,
    /// ISO-8601 timestamp when the report was generated.
    pub timestamp: String,
    /// Probed endpoint URL.
    pub target_url: String,
    /// Iteration budget per probe.
    pub max_iters: u32,
    /// Growth factor per iteration.
    pub scale_factor: f64,
    /// Recovery pause after a failure, in seconds.
    pub recovery_wait_secs: f64,
    /// Outcomes in suite order.
    pub probes: Vec<ProbeOutcome>,
}

impl ProbeReport {
    /// Build a report from probe outcomes.
    pub fn new(target_url: &str, settings: &ProbeSettings, probes: Vec<ProbeOutcome>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            target_url: target_url.to_string(),
            max_iters: settings.max_iters,
            scale_factor: settings.scale_factor,
            recovery_wait_secs: settings.recovery_wait.as_secs_f64(),
            probes,
        }
    }
}

/// Write a JSON report into `<base_dir>/.bench/reports/`.
///
/// Creates the reports directory if it does not exist. The filename is
/// `<kind>-YYYY-MM-DDTHH-MM-SS.json`. Returns the path written.
pub fn write_report<T: Serialize>(
    report: &T,
    kind: &str,
    base_dir: &Path,
) -> Result<PathBuf, std::io::Error> {
    let reports_dir = base_dir.join(".bench").join("reports");
    if !reports_dir.exists() {
        std::fs::create_dir_all(&reports_dir)?;
    }

    let report_path = reports_dir.join(report_filename(kind, &chrono::Utc::now()));
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(&report_path, json)?;

    Ok(report_path)
}

/// Report filename for `kind` at `timestamp`. Hyphens, not colons, so the
/// name is valid on every platform.
pub fn report_filename(kind: &str, timestamp: &chrono::DateTime<chrono::Utc>) -> String {
    format!("{kind}-{}.json", timestamp.format("%Y-%m-%dT%H-%M-%S"))
}
