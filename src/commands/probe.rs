//! `endpoint-bench probe` command implementation.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use endpoint_bench::benchmark::config::BenchmarkConfig;
use endpoint_bench::benchmark::report::{write_report, ProbeReport};
use endpoint_bench::benchmark::summary::render_probe_summary;
use endpoint_bench::loadtest::client::{ClientSettings, HttpEndpointClient};
use endpoint_bench::loadtest::probe::{ProbeEngine, ProbeSettings};

use super::{configure_color, discover_config};

/// CLI flags that override probe settings.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub max_iters: Option<u32>,
    pub scale_factor: Option<f64>,
    pub recovery_secs: Option<u64>,
}

/// Execute the `probe` command.
///
/// Client timeouts and the retry policy come from the config file when one
/// is given or discovered; otherwise defaults apply. Ctrl-C stops the probe
/// without writing a report.
pub async fn execute_probe(
    url: String,
    config_path: Option<PathBuf>,
    overrides: Overrides,
    no_report: bool,
    no_color: bool,
) -> Result<()> {
    let config_file = match config_path {
        Some(path) => Some(path),
        None => discover_config(&std::env::current_dir()?),
    };
    let (client_settings, mut settings) = match config_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading config");
            let config = BenchmarkConfig::load(&path)
                .with_context(|| format!("Failed to load config '{}'", path.display()))?;
            let settings = ProbeSettings {
                retry: config.settings.retry_policy(),
                ..ProbeSettings::default()
            };
            (config.client, settings)
        },
        None => (ClientSettings::default(), ProbeSettings::default()),
    };
    apply_overrides(&mut settings, overrides);

    let http = client_settings
        .build_http_client()
        .context("Failed to build HTTP client")?;
    let client = Arc::new(HttpEndpointClient::new(http, "probe", url.clone()));
    let engine = ProbeEngine::with_settings(client, settings);

    let outcomes = tokio::select! {
        result = engine.run_probe() => result.context("Probe failed")?,
        _ = tokio::signal::ctrl_c() => anyhow::bail!("Probe interrupted"),
    };

    configure_color(no_color);
    println!("{}", render_probe_summary(&url, &outcomes));

    if !no_report {
        let report = ProbeReport::new(&url, engine.settings(), outcomes);
        let cwd = std::env::current_dir()?;
        match write_report(&report, "probe", &cwd) {
            Ok(path) => {
                eprintln!();
                eprintln!("Report written to: {}", path.display());
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to write report");
            },
        }
    }

    Ok(())
}

fn apply_overrides(settings: &mut ProbeSettings, overrides: Overrides) {
    if let Some(n) = overrides.max_iters {
        settings.max_iters = n;
    }
    if let Some(f) = overrides.scale_factor {
        settings.scale_factor = f;
    }
    if let Some(s) = overrides.recovery_secs {
        settings.recovery_wait = Duration::from_secs(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let mut settings = ProbeSettings::default();
        apply_overrides(
            &mut settings,
            Overrides {
                max_iters: Some(5),
                scale_factor: None,
                recovery_secs: Some(10),
            },
        );
        assert_eq!(settings.max_iters, 5);
        assert_eq!(settings.scale_factor, 1.2);
        assert_eq!(settings.recovery_wait, Duration::from_secs(10));
    }
}
