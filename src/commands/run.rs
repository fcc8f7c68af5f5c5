//! `endpoint-bench run` command implementation.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use endpoint_bench::benchmark::config::BenchmarkConfig;
use endpoint_bench::benchmark::deploy::StaticDeployer;
use endpoint_bench::benchmark::report::{write_report, BenchmarkReport};
use endpoint_bench::benchmark::runner::Benchmarker;
use endpoint_bench::benchmark::summary::render_summary;

use super::{configure_color, discover_config};

/// CLI flags that override config settings.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub invocations: Option<u64>,
    pub max_workers: Option<u64>,
    pub no_cleanup: bool,
}

/// Execute the `run` command.
///
/// Loads config (explicit path or auto-discovery), applies CLI overrides,
/// benchmarks every requested model, prints the summary and writes a JSON
/// report. Fails if any model failed, after reporting.
pub async fn execute_run(
    models: Vec<String>,
    config_path: Option<PathBuf>,
    overrides: Overrides,
    no_report: bool,
    no_color: bool,
) -> Result<()> {
    let config_file = resolve_config(config_path)?;
    tracing::info!(path = %config_file.display(), "Loading config");

    let mut config = BenchmarkConfig::load(&config_file)
        .with_context(|| format!("Failed to load config '{}'", config_file.display()))?;
    apply_overrides(&mut config, overrides);
    config
        .validate()
        .context("Invalid settings after applying CLI overrides")?;

    let models = select_models(models, &config)?;

    let http = config
        .client
        .build_http_client()
        .context("Failed to build HTTP client")?;
    let deployer = Arc::new(StaticDeployer::new(http, config.endpoints.clone()));
    let benchmarker = Benchmarker::new(config, deployer);

    let run = benchmarker.run_multiple_model_ids(&models).await;

    configure_color(no_color);
    println!("{}", render_summary(&run, benchmarker.config()));

    if !no_report {
        let report = BenchmarkReport::from_run(&run, benchmarker.config());
        let cwd = std::env::current_dir()?;
        match write_report(&report, "bench", &cwd) {
            Ok(path) => {
                eprintln!();
                eprintln!("Report written to: {}", path.display());
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to write report");
            },
        }
    }

    if !run.errors.is_empty() {
        anyhow::bail!(
            "{} of {} models failed to benchmark",
            run.errors.len(),
            models.len()
        );
    }
    Ok(())
}

fn resolve_config(config_path: Option<PathBuf>) -> Result<PathBuf> {
    match config_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: {}\nUse `endpoint-bench init` to create one.",
                    path.display()
                );
            }
            Ok(path)
        },
        None => match discover_config(&std::env::current_dir()?) {
            Some(path) => Ok(path),
            None => {
                anyhow::bail!(
                    "No benchmark config found.\n\
                     Run `endpoint-bench init` to create .bench/bench.toml,\n\
                     or use `--config path/to/file.toml` to specify one."
                );
            },
        },
    }
}

/// Apply CLI flag overrides to a loaded config.
fn apply_overrides(config: &mut BenchmarkConfig, overrides: Overrides) {
    if let Some(n) = overrides.invocations {
        config.settings.num_invocations = n;
    }
    if let Some(w) = overrides.max_workers {
        config.settings.max_workers = w;
    }
    if overrides.no_cleanup {
        config.settings.clean_up = false;
    }
}

/// Models from the command line, or every configured endpoint if none given.
fn select_models(models: Vec<String>, config: &BenchmarkConfig) -> Result<Vec<String>> {
    if !models.is_empty() {
        return Ok(models);
    }
    if config.endpoints.is_empty() {
        anyhow::bail!(
            "No models given and the config declares no [endpoints.<model_id>] tables"
        );
    }
    Ok(config.endpoints.keys().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BenchmarkConfig {
        BenchmarkConfig::from_toml(
            r#"
[[payload]]
name = "p"
body = {}

[endpoints.beta]
url = "http://localhost:1/b"

[endpoints.alpha]
url = "http://localhost:1/a"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = config();
        apply_overrides(
            &mut config,
            Overrides {
                invocations: Some(50),
                max_workers: None,
                no_cleanup: true,
            },
        );
        assert_eq!(config.settings.num_invocations, 50);
        assert_eq!(config.settings.max_workers, 30);
        assert!(!config.settings.clean_up);
    }

    #[test]
    fn test_apply_overrides_none() {
        let mut config = config();
        apply_overrides(&mut config, Overrides::default());
        assert_eq!(config.settings.num_invocations, 10);
        assert!(config.settings.clean_up);
    }

    #[test]
    fn test_zero_override_fails_validation() {
        let mut config = config();
        apply_overrides(
            &mut config,
            Overrides {
                max_workers: Some(0),
                ..Overrides::default()
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_select_models_defaults_to_config_endpoints() {
        let models = select_models(vec![], &config()).unwrap();
        assert_eq!(models, vec!["alpha", "beta"]);

        let models = select_models(vec!["gamma".to_string()], &config()).unwrap();
        assert_eq!(models, vec!["gamma"]);
    }

    #[test]
    fn test_resolve_missing_explicit_config() {
        let err = resolve_config(Some(PathBuf::from("/nonexistent/bench.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
