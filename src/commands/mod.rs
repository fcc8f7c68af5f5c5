//! `endpoint-bench` CLI subcommands.
//!
//! Provides `run` (benchmark models), `probe` (find an endpoint's limits) and
//! `init` (generate a starter config).

mod init;
mod probe;
mod run;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

/// Benchmark commands.
#[derive(Debug, Subcommand)]
pub enum BenchCommand {
    /// Benchmark one or more models
    ///
    /// Runs every payload in .bench/bench.toml (or a custom config path)
    /// against the endpoint of each model, prints a summary, and writes a
    /// JSON report to .bench/reports/.
    Run {
        /// Model ids to benchmark (default: every endpoint in the config)
        models: Vec<String>,

        /// Path to config file (default: auto-discover .bench/bench.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Invocations per load test (overrides config)
        #[arg(long)]
        invocations: Option<u64>,

        /// Throughput load test concurrency (overrides config)
        #[arg(long)]
        max_workers: Option<u64>,

        /// Leave endpoints running after the benchmark
        #[arg(long)]
        no_cleanup: bool,

        /// Disable JSON report output
        #[arg(long)]
        no_report: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Probe an endpoint for its limits
    ///
    /// Runs the six-probe suite, scaling input length, generation length and
    /// concurrency until the endpoint fails. Each failure is followed by a
    /// recovery pause before the next probe starts.
    Probe {
        /// Endpoint invocation URL
        url: String,

        /// Path to config file for client timeouts and retry settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Iteration budget per probe
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_iters: Option<u32>,

        /// Growth factor per iteration
        #[arg(long)]
        scale_factor: Option<f64>,

        /// Recovery pause after a failure, in seconds
        #[arg(long)]
        recovery_secs: Option<u64>,

        /// Disable JSON report output
        #[arg(long)]
        no_report: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Generate a starter config file
    ///
    /// Creates .bench/bench.toml with default settings, two sample
    /// payloads and a placeholder endpoint.
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

impl BenchCommand {
    /// Execute the selected subcommand.
    pub fn execute(self) -> Result<()> {
        match self {
            BenchCommand::Run {
                models,
                config,
                invocations,
                max_workers,
                no_cleanup,
                no_report,
                no_color,
            } => {
                let overrides = run::Overrides {
                    invocations,
                    max_workers,
                    no_cleanup,
                };
                let runtime = tokio::runtime::Runtime::new()?;
                runtime.block_on(run::execute_run(
                    models, config, overrides, no_report, no_color,
                ))
            },
            BenchCommand::Probe {
                url,
                config,
                max_iters,
                scale_factor,
                recovery_secs,
                no_report,
                no_color,
            } => {
                let overrides = probe::Overrides {
                    max_iters,
                    scale_factor,
                    recovery_secs,
                };
                let runtime = tokio::runtime::Runtime::new()?;
                runtime.block_on(probe::execute_probe(
                    url, config, overrides, no_report, no_color,
                ))
            },
            BenchCommand::Init { force } => {
                let cwd = std::env::current_dir()?;
                init::execute_init(&cwd, force)
            },
        }
    }
}

/// Discover `.bench/bench.toml` by walking parent directories of `start`.
///
/// Stops at the first match or at the filesystem root, like `.git`
/// discovery.
pub(crate) fn discover_config(start: &std::path::Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(".bench").join("bench.toml");
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Turn colors off for `--no-color` or when stdout is not a terminal.
pub(crate) fn configure_color(no_color: bool) {
    use std::io::IsTerminal;
    if no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_config_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let bench_dir = dir.path().join(".bench");
        std::fs::create_dir_all(&bench_dir).unwrap();
        std::fs::write(bench_dir.join("bench.toml"), "").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = discover_config(&nested).unwrap();
        assert_eq!(found, bench_dir.join("bench.toml"));
    }

    #[test]
    fn test_discover_config_none_without_file() {
        let dir = tempfile::tempdir().unwrap();
        // A parent of the temp dir could hold a config; only check no panic
        // and that any hit lies outside the temp dir.
        if let Some(found) = discover_config(dir.path()) {
            assert!(!found.starts_with(dir.path()));
        }
    }

    #[derive(Debug, clap::Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: BenchCommand,
    }

    #[test]
    fn test_max_iters_flag_rejects_zero() {
        use clap::Parser;

        let err = TestCli::try_parse_from(["bench", "probe", "http://x", "--max-iters", "0"]);
        assert!(err.is_err());

        let cli =
            TestCli::try_parse_from(["bench", "probe", "http://x", "--max-iters", "3"]).unwrap();
        match cli.command {
            BenchCommand::Probe { max_iters, .. } => assert_eq!(max_iters, Some(3)),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
