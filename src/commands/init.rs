//! `endpoint-bench init` command implementation.

use anyhow::Result;
use std::path::Path;

/// Execute the `init` command.
///
/// Creates `<dir>/.bench/bench.toml` with default settings.
pub fn execute_init(dir: &Path, force: bool) -> Result<()> {
    let config_dir = dir.join(".bench");
    let config_path = config_dir.join("bench.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}\n\
             Use `--force` to overwrite.",
            config_path.display()
        );
    }

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    std::fs::write(&config_path, generate_default_template())?;
    eprintln!("Created {}", config_path.display());
    eprintln!(
        "Point [endpoints.<model_id>] at your inference endpoints, then run `endpoint-bench run`."
    );

    Ok(())
}

/// Generate the default config template.
fn generate_default_template() -> String {
    r#"# endpoint-bench configuration

[settings]
# Invocations per load test
num_invocations = 10

# Concurrency of the throughput load test
max_workers = 30

# Models benchmarked at once
max_concurrent_benchmarks = 4

# Retry a failed invocation every retry_wait_secs until max_total_retry_secs pass
retry_wait_secs = 30
max_total_retry_secs = 120

run_latency_load_test = true
run_throughput_load_test = true

# Delete endpoints when their benchmark finishes
clean_up = true

# Prefix of generated endpoint names
endpoint_prefix = "bench"

[client]
connect_timeout_secs = 5
read_timeout_secs = 60

[[payload]]
name = "short-prompt"
body = { inputs = "Write a haiku about benchmarks.", parameters = { max_new_tokens = 64 } }

[[payload]]
name = "long-generation"
body = { inputs = "Tell me a long story about a lighthouse keeper.", parameters = { max_new_tokens = 512 } }

[endpoints."my-model"]
url = "http://localhost:8080/invocations"
# delete_url = "http://localhost:8080/admin/endpoint"
# delete_model_url = "http://localhost:8080/admin/model"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use endpoint_bench::benchmark::config::BenchmarkConfig;

    #[test]
    fn test_default_template_is_valid_config() {
        let config = BenchmarkConfig::from_toml(&generate_default_template()).unwrap();
        assert_eq!(config.payload.len(), 2);
        assert_eq!(config.settings.num_invocations, 10);
        assert!(config.endpoints.contains_key("my-model"));
    }

    #[test]
    fn test_init_writes_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        execute_init(dir.path(), false).unwrap();
        let path = dir.path().join(".bench").join("bench.toml");
        assert!(path.exists());

        assert!(execute_init(dir.path(), false).is_err());
        assert!(execute_init(dir.path(), true).is_ok());
    }
}
