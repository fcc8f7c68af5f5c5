//! End-to-end tests over real HTTP against mockito servers.

use std::sync::Arc;

use endpoint_bench::benchmark::config::BenchmarkConfig;
use endpoint_bench::benchmark::deploy::StaticDeployer;
use endpoint_bench::benchmark::error::BenchmarkError;
use endpoint_bench::benchmark::runner::Benchmarker;
use endpoint_bench::loadtest::client::{ClientSettings, HttpEndpointClient};
use endpoint_bench::loadtest::engine::run_load_test;
use endpoint_bench::loadtest::payload::Payload;
use endpoint_bench::loadtest::retry::RetryPolicy;

fn http() -> reqwest::Client {
    ClientSettings::default().build_http_client().unwrap()
}

#[tokio::test]
async fn test_load_test_over_http() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/invocations")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"generated_text": "ok"}]"#)
        .expect(8)
        .create_async()
        .await;

    let client = Arc::new(HttpEndpointClient::new(
        http(),
        "bench-http",
        format!("{}/invocations", server.url()),
    ));
    let payload = Payload::text_generation(16, 32, 0.7);

    let stats = run_load_test(client, &payload, 8, 3, RetryPolicy::no_retry())
        .await
        .unwrap();

    assert_eq!(stats.success_count, 8);
    assert_eq!(stats.failure_count, 0);
    assert_eq!(stats.concurrency, 3);
    assert!(stats.throughput_rps > 0.0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_errors_become_failed_invocations() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/invocations")
        .with_status(422)
        .with_body("input too long")
        .create_async()
        .await;

    let client = Arc::new(HttpEndpointClient::new(
        http(),
        "bench-http",
        format!("{}/invocations", server.url()),
    ));
    let payload = Payload::new("p", serde_json::json!({"inputs": "x"}));

    let stats = run_load_test(client, &payload, 4, 2, RetryPolicy::default())
        .await
        .unwrap();

    assert_eq!(stats.failure_count, 4);
    assert_eq!(stats.total_attempts, 4);
    assert_eq!(stats.error_categories.get("http"), Some(&4));
    assert!(stats.last_error.unwrap().contains("422"));
}

#[tokio::test]
async fn test_multi_model_benchmark_with_static_endpoints() {
    let mut server = mockito::Server::new_async().await;
    let invoke = server
        .mock("POST", "/good/invocations")
        .with_status(200)
        .with_body("{}")
        .expect(2 * 2 * 3)
        .create_async()
        .await;
    let delete_endpoint = server
        .mock("DELETE", "/good/endpoint")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let toml_str = format!(
        r#"
[settings]
num_invocations = 3
max_workers = 2
retry_wait_secs = 0
max_total_retry_secs = 0

[[payload]]
name = "a"
body = {{ inputs = "hello" }}

[[payload]]
name = "b"
body = {{ inputs = "world" }}

[endpoints.good]
url = "{url}/good/invocations"
delete_url = "{url}/good/endpoint"
"#,
        url = server.url()
    );
    let config = BenchmarkConfig::from_toml(&toml_str).unwrap();
    let deployer = Arc::new(StaticDeployer::new(http(), config.endpoints.clone()));
    let benchmarker = Benchmarker::new(config, deployer);

    let models = vec!["good".to_string(), "missing".to_string()];
    let run = benchmarker.run_multiple_model_ids(&models).await;

    assert_eq!(run.metrics.len(), 2);
    assert!(run.metrics.iter().all(|m| m.model_id == "good"));
    assert!(run
        .metrics
        .iter()
        .all(|m| m.endpoint_name.starts_with("bench-good-")));
    assert!(matches!(
        run.errors.get("missing"),
        Some(BenchmarkError::UnknownModel { .. })
    ));

    invoke.assert_async().await;
    delete_endpoint.assert_async().await;
}
