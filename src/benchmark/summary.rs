//! k6-style terminal summaries for benchmark and probe results.
//!
//! Both renderers are pure functions returning a [`String`]. Colors come from
//! the `colored` crate and follow its global override, which the CLI turns
//! off for `--no-color` or piped output.

use colored::Colorize;

use crate::benchmark::config::BenchmarkConfig;
use crate::benchmark::runner::BenchmarkRun;
use crate::loadtest::engine::LoadTestMode;
use crate::loadtest::metrics::LoadTestStatistics;
use crate::loadtest::probe::{ProbeOutcome, ProbeStop};

/// Width for dotted metric row padding.
const PAD_WIDTH: usize = 36;

/// Render the summary of a multi-model benchmark.
///
/// # Layout
///
/// ```text
///   endpoint-bench run
///   models:       2 ok, 1 failed
///   payloads:     2
///   invocations:  10 per load test
///
///   falcon-7b / short
///     latency_duration..................: p50=41.0ms  p90=55.2ms  p99=61.0ms
///     latency_throughput................: 23.1 req/s
///     latency_error_rate................: 0.0%
///
///   failed:
///     broken-model: Failed to deploy 'broken-model': capacity unavailable
/// ```
pub fn render_summary(run: &BenchmarkRun, config: &BenchmarkConfig) -> String {
    let mut lines = Vec::new();

    let mut models: Vec<&str> = run.metrics.iter().map(|m| m.model_id.as_str()).collect();
    models.sort_unstable();
    models.dedup();

    lines.push(String::new());
    lines.push(format!("  {}", "endpoint-bench run".bold()));
    let failed = if run.errors.is_empty() {
        "0 failed".to_string()
    } else {
        format!("{} failed", run.errors.len()).red().to_string()
    };
    lines.push(format!("  models:       {} ok, {failed}", models.len()));
    lines.push(format!("  payloads:     {}", config.payload.len()));
    lines.push(format!(
        "  invocations:  {} per load test",
        config.settings.num_invocations
    ));

    for record in &run.metrics {
        lines.push(String::new());
        lines.push(format!("  {} / {}", record.model_id, record.payload_name));
        for mode in [LoadTestMode::Latency, LoadTestMode::Throughput] {
            if let Some(stats) = record.stats(mode) {
                lines.extend(render_stats(mode, stats));
            }
        }
    }

    if !run.errors.is_empty() {
        lines.push(String::new());
        lines.push("  failed:".to_string());
        for (model_id, err) in &run.errors {
            lines.push(format!("    {model_id}: {}", err.to_string().red()));
        }
    }

    lines.join("\n")
}

fn render_stats(mode: LoadTestMode, stats: &LoadTestStatistics) -> Vec<String> {
    let mut rows = Vec::new();
    let l = &stats.latency;

    let duration = format!(
        "p50={:.1}ms  p90={:.1}ms  p99={:.1}ms",
        l.p50_ms, l.p90_ms, l.p99_ms
    );
    let duration = if l.p99_ms < 1000.0 {
        duration.green().to_string()
    } else {
        duration.yellow().to_string()
    };
    rows.push(format_metric_row(&format!("  {mode}_duration"), &duration));

    rows.push(format_metric_row(
        &format!("  {mode}_throughput"),
        &format!("{:.1} req/s", stats.throughput_rps),
    ));

    let error_rate_pct = stats.error_rate() * 100.0;
    let error_rate = format!("{error_rate_pct:.1}%");
    let error_rate = if error_rate_pct > 5.0 {
        error_rate.red().to_string()
    } else if error_rate_pct > 1.0 {
        error_rate.yellow().to_string()
    } else {
        error_rate.green().to_string()
    };
    rows.push(format_metric_row(&format!("  {mode}_error_rate"), &error_rate));

    if stats.total_attempts > stats.invocation_count() {
        rows.push(format_metric_row(
            &format!("  {mode}_retries"),
            &(stats.total_attempts - stats.invocation_count()).to_string(),
        ));
    }

    let mut categories: Vec<_> = stats.error_categories.iter().collect();
    categories.sort_by(|a, b| b.1.cmp(a.1));
    for (category, count) in categories {
        rows.push(format_metric_row(
            &format!("    {category}"),
            &count.to_string().red().to_string(),
        ));
    }

    rows
}

/// Render the summary of a probe suite.
pub fn render_probe_summary(url: &str, outcomes: &[ProbeOutcome]) -> String {
    let mut lines = vec![
        String::new(),
        format!("  {}", "endpoint-bench probe".bold()),
        format!("  target:  {url}"),
        String::new(),
    ];

    for (i, outcome) in outcomes.iter().enumerate() {
        let start = &outcome.start;
        let label = format!(
            "  {}. {} (from in={} out={} c={})",
            i + 1,
            outcome.dimension,
            start.input_length,
            start.max_new_tokens,
            start.concurrent_requests
        );
        let value = match (&outcome.last_success, &outcome.stop) {
            (Some(best), ProbeStop::Exhausted) => {
                format!("{} (no limit hit)", best.get(outcome.dimension))
                    .green()
                    .to_string()
            },
            (Some(best), ProbeStop::Failed { attempt, .. }) => format!(
                "{} (failed at {})",
                best.get(outcome.dimension),
                attempt.get(outcome.dimension)
            )
            .yellow()
            .to_string(),
            (None, _) => "none (first attempt failed)".red().to_string(),
        };
        lines.push(format_metric_row(&label, &value));
    }

    let limits = outcomes.iter().filter(|o| o.found_limit()).count();
    lines.push(String::new());
    lines.push(format_metric_row(
        "limits_found",
        &format!("{limits}/{}", outcomes.len()),
    ));

    lines.join("\n")
}

/// Format a single metric row with dot-padding.
fn format_metric_row(name: &str, value: &str) -> String {
    let pad_width = PAD_WIDTH;
    format!("  {name:.<pad_width$}: {value}")
}
