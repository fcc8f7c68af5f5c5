//! Benchmarking toolkit for machine-learning inference endpoints.
//!
//! - [`loadtest`]: drives a fixed number of invocations against one endpoint
//!   with bounded concurrency and derives latency and throughput statistics.
//!   Its [`probe`](loadtest::probe) module scales one request dimension until
//!   the endpoint breaks.
//! - [`benchmark`]: deploys endpoints per model, runs every configured payload
//!   against them, and aggregates metrics and per-model errors.

pub mod benchmark;
pub mod loadtest;
