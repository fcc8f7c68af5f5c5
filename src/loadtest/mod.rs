//! Load testing engine for inference endpoints.
//!
//! Provides the endpoint client contract, a bounded-concurrency load test
//! driver with per-invocation retry, HdrHistogram-based statistics, and the
//! adaptive probe that searches for an endpoint's limits.

pub mod client;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod payload;
pub mod probe;
pub mod retry;
