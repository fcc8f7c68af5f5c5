//! Multi-model benchmarking on top of the load test engine.
//!
//! Provides typed TOML configuration, endpoint deployment, the benchmark
//! orchestrator, and JSON and terminal reporting.

pub mod config;
pub mod deploy;
pub mod error;
pub mod report;
pub mod runner;
pub mod summary;
