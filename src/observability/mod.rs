//! Observability module
//!
//! Tracing subscriber setup, per-stage spans and log sanitizing.

pub mod telemetry;
