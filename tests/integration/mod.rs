//! Integration tests for the threatscope binary
//!
//! Run with: cargo test --features integration
//!
//! Every test drives the compiled CLI against local fixtures with
//! `--offline`, so no network access or model credentials are needed.

mod cli_tests;
mod helpers;

pub use helpers::*;
