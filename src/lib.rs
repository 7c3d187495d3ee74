//! threatscope - repository threat modeling
//!
//! Turns a source repository (or a design document) into a severity-ranked
//! threat model:
//!
//! - **Collector**: bounded, session-scoped fetch and walk of the source tree
//! - **Scanner**: declarative regex detectors producing line-accurate findings
//! - **Extractor**: coarse component, data-flow and trust-boundary inference
//! - **Diagram**: deterministic Mermaid flowchart text
//! - **Risk**: OWASP likelihood x impact rating, the only source of severity
//! - **Synthesis**: model-backed or rule-backed threat generation, with
//!   recovery for truncated model output
//!
//! # Quick Start
//!
//! ```ignore
//! use threatscope::{config::Config, model::Framework, pipeline::Pipeline, synthesis};
//!
//! let config = Config::load(None)?;
//! let synthesizer = synthesis::select(&config)?;
//! let report = Pipeline::new(config)
//!     .analyze("github.com/owner/repo", Framework::Stride, synthesizer.as_ref())
//!     .await?;
//! ```

// ─── Core pipeline ─────────────────────────────────────────────────
pub mod collector;
pub mod diagram;
pub mod extractor;
pub mod model;
pub mod pipeline;
pub mod response_parser;
pub mod risk;
pub mod scanner;
pub mod synthesis;

// ─── Infrastructure ────────────────────────────────────────────────
pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;
pub mod output;

// ─── Test support ──────────────────────────────────────────────────
pub mod testing;
