//! Configuration Management
//!
//! Loads threatscope configuration from TOML files with environment overrides.
//! Configuration includes:
//! - Model endpoint settings (base URL, model, credentials, timeout)
//! - Retry policy for model calls
//! - Collection and scanning budgets
//! - Synthesis path selection

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Which synthesizer produces the threat list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisMode {
    /// Model-backed when credentials are configured, rule-backed otherwise
    #[default]
    Auto,
    /// Always call the model
    Model,
    /// Always use the deterministic rule-based generator
    Rules,
}

impl std::fmt::Display for SynthesisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SynthesisMode::Auto => write!(f, "auto"),
            SynthesisMode::Model => write!(f, "model"),
            SynthesisMode::Rules => write!(f, "rules"),
        }
    }
}

impl std::str::FromStr for SynthesisMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(SynthesisMode::Auto),
            "model" => Ok(SynthesisMode::Model),
            "rules" | "offline" => Ok(SynthesisMode::Rules),
            other => Err(format!("unknown synthesis mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    pub api_key: Option<String>,
    /// Per-request timeout for the model call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub limits: Limits,

    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Budgets that bound every run. None of these are errors when hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_findings_per_file")]
    pub max_findings_per_file: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    #[serde(default = "default_file_tree_cap")]
    pub file_tree_cap: usize,
    #[serde(default = "default_prompt_findings_cap")]
    pub prompt_findings_cap: usize,
    #[serde(default = "default_entry_points_cap")]
    pub entry_points_cap: usize,
    #[serde(default = "default_clone_depth")]
    pub clone_depth: u32,
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default)]
    pub mode: SynthesisMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            retry: RetrySettings::default(),
            limits: Limits::default(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            max_files: default_max_files(),
            max_findings_per_file: default_max_findings_per_file(),
            snippet_chars: default_snippet_chars(),
            file_tree_cap: default_file_tree_cap(),
            prompt_findings_cap: default_prompt_findings_cap(),
            entry_points_cap: default_entry_points_cap(),
            clone_depth: default_clone_depth(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_tokens() -> usize {
    8192
}
fn default_temperature() -> f32 {
    0.2
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30000
}
fn default_max_file_bytes() -> u64 {
    50 * 1024
}
fn default_max_files() -> usize {
    500
}
fn default_max_findings_per_file() -> usize {
    10
}
fn default_snippet_chars() -> usize {
    200
}
fn default_file_tree_cap() -> usize {
    200
}
fn default_prompt_findings_cap() -> usize {
    25
}
fn default_entry_points_cap() -> usize {
    20
}
fn default_clone_depth() -> u32 {
    1
}
fn default_max_prompt_chars() -> usize {
    48_000
}

impl Config {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config from {}", p))?;
                toml::from_str(&content).context("Failed to parse config")?
            }
            None => {
                let mut candidates = vec![std::path::PathBuf::from("threatscope.toml")];
                if let Some(home) = dirs::home_dir() {
                    candidates.push(home.join(".config/threatscope/config.toml"));
                }

                let mut loaded = None;
                for p in &candidates {
                    if let Ok(content) = std::fs::read_to_string(p) {
                        loaded = Some(toml::from_str(&content).with_context(|| {
                            format!("Failed to parse config {}", p.display())
                        })?);
                        break;
                    }
                }
                loaded.unwrap_or_else(|| {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                })
            }
        };

        config.apply_env();
        Ok(config)
    }

    /// Override file values with environment variables.
    fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var("THREATSCOPE_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Ok(model) = std::env::var("THREATSCOPE_MODEL") {
            self.model = model;
        }
        if let Ok(api_key) = std::env::var("THREATSCOPE_API_KEY") {
            self.api_key = Some(api_key);
        } else if self.api_key.is_none() {
            if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
                self.api_key = Some(api_key);
            }
        }
        if let Ok(max_tokens) = std::env::var("THREATSCOPE_MAX_TOKENS") {
            if let Ok(n) = max_tokens.parse::<usize>() {
                self.max_tokens = n;
            }
        }
        if let Ok(timeout) = std::env::var("THREATSCOPE_TIMEOUT") {
            if let Ok(t) = timeout.parse::<u64>() {
                self.timeout_secs = t;
            }
        }
        if let Ok(mode) = std::env::var("THREATSCOPE_SYNTHESIS") {
            match mode.parse::<SynthesisMode>() {
                Ok(m) => self.synthesis.mode = m,
                Err(e) => tracing::warn!("Ignoring THREATSCOPE_SYNTHESIS: {}", e),
            }
        }
    }

    /// True when a non-empty API key is configured.
    pub fn has_credentials(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }

    /// Resolve `Auto` against the configured credentials.
    pub fn use_model(&self) -> bool {
        match self.synthesis.mode {
            SynthesisMode::Model => true,
            SynthesisMode::Rules => false,
            SynthesisMode::Auto => self.has_credentials(),
        }
    }
}
