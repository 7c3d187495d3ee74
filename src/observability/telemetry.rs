//! Telemetry & Observability
//!
//! Structured logging for pipeline runs.
//! Features:
//! - Stage spans carrying the session id, with timing and outcome
//! - Configurable log levels via RUST_LOG
//! - Compact or JSON output on stderr
//! - Control-character escaping and secret redaction for untrusted text

use regex::Regex;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{error, info, info_span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sanitize a string for safe log output by escaping control characters.
/// Prevents log injection where scanned content embeds newlines to forge entries.
pub fn sanitize_for_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x1b' => out.push_str("\\e"),
            '\x00' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}

static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn secret_patterns() -> &'static Vec<Regex> {
    SECRET_PATTERNS.get_or_init(|| {
        [
            // sk-..., key-..., token-... prefixed keys
            r"(?i)(sk-|key-|token-)[A-Za-z0-9_\-]{8,}",
            r"(?i)Bearer\s+[A-Za-z0-9_\-\.]{8,}",
            r"(?i)(password|passwd|pwd|secret|api_key|apikey)\s*[=:]\s*\S+",
            r"AKIA[0-9A-Z]{16}",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Redact sensitive data patterns from a string before logging.
pub fn redact_secrets(input: &str) -> String {
    let mut result = input.to_string();
    for pattern in secret_patterns() {
        result = pattern.replace_all(&result, "[REDACTED]").to_string();
    }
    result
}

/// Both passes, in the order log sites need them.
pub fn safe_log_text(input: &str) -> String {
    redact_secrets(&sanitize_for_log(input))
}

/// Filter used when RUST_LOG is not set.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info"
    } else {
        "warn"
    }
}

/// Initialize the global subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool, json: bool) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter(verbose).to_string());
    init_tracing_with_filter(&filter, json);
}

/// Initialize with custom filter string
pub fn init_tracing_with_filter(filter: &str, json: bool) {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter_layer = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));

        if json {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt_layer)
                .try_init();
        } else {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .compact()
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt_layer)
                .try_init();
        }
    });
}

/// Span for one pipeline stage.
pub fn stage_span(stage: &'static str, session: &str) -> tracing::Span {
    info_span!(
        "pipeline.stage",
        stage = stage,
        session = session,
        duration_ms = tracing::field::Empty,
        success = tracing::field::Empty,
    )
}

/// Run a fallible stage inside its span, logging duration and outcome.
pub async fn track_stage<F, Fut, T, E>(stage: &'static str, session: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    use tracing::Instrument;

    let span = stage_span(stage, session);
    let start = Instant::now();
    let result = f().instrument(span.clone()).await;
    let duration = start.elapsed().as_millis() as u64;
    span.record("duration_ms", duration);

    let _enter = span.enter();
    match &result {
        Ok(_) => {
            span.record("success", true);
            info!(duration_ms = duration, "Stage {} completed", stage);
        }
        Err(e) => {
            let safe_err = safe_log_text(&e.to_string());
            span.record("success", false);
            error!(
                duration_ms = duration,
                error = safe_err.as_str(),
                "Stage {} failed",
                stage
            );
        }
    }
    result
}

/// Initialize tracing for tests with a simple subscriber
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
