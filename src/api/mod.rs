use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::ApiError;
use crate::observability::telemetry::safe_log_text;

pub mod types;

use types::*;

/// Longest error body echoed back into an [`ApiError`].
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Trait abstraction over the chat-completions client, enabling test mocking.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a non-streaming chat completion request.
    async fn chat(&self, messages: Vec<Message>) -> Result<ChatResponse, ApiError>;
}

/// Retry configuration for API calls
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first request
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt)
    pub initial_delay_ms: u64,
    /// Maximum delay between retries
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_settings(&crate::config::RetrySettings::default())
    }
}

impl RetryConfig {
    pub fn from_settings(settings: &crate::config::RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay_ms: settings.base_delay_ms,
            max_delay_ms: settings.max_delay_ms,
        }
    }

    /// Backoff before retry number `attempt` (1-based), before jitter.
    pub fn delay_for(&self, attempt: u32) -> u64 {
        let exp = attempt.saturating_sub(1).min(20);
        self.initial_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms)
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    api_key: Option<String>,
    retry_config: RetryConfig,
}

impl ApiClient {
    pub fn new(config: &crate::config::Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key: config
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
            retry_config: RetryConfig::from_settings(&config.retry),
        })
    }

    /// Create client with custom retry configuration
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    fn request_body(&self, messages: Vec<Message>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        }
    }

    /// Send request with exponential backoff retry logic
    async fn send_with_retry(&self, body: &ChatRequest) -> Result<ChatResponse, ApiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let max_retries = self.retry_config.max_retries;
        let mut attempt = 0u32;

        loop {
            debug!("Sending request to {} (attempt {})", url, attempt + 1);

            let err = match self.send_once(&url, body).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= max_retries {
                return Err(ApiError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }

            attempt += 1;
            let mut delay_ms = self.retry_config.delay_for(attempt);
            if let ApiError::RateLimit {
                retry_after_secs: Some(secs),
            } = &err
            {
                delay_ms = delay_ms
                    .max(secs.saturating_mul(1000))
                    .min(self.retry_config.max_delay_ms);
            }
            // ±10% jitter
            let jitter = (delay_ms as f64 * 0.1 * (rand_jitter() - 0.5) * 2.0) as i64;
            delay_ms = delay_ms.saturating_add_signed(jitter);

            warn!(
                "Retryable model error ({}); retry {}/{} after {}ms",
                safe_log_text(&err.to_string()),
                attempt,
                max_retries,
                delay_ms
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    async fn send_once(&self, url: &str, body: &ChatRequest) -> Result<ChatResponse, ApiError> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text, retry_after));
        }

        let body_text = response.text().await.map_err(classify_transport)?;
        debug!("API response body ({} chars)", body_text.len());

        let chat_response: ChatResponse = serde_json::from_str(&body_text)
            .map_err(|e| ApiError::Parse(format!("response JSON: {}", e)))?;

        match chat_response.content() {
            Some(content) if !content.trim().is_empty() => Ok(chat_response),
            _ => Err(ApiError::EmptyResponse),
        }
    }
}

#[async_trait]
impl ChatClient for ApiClient {
    async fn chat(&self, messages: Vec<Message>) -> Result<ChatResponse, ApiError> {
        let body = self.request_body(messages);
        self.send_with_retry(&body).await
    }
}

/// Map a non-success HTTP status to the error taxonomy.
pub fn classify_status(status: StatusCode, body: &str, retry_after: Option<u64>) -> ApiError {
    let message = error_message(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimit {
            retry_after_secs: retry_after,
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ApiError::Timeout,
        _ => ApiError::HttpStatus {
            status: status.as_u16(),
            message,
        },
    }
}

fn classify_transport(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else if e.is_builder() {
        ApiError::InvalidRequest(e.to_string())
    } else if e.is_decode() {
        ApiError::Parse(e.to_string())
    } else {
        ApiError::Network(e.to_string())
    }
}

/// Prefer the structured error message; fall back to a bounded raw body.
fn error_message(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.error.message;
    }
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Generate a random jitter value between 0 and 1
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}
