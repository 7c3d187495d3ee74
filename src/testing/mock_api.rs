//! Mock LLM API Server for tests
//!
//! Provides a [`MockLlmServer`] that emulates an OpenAI-compatible
//! `/v1/chat/completions` endpoint so the model-backed synthesizer can be
//! exercised end to end without a live model.
//!
//! # Features
//! - Canned text responses, optionally cut off with `finish_reason: "length"`
//! - Configurable error responses (status code, body, `Retry-After`)
//! - Latency simulation
//! - Captured request bodies for prompt assertions
//!
//! # Example
//! ```ignore
//! let server = MockLlmServer::builder()
//!     .with_error(503, "overloaded")
//!     .with_response("[]")
//!     .build()
//!     .await?;
//! let endpoint = format!("{}/v1", server.url());
//! // ... point the client at `endpoint` ...
//! server.stop().await;
//! ```

use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};

/// Largest request body the mock will buffer.
const MAX_REQUEST_BYTES: usize = 4 * 1024 * 1024;

/// Describes how the mock server should respond to the next request.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a plain assistant text message.
    Text(String),
    /// Return assistant text marked as cut off by the token limit.
    Truncated(String),
    /// Return an HTTP error with the given status code and body.
    Error {
        status: u16,
        body: String,
        retry_after: Option<u64>,
    },
}

/// A lightweight mock HTTP server that speaks just enough of the
/// chat-completions protocol to satisfy threatscope's API client.
pub struct MockLlmServer {
    url: String,
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
    requests: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl MockLlmServer {
    pub fn builder() -> MockLlmServerBuilder {
        MockLlmServerBuilder::default()
    }

    /// Bind to `127.0.0.1:0` and serve in a background task.
    pub async fn start(config: MockServerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}", listener.local_addr()?);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = Arc::new(ServerState {
            config,
            next: Mutex::new(0),
            requests: Arc::new(Mutex::new(Vec::new())),
        });
        let requests = Arc::clone(&state.requests);

        let handle = tokio::spawn(accept_loop(listener, state, shutdown_rx));

        Ok(Self {
            url,
            shutdown_tx,
            handle,
            requests,
        })
    }

    /// Base URL, e.g. `"http://127.0.0.1:54321"`.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Endpoint to hand to the client config (`{url}/v1`).
    pub fn endpoint(&self) -> String {
        format!("{}/v1", self.url)
    }

    /// JSON bodies of every chat request received so far.
    pub async fn requests(&self) -> Vec<serde_json::Value> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

#[derive(Debug, Clone)]
pub struct MockServerConfig {
    /// Served in FIFO order; `default_response` afterwards.
    pub responses: Vec<MockResponse>,
    pub default_response: MockResponse,
    pub latency_ms: u64,
    pub model: String,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            responses: Vec::new(),
            default_response: MockResponse::Text("[]".to_string()),
            latency_ms: 0,
            model: "mock-model".to_string(),
        }
    }
}

#[derive(Default)]
pub struct MockLlmServerBuilder {
    config: MockServerConfig,
}

impl MockLlmServerBuilder {
    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        self.config.responses.push(MockResponse::Text(text.into()));
        self
    }

    pub fn with_truncated_response(mut self, text: impl Into<String>) -> Self {
        self.config
            .responses
            .push(MockResponse::Truncated(text.into()));
        self
    }

    pub fn with_error(mut self, status: u16, body: impl Into<String>) -> Self {
        self.config.responses.push(MockResponse::Error {
            status,
            body: body.into(),
            retry_after: None,
        });
        self
    }

    /// Queue a 429 carrying a `Retry-After` header.
    pub fn with_rate_limit(mut self, retry_after_secs: u64) -> Self {
        self.config.responses.push(MockResponse::Error {
            status: 429,
            body: r#"{"error":{"message":"rate limit exceeded","type":"rate_limit"}}"#.to_string(),
            retry_after: Some(retry_after_secs),
        });
        self
    }

    pub fn with_latency(mut self, ms: u64) -> Self {
        self.config.latency_ms = ms;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_default_response(mut self, resp: MockResponse) -> Self {
        self.config.default_response = resp;
        self
    }

    pub async fn build(self) -> std::io::Result<MockLlmServer> {
        MockLlmServer::start(self.config).await
    }
}

struct ServerState {
    config: MockServerConfig,
    next: Mutex<usize>,
    requests: Arc<Mutex<Vec<serde_json::Value>>>,
}

async fn accept_loop(
    listener: TcpListener,
    state: Arc<ServerState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, state).await {
                                tracing::debug!("mock server connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::debug!("mock server accept error: {}", e);
                    }
                }
            }
        }
    }
}

/// Read the head and, per `Content-Length`, the whole body.
async fn read_request(stream: &mut tokio::net::TcpStream) -> std::io::Result<Option<(String, Vec<u8>)>> {
    let mut buf = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        if buf.len() > MAX_REQUEST_BYTES {
            return Ok(None);
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0)
        .min(MAX_REQUEST_BYTES);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = buf.len().min(header_end + content_length);
    Ok(Some((head, buf[header_end..end].to_vec())))
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    state: Arc<ServerState>,
) -> std::io::Result<()> {
    let Some((head, body)) = read_request(&mut stream).await? else {
        return Ok(());
    };

    let is_chat = head.starts_with("POST") && head.contains("/v1/chat/completions");
    if !is_chat {
        let response = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        stream.write_all(response.as_bytes()).await?;
        return Ok(());
    }

    let parsed = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    state.requests.lock().await.push(parsed);

    if state.config.latency_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(state.config.latency_ms)).await;
    }

    let mock_response = {
        let mut next = state.next.lock().await;
        match state.config.responses.get(*next) {
            Some(resp) => {
                *next += 1;
                resp.clone()
            }
            None => state.config.default_response.clone(),
        }
    };

    match mock_response {
        MockResponse::Text(text) => {
            let body = format_chat_response(&state.config.model, &text, "stop");
            write_http_response(&mut stream, 200, &body, None).await
        }
        MockResponse::Truncated(text) => {
            let body = format_chat_response(&state.config.model, &text, "length");
            write_http_response(&mut stream, 200, &body, None).await
        }
        MockResponse::Error {
            status,
            body,
            retry_after,
        } => write_http_response(&mut stream, status, &body, retry_after).await,
    }
}

/// OpenAI chat-completions response body.
fn format_chat_response(model: &str, content: &str, finish_reason: &str) -> String {
    serde_json::json!({
        "id": "mock-resp-1",
        "object": "chat.completion",
        "created": 1_700_000_000u64,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": finish_reason,
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
    })
    .to_string()
}

async fn write_http_response(
    stream: &mut tokio::net::TcpStream,
    status: u16,
    body: &str,
    retry_after: Option<u64>,
) -> std::io::Result<()> {
    let status_text = match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Error",
    };
    let retry_header = retry_after
        .map(|s| format!("Retry-After: {}\r\n", s))
        .unwrap_or_default();

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        retry_header,
        body,
    );
    stream.write_all(response.as_bytes()).await
}
