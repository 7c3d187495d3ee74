use std::path::PathBuf;
use thiserror::Error;

/// The central error type for threatscope.
///
/// Each pipeline stage owns its own error enum; only collection, exhausted
/// model retries and response recovery are fatal to a run. Everything else
/// degrades the output instead of aborting.
#[derive(Error, Debug)]
pub enum ThreatScopeError {
    #[error("Collection error: {0}")]
    Collection(#[from] CollectionError),

    #[error("Model error: {0}")]
    Api(#[from] ApiError),

    #[error("Recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("Invalid source locator '{locator}': {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("Repository not found: {0}")]
    NotFound(String),

    #[error("Authentication required for {0}")]
    Authentication(String),

    #[error("Network failure while fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("Git error: {0}")]
    Git(String),

    #[error("I/O error at {path}: {message}")]
    Io { path: PathBuf, message: String },
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Unreadable file {path}: {message}")]
    Unreadable { path: PathBuf, message: String },
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API Request timed out")]
    Timeout,

    #[error("Rate limit exceeded. Retry after {retry_after_secs:?} seconds")]
    RateLimit { retry_after_secs: Option<u64> },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("API returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Model call failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<ApiError> },
}

impl ApiError {
    /// Whether another attempt may succeed (timeouts, rate limits, 5xx, connect failures).
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout | ApiError::RateLimit { .. } | ApiError::Network(_) => true,
            ApiError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("Response contains no array")]
    NoArray,

    #[error("Truncated response contains no complete element")]
    NoCompleteElement,

    #[error("Recovered response is still malformed: {0}")]
    Malformed(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Element {index} is not an object")]
    NotAnObject { index: usize },
}

pub type Result<T> = std::result::Result<T, ThreatScopeError>;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_COLLECTION_ERROR: u8 = 3;
pub const EXIT_API_ERROR: u8 = 4;
pub const EXIT_RECOVERY_ERROR: u8 = 5;
pub const EXIT_INTERRUPTED: u8 = 130;

/// Determine the appropriate process exit code for an error.
pub fn get_exit_code(e: &anyhow::Error) -> u8 {
    if let Some(err) = e.downcast_ref::<ThreatScopeError>() {
        return match err {
            ThreatScopeError::Config(_) => EXIT_CONFIG_ERROR,
            ThreatScopeError::Collection(_) => EXIT_COLLECTION_ERROR,
            ThreatScopeError::Api(_) => EXIT_API_ERROR,
            ThreatScopeError::Recovery(_) => EXIT_RECOVERY_ERROR,
            _ => EXIT_ERROR,
        };
    }

    // Stage errors placed directly into anyhow
    if e.downcast_ref::<CollectionError>().is_some() {
        return EXIT_COLLECTION_ERROR;
    }
    if e.downcast_ref::<ApiError>().is_some() {
        return EXIT_API_ERROR;
    }
    if e.downcast_ref::<RecoveryError>().is_some() {
        return EXIT_RECOVERY_ERROR;
    }

    EXIT_ERROR
}
