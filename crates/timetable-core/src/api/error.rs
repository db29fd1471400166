use thiserror::Error;

/// Failure of a single relay attempt, or of a whole `ProxyClient::get` call.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Relay response missing field: {0}")]
    MissingField(String),

    #[error("Relay returned invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Empty response ({0} characters)")]
    EmptyResponse(usize),

    #[error("All proxies failed after {attempts} attempts: {last}")]
    AllProxiesExhausted {
        attempts: usize,
        last: Box<FetchError>,
    },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Errors surfaced by the catalog, cache and coordinator layers.
#[derive(Error, Debug)]
pub enum TimetableError {
    #[error(transparent)]
    Transport(#[from] FetchError),

    #[error("Could not parse server response: {0}")]
    Parse(String),

    #[error("Could not load batches. Please check your internet connection.")]
    NoBatchesAvailable,

    #[error("No batch selected")]
    NoSelection,
}

impl TimetableError {
    /// True for relay/network failures, false for logical or backend failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, TimetableError::Transport(_))
    }
}

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Truncate a response body to avoid logging excessive data
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated, {} total bytes)", cut, body.len())
    }
}
