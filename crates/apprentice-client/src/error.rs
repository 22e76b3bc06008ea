//! Error types for console collaborator calls.

use apprentice_core::error::ApprenticeError;

/// Errors from a call to the management console.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("console returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode console response: {0}")]
    Decode(String),
    #[error("invalid console URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Whether repeating the same call may succeed.
    ///
    /// Connection failures, timeouts, 408, 429, and 5xx responses are
    /// transient. Other 4xx responses and undecodable bodies are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::Timeout => true,
            ClientError::Status { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            ClientError::Decode(_) | ClientError::InvalidUrl(_) => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else if err.is_builder() {
            ClientError::InvalidUrl(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<ClientError> for ApprenticeError {
    fn from(err: ClientError) -> Self {
        ApprenticeError::Client(err.to_string())
    }
}
