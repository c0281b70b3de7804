use crate::safety::sanitize_reqwest_error;
use thiserror::Error;

/// Errors produced by the remote session.
///
/// `Status` renders as `Error: <status> <body>`, the text the tool layer hands back to callers
/// unchanged.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("config error: {0}")]
    Config(String),
    /// The token exchange did not return HTTP 200.
    #[error("Error refreshing token: {status} {body}")]
    Auth { status: u16, body: String },
    /// A business call failed with a non-200, non-retryable status.
    #[error("Error: {status} {body}")]
    Status { status: u16, body: String },
    #[error("http transport error: {0}")]
    Transport(String),
    #[error("invalid response payload: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl From<reqwest::Error> for SessionError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(sanitize_reqwest_error(&value))
    }
}
