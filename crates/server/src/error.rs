//! Error types for the QuickBooks MCP server.

use qbo_http_tools::SessionError;
use qbo_openapi_tools::OpenApiToolsError;
use thiserror::Error;

/// Startup and registration failures. All of them are fatal.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration errors (missing credentials, unusable flags)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Startup errors (transport failed to bind or serve)
    #[error("Startup error: {0}")]
    Startup(String),

    /// Two operations (or an operation and a built-in tool) map to the same tool name
    #[error("Tool name conflict: '{name}' is produced by {first} and {second}")]
    NameConflict {
        name: String,
        first: String,
        second: String,
    },

    /// An operation uses an HTTP verb that cannot be sent
    #[error("Invalid HTTP method '{method}' for route {route}")]
    InvalidMethod { method: String, route: String },

    #[error(transparent)]
    Schema(#[from] OpenApiToolsError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Per-call failures of a generated tool.
///
/// These never escape the tool boundary: the handler renders them as text content with
/// `isError` set.
#[derive(Error, Debug)]
pub enum ToolCallError {
    #[error(
        "Error: QuickBooks session not initialized. Please check your credentials and restart the server."
    )]
    NotInitialized,

    #[error("Error: Missing required path parameter '{name}' for route {route}")]
    MissingPathParameter { name: String, route: String },

    /// A path value that would resolve outside its route (`.` or `..`).
    #[error("Error: Invalid value '{value}' for path parameter '{name}' in route {route}")]
    InvalidPathParameter {
        name: String,
        value: String,
        route: String,
    },

    /// The remote API answered with a non-200 status.
    #[error("{0}")]
    Remote(SessionError),

    /// Any other failure while executing the tool (transport, token refresh, decoding).
    #[error("Error executing {tool}: {source}")]
    Execution {
        tool: String,
        #[source]
        source: SessionError,
    },
}

impl ToolCallError {
    /// Classify a session failure raised while executing `tool`.
    #[must_use]
    pub fn from_session(tool: &str, err: SessionError) -> Self {
        match err {
            SessionError::Status { .. } => Self::Remote(err),
            other => Self::Execution {
                tool: tool.to_string(),
                source: other,
            },
        }
    }
}
