//! Error types for `qbo-openapi-tools`.

use thiserror::Error;

/// Main error type for schema extraction.
///
/// `SchemaRead`, `SchemaParse` and `SchemaHashMismatch` mean the document could not be loaded;
/// `InvalidDocument` and `InvalidOperation` mean it loaded but has an unexpected shape. All of
/// them are fatal for startup: there is no partial-success mode.
#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    #[error("Schema load error: failed to read schema document '{path}': {source}")]
    SchemaRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema load error: failed to parse schema document '{location}': {message}")]
    SchemaParse { location: String, message: String },

    #[error(
        "Schema load error: hash mismatch for '{location}'. Expected: {expected}, Got: {actual}"
    )]
    SchemaHashMismatch {
        location: String,
        expected: String,
        actual: String,
    },

    /// Top-level structure is wrong (e.g. no `paths` object).
    #[error("Schema error: {0}")]
    InvalidDocument(String),

    /// One operation violates the expected shape.
    #[error("Schema error: {method} {route}: {message}")]
    InvalidOperation {
        method: String,
        route: String,
        message: String,
    },
}

impl OpenApiToolsError {
    /// Whether the document could not be read, parsed or verified at all.
    #[must_use]
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::SchemaRead { .. } | Self::SchemaParse { .. } | Self::SchemaHashMismatch { .. }
        )
    }
}

/// Result type alias for schema extraction.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;
