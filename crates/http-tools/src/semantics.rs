//! HTTP verb semantics for generated QuickBooks tools.
//!
//! Operation descriptors carry the verb as the lowercase OpenAPI key (`get`, `post`, ...). This
//! module turns that key into a request [`Method`] and into MCP `ToolAnnotations` following
//! RFC 9110 method semantics.

use reqwest::Method;
use rmcp::model::ToolAnnotations;

/// Parse an OpenAPI operation key into an HTTP method.
///
/// Returns `None` for keys that are not a valid method token.
#[must_use]
pub fn method_for_verb(verb: &str) -> Option<Method> {
    verb.trim().to_uppercase().parse().ok()
}

/// Generate MCP tool annotations for an operation verb.
///
/// `openWorldHint` is always `true`: every generated tool talks to the remote accounting API.
/// Extension verbs only carry that hint.
#[must_use]
pub fn annotations_for_method(method: &Method, title: Option<String>) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = match *method {
        Method::GET | Method::HEAD | Method::OPTIONS => (Some(true), Some(false), Some(true)),
        Method::POST => (Some(false), Some(false), Some(false)),
        Method::PUT | Method::DELETE => (Some(false), Some(true), Some(true)),
        // PATCH may or may not be idempotent.
        Method::PATCH => (Some(false), Some(true), None),
        _ => (None, None, None),
    };

    ToolAnnotations {
        title,
        read_only_hint: read_only,
        destructive_hint: destructive,
        idempotent_hint: idempotent,
        open_world_hint: Some(true),
    }
}

/// Annotations for the built-in `query` tool: a read-only GET against the query endpoint.
#[must_use]
pub fn query_annotations() -> ToolAnnotations {
    annotations_for_method(&Method::GET, Some("Run a QuickBooks query".to_string()))
}
