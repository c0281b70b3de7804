//! QuickBooks remote session and HTTP helpers.
//!
//! Owns the OAuth2 refresh-token flow and the tenant-scoped business API calls. Tool naming and
//! MCP wiring live in `qbo-mcp-server`.

pub mod config;
pub mod error;
pub mod safety;
pub mod semantics;
pub mod session;

pub use config::{ApiEnvironment, SessionConfig};
pub use error::{Result, SessionError};
pub use reqwest::Method;
pub use session::RemoteSession;
