//! QuickBooks Online MCP server.
//!
//! Reads the QuickBooks OpenAPI schema, generates one tool per operation and forwards calls
//! through an OAuth2-authenticated remote session.

pub mod config;
pub mod entity_schema;
pub mod error;
pub mod handler;
pub mod logging;
pub mod registrar;
pub mod serve;

pub use config::Cli;
pub use error::{Result, ServerError, ToolCallError};
pub use handler::QuickbooksServer;
pub use serve::{build_server, run};
