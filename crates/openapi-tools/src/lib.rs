//! QuickBooks OpenAPI schema extraction.
//!
//! Turns the static QuickBooks OpenAPI document into a flat, ordered list of
//! [`descriptor::EndpointDescriptor`]s that the MCP server registers as tools.
//!
//! It intentionally contains **no** HTTP or MCP logic.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod extractor;

pub use descriptor::{EndpointDescriptor, ParamLocation, ParameterDescriptor};
pub use error::{OpenApiToolsError, Result};
pub use extractor::{extract_descriptors, load_descriptors};
