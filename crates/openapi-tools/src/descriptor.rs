//! Normalized endpoint descriptors produced by the extractor.

use serde_json::{Map, Value};
use std::fmt;

/// Tenant-scoping prefix shared by every QuickBooks business route.
///
/// Descriptors never carry it; the remote session re-adds `/v3/company/<companyId>` when it
/// builds the final URL.
pub const TENANT_PREFIX: &str = "/v3/company/{realmId}";

/// Name of the tenant path parameter. It is never documented or routed.
pub const TENANT_PARAM: &str = "realmId";

/// One remote endpoint: route template, verb, documentation fields and parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescriptor {
    /// Route template with `{param}` placeholders, tenant prefix stripped.
    pub route: String,
    /// Lowercase HTTP verb.
    pub method: String,
    pub summary: Option<String>,
    pub response_description: String,
    /// Request-body field descriptions, when the operation declares a body.
    pub request_fields: Option<Map<String, Value>>,
    pub parameters: Vec<ParameterDescriptor>,
}

impl EndpointDescriptor {
    /// Whether the verb carries a JSON body assembled from unclaimed arguments.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self.method.as_str(), "post" | "put" | "patch")
    }

    /// Parameters that participate in routing and documentation (everything but `realmId`).
    pub fn routable_parameters(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.parameters.iter().filter(|p| p.name != TENANT_PARAM)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    /// `schema.type`, or `"unknown"`.
    pub param_type: String,
    pub description: String,
}

/// Where a parameter goes. Anything that is neither `path` nor `query` keeps its raw `in`
/// value for documentation but is not routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Other(String),
}

impl ParamLocation {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Other(raw) => raw,
        }
    }
}

impl From<&str> for ParamLocation {
    fn from(value: &str) -> Self {
        match value {
            "path" => ParamLocation::Path,
            "query" => ParamLocation::Query,
            other => ParamLocation::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remove every occurrence of [`TENANT_PREFIX`] from a route template.
#[must_use]
pub fn strip_tenant_prefix(route: &str) -> String {
    if route.contains(TENANT_PREFIX) {
        route.replace(TENANT_PREFIX, "")
    } else {
        route.to_string()
    }
}

/// Placeholder names (`{name}`) of a route template, in order of appearance.
#[must_use]
pub fn route_placeholders(route: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = route;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push(&after[..end]);
        rest = &after[end + 1..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tenant_prefix_only_when_present() {
        assert_eq!(
            strip_tenant_prefix("/v3/company/{realmId}/bill/{billId}"),
            "/bill/{billId}"
        );
        assert_eq!(strip_tenant_prefix("/bill/{billId}"), "/bill/{billId}");
    }

    #[test]
    fn finds_placeholders_in_order() {
        assert_eq!(
            route_placeholders("/reports/{report}/rows/{rowId}"),
            vec!["report", "rowId"]
        );
        assert!(route_placeholders("/query").is_empty());
        assert!(route_placeholders("/broken/{oops").is_empty());
    }

    #[test]
    fn location_round_trips_raw_value() {
        assert_eq!(ParamLocation::from("path"), ParamLocation::Path);
        assert_eq!(ParamLocation::from("header").as_str(), "header");
        assert_eq!(ParamLocation::from("unknown").to_string(), "unknown");
    }
}
