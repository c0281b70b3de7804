//! Turns endpoint descriptors into named, documented MCP tools and routes their arguments.
//!
//! Each generated tool is a plain value: the descriptor it was built from, the parsed HTTP
//! method, the synthesized name/documentation and the MCP input schema. Invocation is driven
//! entirely by those fields.

use crate::error::{Result, ServerError, ToolCallError};
use qbo_http_tools::safety::encode_path_segment;
use qbo_http_tools::semantics::{annotations_for_method, method_for_verb};
use qbo_http_tools::{Method, RemoteSession};
use qbo_openapi_tools::descriptor::{TENANT_PARAM, route_placeholders, strip_tenant_prefix};
use qbo_openapi_tools::{EndpointDescriptor, ParamLocation};
use rmcp::model::{JsonObject, Tool};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

pub const QUERY_TOOL: &str = "query_quickbooks";
pub const ENTITY_SCHEMA_TOOL: &str = "get_quickbooks_entity_schema";

/// Names owned by the built-in tools; generated tools may not reuse them.
pub const BUILTIN_TOOL_NAMES: [&str; 2] = [QUERY_TOOL, ENTITY_SCHEMA_TOOL];

const JSON_SCHEMA_PRIMITIVES: [&str; 6] = ["string", "integer", "number", "boolean", "array", "object"];

pub struct GeneratedTool {
    name: String,
    documentation: String,
    method: Method,
    descriptor: EndpointDescriptor,
    input_schema: Arc<JsonObject>,
}

impl GeneratedTool {
    fn new(descriptor: EndpointDescriptor) -> Result<Self> {
        let method = method_for_verb(&descriptor.method).ok_or_else(|| ServerError::InvalidMethod {
            method: descriptor.method.clone(),
            route: descriptor.route.clone(),
        })?;
        let name = tool_name(&descriptor);
        let documentation = documentation(&name, &descriptor);
        let input_schema = Arc::new(input_schema(&descriptor));
        Ok(Self {
            name,
            documentation,
            method,
            descriptor,
            input_schema,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    #[must_use]
    pub fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    /// MCP listing entry for this tool.
    #[must_use]
    pub fn to_tool(&self) -> Tool {
        let mut tool = Tool::new(
            self.name.clone(),
            self.documentation.clone(),
            self.input_schema.clone(),
        );
        tool.annotations = Some(annotations_for_method(
            &self.method,
            self.descriptor.summary.clone(),
        ));
        tool
    }

    /// Route the caller's arguments and call the remote endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ToolCallError`] when the session is unset, a route placeholder has no usable
    /// value, or the remote call fails. Nothing is sent unless the remote call is attempted.
    pub async fn invoke(
        &self,
        session: Option<&RemoteSession>,
        arguments: Map<String, Value>,
    ) -> std::result::Result<Value, ToolCallError> {
        let Some(session) = session else {
            return Err(ToolCallError::NotInitialized);
        };

        let arguments = apply_kwargs_shim(arguments);
        tracing::debug!(tool = %self.name, ?arguments, "executing generated tool");

        let routed = partition_arguments(&self.descriptor, arguments);
        let route = substitute_route(&self.descriptor.route, &routed.path)?;
        let body = (!routed.body.is_empty()).then(|| Value::Object(routed.body));

        let response = session
            .call_route(&self.method, &route, &routed.query, body.as_ref())
            .await
            .map_err(|e| ToolCallError::from_session(&self.name, e))?;
        tracing::debug!(tool = %self.name, "generated tool succeeded");
        Ok(response)
    }
}

/// The generated tools, in schema order, plus the shared session they call through.
pub struct ToolRegistry {
    tools: Vec<GeneratedTool>,
    index: HashMap<String, usize>,
    session: Option<Arc<RemoteSession>>,
}

impl ToolRegistry {
    /// Build one tool per descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NameConflict`] when two descriptors (or a descriptor and a
    /// built-in tool) produce the same name, and [`ServerError::InvalidMethod`] for a verb that
    /// is not a valid HTTP method token.
    pub fn build(
        descriptors: Vec<EndpointDescriptor>,
        session: Option<Arc<RemoteSession>>,
    ) -> Result<Self> {
        let mut tools: Vec<GeneratedTool> = Vec::with_capacity(descriptors.len());
        let mut index = HashMap::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let tool = GeneratedTool::new(descriptor)?;
            if BUILTIN_TOOL_NAMES.contains(&tool.name.as_str()) {
                return Err(ServerError::NameConflict {
                    name: tool.name.clone(),
                    first: "a built-in tool".to_string(),
                    second: operation_label(&tool.descriptor),
                });
            }
            if let Some(&existing) = index.get(&tool.name) {
                let first: &GeneratedTool = &tools[existing];
                return Err(ServerError::NameConflict {
                    name: tool.name.clone(),
                    first: operation_label(&first.descriptor),
                    second: operation_label(&tool.descriptor),
                });
            }
            tracing::debug!(
                tool = %tool.name(),
                method = %tool.method,
                route = %tool.descriptor().route,
                "registered tool"
            );
            index.insert(tool.name.clone(), tools.len());
            tools.push(tool);
        }

        tracing::info!(count = tools.len(), "registered generated QuickBooks tools");
        Ok(Self {
            tools,
            index,
            session,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GeneratedTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedTool> {
        self.tools.iter()
    }

    #[must_use]
    pub fn session(&self) -> Option<&Arc<RemoteSession>> {
        self.session.as_ref()
    }

    /// Invoke a generated tool by name; `None` when no such tool exists.
    pub async fn call(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Option<std::result::Result<Value, ToolCallError>> {
        let tool = self.get(name)?;
        Some(tool.invoke(self.session.as_deref(), arguments).await)
    }
}

fn operation_label(descriptor: &EndpointDescriptor) -> String {
    format!("{} {}", descriptor.method.to_uppercase(), descriptor.route)
}

/// `<verb><route>` with the tenant prefix removed, `/ - :` turned into `_` and braces dropped.
#[must_use]
pub fn tool_name(descriptor: &EndpointDescriptor) -> String {
    let route = strip_tenant_prefix(&descriptor.route);
    let cleaned = route.replace(['/', '-', ':'], "_").replace(['{', '}'], "");
    format!("{}{cleaned}", descriptor.method)
}

/// Human/LLM-facing description of a generated tool.
#[must_use]
pub fn documentation(name: &str, descriptor: &EndpointDescriptor) -> String {
    let summary = descriptor
        .summary
        .clone()
        .unwrap_or_else(|| summary_from_name(name));
    let mut doc = summary.trim_end_matches('.').to_string();
    doc.push_str(". ");

    if descriptor.response_description != "OK" {
        doc.push_str(&format!(
            "If successful, the outcome will be \"{}\". ",
            descriptor.response_description
        ));
    }

    if let Some(fields) = &descriptor.request_fields {
        let fields: Map<String, Value> = fields
            .iter()
            .filter(|(name, _)| name.as_str() != TENANT_PARAM)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if !fields.is_empty() {
            doc.push_str(&format!(
                "The request body should be a JSON object with the following structure: {}. ",
                Value::Object(fields)
            ));
        }
    }

    let params: Map<String, Value> = descriptor
        .routable_parameters()
        .map(|p| {
            (
                p.name.clone(),
                json!({
                    "description": p.description,
                    "required": p.required,
                    "type": p.param_type,
                    "in": p.location.as_str(),
                }),
            )
        })
        .collect();
    if !params.is_empty() {
        let pretty = serde_json::to_string_pretty(&Value::Object(params)).unwrap_or_default();
        doc.push_str(&format!("Parameters: {pretty}. "));
    }

    doc.trim_end().to_string()
}

fn summary_from_name(name: &str) -> String {
    let mut words = name.split('_').filter(|w| !w.is_empty());
    let mut out = String::new();
    if let Some(first) = words.next() {
        let mut chars = first.chars();
        if let Some(c) = chars.next() {
            out.extend(c.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    for word in words {
        out.push(' ');
        out.push_str(word);
    }
    out.push('.');
    out
}

/// Object schema over the routable parameters and body fields. Extra keys are allowed.
fn input_schema(descriptor: &EndpointDescriptor) -> JsonObject {
    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();

    for param in descriptor.routable_parameters() {
        let mut prop = Map::new();
        if JSON_SCHEMA_PRIMITIVES.contains(&param.param_type.as_str()) {
            prop.insert("type".into(), json!(param.param_type));
        }
        prop.insert("description".into(), json!(param.description));
        properties.insert(param.name.clone(), Value::Object(prop));

        if param.required && matches!(param.location, ParamLocation::Path | ParamLocation::Query) {
            required.push(json!(param.name));
        }
    }

    if let Some(fields) = &descriptor.request_fields {
        for (name, field) in fields {
            if name == TENANT_PARAM || properties.contains_key(name) {
                continue;
            }
            properties.insert(name.clone(), body_field_schema(field));
        }
    }

    let mut schema = JsonObject::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }
    schema.insert("additionalProperties".into(), json!(true));
    schema
}

fn body_field_schema(field: &Value) -> Value {
    match field {
        Value::String(description) => json!({ "description": description }),
        Value::Object(obj) => {
            let mut prop = Map::new();
            if let Some(ty) = obj
                .get("type")
                .and_then(Value::as_str)
                .filter(|t| JSON_SCHEMA_PRIMITIVES.contains(t))
            {
                prop.insert("type".into(), json!(ty));
            }
            let description = obj
                .get("description")
                .and_then(Value::as_str)
                .map_or_else(|| field.to_string(), str::to_string);
            prop.insert("description".into(), json!(description));
            Value::Object(prop)
        }
        Value::Null => json!({}),
        other => json!({ "description": other.to_string() }),
    }
}

/// Some clients send every argument as one `kwargs: "key=value"` string.
fn apply_kwargs_shim(arguments: Map<String, Value>) -> Map<String, Value> {
    if arguments.len() != 1 {
        return arguments;
    }
    let Some(Value::String(raw)) = arguments.get("kwargs") else {
        return arguments;
    };
    let Some((key, value)) = raw.split_once('=') else {
        return arguments;
    };
    let mut rewritten = Map::new();
    rewritten.insert(key.to_string(), Value::String(value.to_string()));
    rewritten
}

#[derive(Debug, Default)]
struct RoutedArguments {
    path: HashMap<String, String>,
    query: Vec<(String, String)>,
    body: Map<String, Value>,
}

fn partition_arguments(descriptor: &EndpointDescriptor, arguments: Map<String, Value>) -> RoutedArguments {
    let placeholders = route_placeholders(&descriptor.route);
    let locations: HashMap<&str, &ParamLocation> = descriptor
        .routable_parameters()
        .map(|p| (p.name.as_str(), &p.location))
        .collect();

    let mut routed = RoutedArguments::default();
    for (key, value) in arguments {
        if key == TENANT_PARAM {
            tracing::debug!(argument = %key, "ignoring tenant argument");
            continue;
        }
        match locations.get(key.as_str()) {
            Some(ParamLocation::Path) => {
                if !value.is_null() {
                    routed.path.insert(key, value_to_string(&value));
                }
            }
            Some(ParamLocation::Query) => push_query(&mut routed.query, &key, &value),
            _ if placeholders.contains(&key.as_str()) => {
                if !value.is_null() {
                    routed.path.insert(key, value_to_string(&value));
                }
            }
            _ if descriptor.is_write() => {
                routed.body.insert(key, value);
            }
            _ => {
                tracing::debug!(
                    argument = %key,
                    method = %descriptor.method,
                    route = %descriptor.route,
                    "dropping argument that matches no parameter"
                );
            }
        }
    }
    routed
}

fn push_query(query: &mut Vec<(String, String)>, key: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items.iter().filter(|v| !v.is_null()) {
                query.push((key.to_string(), value_to_string(item)));
            }
        }
        other => query.push((key.to_string(), value_to_string(other))),
    }
}

fn substitute_route(
    route: &str,
    path: &HashMap<String, String>,
) -> std::result::Result<String, ToolCallError> {
    let mut out = String::with_capacity(route.len());
    let mut rest = route;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        let value = path
            .get(name)
            .ok_or_else(|| ToolCallError::MissingPathParameter {
                name: name.to_string(),
                route: route.to_string(),
            })?;
        let segment =
            encode_path_segment(value).ok_or_else(|| ToolCallError::InvalidPathParameter {
                name: name.to_string(),
                value: value.clone(),
                route: route.to_string(),
            })?;
        out.push_str(&rest[..start]);
        out.push_str(&segment);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}
