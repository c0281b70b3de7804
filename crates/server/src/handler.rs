//! MCP surface: the two built-in tools plus one tool per schema operation.

use crate::entity_schema::{EntitySchemaError, EntitySchemaFile};
use crate::error::ToolCallError;
use crate::registrar::{ENTITY_SCHEMA_TOOL, QUERY_TOOL, ToolRegistry};
use qbo_http_tools::semantics::{annotations_for_method, query_annotations};
use qbo_http_tools::{Method, SessionError};
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, JsonObject, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler};
use serde_json::{Map, Value, json};
use std::sync::Arc;

const QUERY_TOOL_DESCRIPTION: &str = "Executes a SQL-like query on a QuickBooks entity. \
**IMPORTANT**: Before using this tool, you MUST first use the `get_quickbooks_entity_schema` \
tool to get the schema for the entity you want to query (e.g., 'Bill', 'Customer'). This will \
show you the available fields to use in your query's `select` and `where` clauses.";

const ENTITY_SCHEMA_TOOL_DESCRIPTION: &str = "Fetches the schema for a given QuickBooks entity \
(e.g., 'Bill', 'Customer'). Use this tool to understand the available fields for an entity \
before constructing a query with the `query_quickbooks` tool.";

const INSTRUCTIONS: &str = "QuickBooks Online tools. Use get_quickbooks_entity_schema to learn \
an entity's fields, query_quickbooks for read queries, and the generated <verb>_<route> tools \
for individual API operations.";

#[derive(Clone)]
pub struct QuickbooksServer {
    inner: Arc<Inner>,
}

struct Inner {
    registry: ToolRegistry,
    entity_schemas: EntitySchemaFile,
}

impl QuickbooksServer {
    #[must_use]
    pub fn new(registry: ToolRegistry, entity_schemas: EntitySchemaFile) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                entity_schemas,
            }),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.inner.registry
    }

    /// Built-in tools first, then generated tools in schema order.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        let mut tools = builtin_tools();
        tools.extend(self.inner.registry.iter().map(|t| t.to_tool()));
        tools
    }

    /// Dispatch a tool call.
    ///
    /// Tool failures, including malformed arguments, come back as `Ok` results with `isError`
    /// set; only an unknown tool is a protocol error.
    ///
    /// # Errors
    ///
    /// Returns `invalid_params` for an unknown tool name.
    pub async fn call(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, ErrorData> {
        match name {
            QUERY_TOOL => Ok(match required_str(&arguments, "query") {
                Ok(query) => self.run_query(query).await,
                Err(missing) => error_result(format!("Error executing query: {missing}")),
            }),
            ENTITY_SCHEMA_TOOL => Ok(match required_str(&arguments, "entity_name") {
                Ok(entity) => match self.inner.entity_schemas.lookup(entity).await {
                    Ok(text) => CallToolResult::success(vec![Content::text(text)]),
                    Err(e) => error_result(e.to_string()),
                },
                Err(missing) => error_result(EntitySchemaError::Other(missing).to_string()),
            }),
            _ => match self.inner.registry.call(name, arguments).await {
                Some(Ok(value)) => Ok(value_result(value)),
                Some(Err(e)) => {
                    if !matches!(e, ToolCallError::NotInitialized) {
                        tracing::error!(tool = name, error = %e, "tool call failed");
                    }
                    Ok(error_result(e.to_string()))
                }
                None => Err(ErrorData::invalid_params(
                    format!("Unknown tool: {name}"),
                    None,
                )),
            },
        }
    }

    async fn run_query(&self, query: &str) -> CallToolResult {
        let Some(session) = self.inner.registry.session() else {
            return error_result(ToolCallError::NotInitialized.to_string());
        };
        tracing::debug!(query, "executing query");
        match session.query(query).await {
            Ok(value) => value_result(value),
            Err(e @ SessionError::Status { .. }) => error_result(e.to_string()),
            Err(e) => {
                tracing::error!(error = %e, "query failed");
                error_result(format!("Error executing query: {e}"))
            }
        }
    }
}

impl ServerHandler for QuickbooksServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "quickbooks".to_string(),
                title: Some("QuickBooks Online".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        self.call(&request.name, request.arguments.unwrap_or_default())
            .await
    }
}

fn builtin_tools() -> Vec<Tool> {
    let mut query = Tool::new(
        QUERY_TOOL,
        QUERY_TOOL_DESCRIPTION,
        Arc::new(string_argument_schema(
            "query",
            "QuickBooks query, e.g. select * from Bill where TotalAmt > '100.00'",
        )),
    );
    query.annotations = Some(query_annotations());

    let mut entity = Tool::new(
        ENTITY_SCHEMA_TOOL,
        ENTITY_SCHEMA_TOOL_DESCRIPTION,
        Arc::new(string_argument_schema(
            "entity_name",
            "Entity name, e.g. Bill or Customer",
        )),
    );
    let mut annotations = annotations_for_method(&Method::GET, None);
    // Reads a local file, not the remote API.
    annotations.open_world_hint = Some(false);
    entity.annotations = Some(annotations);

    vec![entity, query]
}

fn string_argument_schema(name: &str, description: &str) -> JsonObject {
    let mut properties = Map::new();
    properties.insert(
        name.to_string(),
        json!({ "type": "string", "description": description }),
    );

    let mut schema = JsonObject::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    schema.insert("required".into(), json!([name]));
    schema
}

fn required_str<'a>(arguments: &'a Map<String, Value>, key: &str) -> Result<&'a str, String> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing required string argument '{key}'"))
}

fn value_result(value: Value) -> CallToolResult {
    let text = match value {
        Value::String(s) => s,
        other => other.to_string(),
    };
    CallToolResult::success(vec![Content::text(text)])
}

fn error_result(text: String) -> CallToolResult {
    CallToolResult::error(vec![Content::text(text)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbo_http_tools::config::ApiEnvironment;
    use qbo_http_tools::{RemoteSession, SessionConfig};
    use qbo_openapi_tools::{EndpointDescriptor, ParamLocation, ParameterDescriptor};
    use qbo_test_support::MockQuickbooks;

    fn bill_descriptor() -> EndpointDescriptor {
        EndpointDescriptor {
            route: "/bill/{billId}".to_string(),
            method: "get".to_string(),
            summary: Some("Read a bill".to_string()),
            response_description: "OK".to_string(),
            request_fields: None,
            parameters: vec![ParameterDescriptor {
                name: "billId".to_string(),
                location: ParamLocation::Path,
                required: true,
                param_type: "string".to_string(),
                description: "Bill id".to_string(),
            }],
        }
    }

    fn server(session: Option<Arc<RemoteSession>>, dir: &tempfile::TempDir) -> QuickbooksServer {
        let registry = ToolRegistry::build(vec![bill_descriptor()], session).expect("registry");
        let schemas = dir.path().join("entities.json");
        std::fs::write(&schemas, r#"{"Bill": {"Id": "string"}}"#).expect("write schemas");
        QuickbooksServer::new(registry, EntitySchemaFile::new(schemas))
    }

    async fn session_for(mock: &MockQuickbooks) -> Arc<RemoteSession> {
        let mut cfg = SessionConfig::new("client", "secret", "rt", "42", ApiEnvironment::Sandbox);
        cfg.base_url = mock.base_url().to_string();
        cfg.token_url = mock.token_url();
        Arc::new(RemoteSession::connect(cfg).await.expect("connect"))
    }

    fn rendered(result: &CallToolResult) -> (String, bool) {
        let v = serde_json::to_value(result).expect("serialize result");
        let text = v["content"][0]["text"].as_str().unwrap_or_default().to_string();
        (text, v["isError"].as_bool().unwrap_or(false))
    }

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn lists_builtins_then_generated_tools() {
        let dir = tempfile::tempdir().expect("tempdir");
        let names: Vec<String> = server(None, &dir)
            .tools()
            .iter()
            .map(|t| t.name.to_string())
            .collect();
        assert_eq!(
            names,
            vec![ENTITY_SCHEMA_TOOL, QUERY_TOOL, "get_bill_billId"]
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = server(None, &dir)
            .call("get_nothing", Map::new())
            .await
            .expect_err("unknown tool");
        assert!(err.message.contains("get_nothing"));
    }

    #[tokio::test]
    async fn uninitialized_session_is_reported_as_tool_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let srv = server(None, &dir);

        for (name, arguments) in [
            ("get_bill_billId", json!({ "billId": "7" })),
            (QUERY_TOOL, json!({ "query": "select * from Bill" })),
        ] {
            let result = srv.call(name, args(arguments)).await.expect("tool result");
            let (text, is_error) = rendered(&result);
            assert!(is_error, "{name}");
            assert_eq!(
                text,
                "Error: QuickBooks session not initialized. Please check your credentials and restart the server."
            );
        }
    }

    #[tokio::test]
    async fn entity_schema_tool_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let srv = server(None, &dir);

        let ok = srv
            .call(ENTITY_SCHEMA_TOOL, args(json!({ "entity_name": "Bill" })))
            .await
            .expect("tool result");
        let (text, is_error) = rendered(&ok);
        assert!(!is_error);
        assert!(text.contains("\"Id\": \"string\""), "{text}");

        let missing = srv
            .call(ENTITY_SCHEMA_TOOL, args(json!({ "entity_name": "Vendor" })))
            .await
            .expect("tool result");
        let (text, is_error) = rendered(&missing);
        assert!(is_error);
        assert!(text.contains("Available entities: ['Bill']"), "{text}");
    }

    #[tokio::test]
    async fn builtins_report_missing_arguments_as_tool_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let srv = server(None, &dir);

        let missing = srv
            .call(QUERY_TOOL, Map::new())
            .await
            .expect("tool result");
        let (text, is_error) = rendered(&missing);
        assert!(is_error);
        assert_eq!(
            text,
            "Error executing query: missing required string argument 'query'"
        );

        let not_a_string = srv
            .call(ENTITY_SCHEMA_TOOL, args(json!({ "entity_name": 7 })))
            .await
            .expect("tool result");
        let (text, is_error) = rendered(&not_a_string);
        assert!(is_error);
        assert_eq!(
            text,
            "An error occurred: missing required string argument 'entity_name'"
        );
    }

    #[tokio::test]
    async fn query_tool_renders_remote_results_and_errors() {
        let mock = MockQuickbooks::start().await.expect("mock");
        let dir = tempfile::tempdir().expect("tempdir");
        let srv = server(Some(session_for(&mock).await), &dir);

        mock.push_api_response(200, json!({ "QueryResponse": { "Bill": [] } }));
        let ok = srv
            .call(QUERY_TOOL, args(json!({ "query": "select * from Bill" })))
            .await
            .expect("tool result");
        let (text, is_error) = rendered(&ok);
        assert!(!is_error);
        assert_eq!(text, r#"{"QueryResponse":{"Bill":[]}}"#);

        mock.push_api_text(400, "QueryParserError");
        let failed = srv
            .call(QUERY_TOOL, args(json!({ "query": "select nonsense" })))
            .await
            .expect("tool result");
        let (text, is_error) = rendered(&failed);
        assert!(is_error);
        assert_eq!(text, "Error: 400 QueryParserError");
    }

    #[tokio::test]
    async fn generated_tool_result_is_json_text() {
        let mock = MockQuickbooks::start().await.expect("mock");
        let dir = tempfile::tempdir().expect("tempdir");
        let srv = server(Some(session_for(&mock).await), &dir);
        mock.push_api_response(200, json!({ "Bill": { "Id": "7" } }));

        let result = srv
            .call("get_bill_billId", args(json!({ "billId": "7" })))
            .await
            .expect("tool result");
        let (text, is_error) = rendered(&result);
        assert!(!is_error);
        assert_eq!(text, r#"{"Bill":{"Id":"7"}}"#);
    }
}
