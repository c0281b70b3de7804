//! Startup and transports.

use crate::config::{Cli, TransportKind};
use crate::entity_schema::EntitySchemaFile;
use crate::error::{Result, ServerError};
use crate::handler::QuickbooksServer;
use crate::registrar::ToolRegistry;
use axum::Json;
use axum::Router;
use axum::routing::get;
use qbo_http_tools::RemoteSession;
use qbo_openapi_tools::load_descriptors;
use rmcp::ServiceExt as _;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Load the schema, open the remote session and register every tool.
///
/// # Errors
///
/// Schema load/extraction failures and name conflicts are always fatal. Session failures are
/// fatal unless `--allow-unauthenticated` is set.
pub async fn build_server(cli: &Cli) -> Result<QuickbooksServer> {
    let source = cli.schema_source();
    let descriptors = load_descriptors(&source)?;
    tracing::info!(
        path = %source.path,
        operations = descriptors.len(),
        "loaded QuickBooks OpenAPI schema"
    );

    let session = connect_session(cli).await?;
    let registry = ToolRegistry::build(descriptors, session)?;
    let entity_schemas = EntitySchemaFile::new(cli.entity_schemas.clone());
    match registry.session() {
        Some(session) => tracing::info!(
            company_id = %session.company_id(),
            base_url = %session.base_url(),
            entity_schemas = %entity_schemas.path().display(),
            tools = registry.len(),
            "QuickBooks server ready"
        ),
        None => tracing::warn!(
            entity_schemas = %entity_schemas.path().display(),
            tools = registry.len(),
            "QuickBooks server ready without a session"
        ),
    }
    Ok(QuickbooksServer::new(registry, entity_schemas))
}

async fn connect_session(cli: &Cli) -> Result<Option<Arc<RemoteSession>>> {
    let attempt = async {
        let config = cli.session_config()?;
        Ok::<_, ServerError>(RemoteSession::connect(config).await?)
    }
    .await;

    match attempt {
        Ok(session) => Ok(Some(Arc::new(session))),
        Err(e) if cli.allow_unauthenticated => {
            tracing::error!(
                error = %e,
                "failed to initialize QuickBooks session; generated tools will report it"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Build the server and serve it on the configured transport until shutdown.
///
/// # Errors
///
/// See [`build_server`]; transport failures are reported as [`ServerError::Startup`].
pub async fn run(cli: Cli) -> Result<()> {
    let server = build_server(&cli).await?;
    match cli.transport {
        TransportKind::Stdio => serve_stdio(server).await,
        TransportKind::StreamableHttp => serve_http(server, cli.bind).await,
    }
}

/// Serve MCP over stdin/stdout.
///
/// # Errors
///
/// Returns [`ServerError::Startup`] if the MCP handshake or the service task fails.
pub async fn serve_stdio(server: QuickbooksServer) -> Result<()> {
    tracing::info!(tools = server.tools().len(), "serving MCP over stdio");
    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| ServerError::Startup(format!("stdio transport: {e}")))?;
    service
        .waiting()
        .await
        .map_err(|e| ServerError::Startup(format!("stdio service task: {e}")))?;
    Ok(())
}

/// Serve MCP over streamable HTTP at `/mcp`, plus a `/health` check.
///
/// # Errors
///
/// Returns an IO error if the listener cannot be bound or the server fails.
pub async fn serve_http(server: QuickbooksServer, bind: SocketAddr) -> Result<()> {
    let tool_count = server.tools().len();
    let mcp = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    let app = Router::new()
        .route(
            "/health",
            get(move || async move { Json(json!({ "status": "ok", "tools": tool_count })) }),
        )
        .nest_service("/mcp", mcp);

    let listener = TcpListener::bind(bind).await?;
    tracing::info!(%bind, tools = tool_count, "serving MCP over streamable HTTP at /mcp");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
