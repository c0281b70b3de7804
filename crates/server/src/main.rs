use anyhow::Context as _;
use clap::Parser as _;
use qbo_mcp_server::Cli;
use qbo_mcp_server::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format)?;

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "failed to load .env"),
    }

    qbo_mcp_server::run(cli)
        .await
        .context("qbo-mcp-server failed")
}
