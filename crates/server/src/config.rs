//! Command-line and environment configuration.
//!
//! Every flag has an environment fallback where it makes sense; `.env` is loaded before parsing
//! so the usual `QUICKBOOKS_*` variables work unchanged.

use crate::error::{Result, ServerError};
use clap::{Parser, ValueEnum};
use qbo_http_tools::SessionConfig;
use qbo_http_tools::config::ApiEnvironment;
use qbo_openapi_tools::config::{HashPolicy, SchemaSourceConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "qbo-mcp-server",
    version,
    about = "Expose the QuickBooks Online API as MCP tools generated from its OpenAPI schema"
)]
pub struct Cli {
    /// OAuth2 client id
    #[arg(long, env = "QUICKBOOKS_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// OAuth2 client secret
    #[arg(long, env = "QUICKBOOKS_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Long-lived refresh token used to obtain access tokens
    #[arg(long, env = "QUICKBOOKS_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Company (realm) id every business route is scoped to
    #[arg(long, env = "QUICKBOOKS_COMPANY_ID")]
    pub company_id: Option<String>,

    /// `production` or `sandbox`; unknown values fall back to sandbox
    #[arg(long, env = "QUICKBOOKS_ENV", default_value = "sandbox")]
    pub environment: String,

    /// Override the business API base URL chosen by `--environment`
    #[arg(long, env = "QUICKBOOKS_BASE_URL")]
    pub base_url: Option<String>,

    /// Override the OAuth2 token endpoint
    #[arg(long, env = "QUICKBOOKS_TOKEN_URL")]
    pub token_url: Option<String>,

    /// OpenAPI schema document (JSON or YAML)
    #[arg(
        long,
        env = "QUICKBOOKS_OPENAPI_SCHEMA",
        default_value = "quickbooks_openapi_schema.json"
    )]
    pub schema: PathBuf,

    /// Expected schema hash, `sha256:<hex>`
    #[arg(long, env = "QUICKBOOKS_OPENAPI_SCHEMA_SHA256")]
    pub schema_sha256: Option<String>,

    #[arg(long, value_enum, default_value_t = HashPolicyArg::Warn)]
    pub schema_hash_policy: HashPolicyArg,

    /// Entity field schemas served by `get_quickbooks_entity_schema`
    #[arg(
        long,
        env = "QUICKBOOKS_ENTITY_SCHEMAS",
        default_value = "quickbooks_entity_schemas.json"
    )]
    pub entity_schemas: PathBuf,

    /// Per-request timeout for remote calls; 0 disables it
    #[arg(long, env = "QUICKBOOKS_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    #[arg(long, value_enum, default_value_t = TransportKind::Stdio)]
    pub transport: TransportKind,

    /// Listen address for the streamable HTTP transport
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Log filter (`RUST_LOG` syntax)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Keep serving when credentials are missing or the initial token exchange fails.
    /// Generated tools then answer with a "session not initialized" error.
    #[arg(long)]
    pub allow_unauthenticated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    Stdio,
    StreamableHttp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HashPolicyArg {
    Warn,
    Fail,
    Ignore,
}

impl From<HashPolicyArg> for HashPolicy {
    fn from(value: HashPolicyArg) -> Self {
        match value {
            HashPolicyArg::Warn => HashPolicy::Warn,
            HashPolicyArg::Fail => HashPolicy::Fail,
            HashPolicyArg::Ignore => HashPolicy::Ignore,
        }
    }
}

impl Cli {
    #[must_use]
    pub fn schema_source(&self) -> SchemaSourceConfig {
        let mut source = SchemaSourceConfig::new(self.schema.display().to_string());
        source.sha256.clone_from(&self.schema_sha256);
        source.hash_policy = self.schema_hash_policy.into();
        source
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Assemble the remote session configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] listing every missing credential.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let required = [
            ("--client-id / QUICKBOOKS_CLIENT_ID", &self.client_id),
            ("--client-secret / QUICKBOOKS_CLIENT_SECRET", &self.client_secret),
            ("--refresh-token / QUICKBOOKS_REFRESH_TOKEN", &self.refresh_token),
            ("--company-id / QUICKBOOKS_COMPANY_ID", &self.company_id),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
            .map(|(label, _)| *label)
            .collect();
        if !missing.is_empty() {
            return Err(ServerError::Config(format!(
                "missing QuickBooks credentials: {}",
                missing.join(", ")
            )));
        }

        let mut config = SessionConfig::new(
            self.client_id.clone().unwrap_or_default(),
            self.client_secret.clone().unwrap_or_default(),
            self.refresh_token.clone().unwrap_or_default(),
            self.company_id.clone().unwrap_or_default(),
            ApiEnvironment::parse_lenient(&self.environment),
        );
        if let Some(base_url) = &self.base_url {
            config.base_url.clone_from(base_url);
        }
        if let Some(token_url) = &self.token_url {
            config.token_url.clone_from(token_url);
        }
        config.request_timeout = self.request_timeout();
        Ok(config)
    }
}
