use anyhow::Context as _;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

pub use qbo_test_support::{KillOnDrop, MockQuickbooks};

pub const SERVER_BIN: &str = env!("CARGO_BIN_EXE_qbo-mcp-server");

const CREDENTIAL_VARS: [&str; 4] = [
    "QUICKBOOKS_CLIENT_ID",
    "QUICKBOOKS_CLIENT_SECRET",
    "QUICKBOOKS_REFRESH_TOKEN",
    "QUICKBOOKS_COMPANY_ID",
];

pub fn pick_unused_port() -> anyhow::Result<u16> {
    qbo_test_support::pick_unused_port()
}

pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    qbo_test_support::wait_http_ok(url, timeout_dur).await
}

/// Write a small QuickBooks-style schema and entity file into `dir`.
pub fn write_fixtures(dir: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
    let schema = dir.join("quickbooks_openapi_schema.json");
    std::fs::write(
        &schema,
        r##"{
  "openapi": "3.0.0",
  "paths": {
    "/v3/company/{realmId}/bill/{billId}": {
      "get": {
        "summary": "Read a bill",
        "parameters": [
          { "name": "realmId", "in": "path", "required": true, "schema": { "type": "string" } },
          { "name": "billId", "in": "path", "required": true, "schema": { "type": "string" }, "description": "Bill id" }
        ],
        "responses": { "200": { "description": "OK" } }
      }
    },
    "/v3/company/{realmId}/bill": {
      "post": {
        "parameters": [
          { "name": "realmId", "in": "path", "required": true, "schema": { "type": "string" } }
        ],
        "requestBody": {
          "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Bill" } } }
        },
        "responses": { "200": { "description": "Bill created" } }
      }
    }
  },
  "components": {
    "schemas": {
      "Bill": {
        "properties": {
          "VendorRef": { "description": "Vendor reference" },
          "Line": { "description": "Bill lines" }
        }
      }
    }
  }
}"##,
    )
    .context("write schema")?;

    let entities = dir.join("quickbooks_entity_schemas.json");
    std::fs::write(&entities, r#"{"Bill": {"Id": "string", "TotalAmt": "number"}}"#)
        .context("write entity schemas")?;

    Ok((schema, entities))
}

/// Base command with credentials pointed at the mock; `extra` is appended.
pub fn server_command(
    mock: &MockQuickbooks,
    schema: &Path,
    entities: &Path,
    extra: &[&str],
) -> Command {
    let mut cmd = Command::new(SERVER_BIN);
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd.arg("--client-id")
        .arg("client")
        .arg("--client-secret")
        .arg("secret")
        .arg("--refresh-token")
        .arg("initial-refresh")
        .arg("--company-id")
        .arg("123")
        .arg("--base-url")
        .arg(mock.base_url())
        .arg("--token-url")
        .arg(mock.token_url())
        .arg("--schema")
        .arg(schema)
        .arg("--entity-schemas")
        .arg(entities)
        .arg("--log-level")
        .arg("info")
        .args(extra)
        .stdin(Stdio::null());
    cmd
}

pub fn spawn_http_server(
    mock: &MockQuickbooks,
    schema: &Path,
    entities: &Path,
    port: u16,
    extra: &[&str],
) -> anyhow::Result<Child> {
    let bind = format!("127.0.0.1:{port}");
    let mut args = vec!["--transport", "streamable-http", "--bind", bind.as_str()];
    args.extend_from_slice(extra);
    server_command(mock, schema, entities, &args)
        .spawn()
        .context("spawn qbo-mcp-server")
}
