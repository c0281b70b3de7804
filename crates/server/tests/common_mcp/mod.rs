use anyhow::Context as _;
use futures::TryStreamExt as _;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt as _, BufReader, Lines};
use tokio_util::io::StreamReader;

const PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "Mcp-Session-Id";

/// JSON-RPC client for the server's streamable HTTP endpoint at `/mcp`.
///
/// Each request is a POST; rmcp answers either with a plain JSON body or with an event stream
/// that may open with an empty priming event and interleave notifications before the response.
pub struct McpHttpClient {
    http: reqwest::Client,
    endpoint: String,
    session_id: String,
}

impl McpHttpClient {
    /// Run the `initialize` handshake and send `notifications/initialized`.
    pub async fn connect(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::new();
        let endpoint = format!("{}/mcp", base_url.trim_end_matches('/'));

        let init = post(
            &http,
            &endpoint,
            None,
            &rpc_request(
                0,
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": "qbo-mcp-server-tests", "version": "0" }
                }),
            ),
        )
        .await?;
        let session_id = init
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .context("initialize response has no session id")?;
        let reply = response_for(init, 0).await?;
        anyhow::ensure!(reply.get("result").is_some(), "initialize failed: {reply}");

        let ack = post(
            &http,
            &endpoint,
            Some(&session_id),
            &json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
        )
        .await?;
        anyhow::ensure!(
            ack.status() == reqwest::StatusCode::ACCEPTED,
            "notifications/initialized answered {}",
            ack.status()
        );

        Ok(Self {
            http,
            endpoint,
            session_id,
        })
    }

    /// Send one request and wait for the message answering `id`.
    pub async fn request(
        &self,
        id: u64,
        method: &str,
        params: Value,
        timeout_dur: Duration,
    ) -> anyhow::Result<Value> {
        let resp = post(
            &self.http,
            &self.endpoint,
            Some(&self.session_id),
            &rpc_request(id, method, params),
        )
        .await?;
        tokio::time::timeout(timeout_dur, response_for(resp, id))
            .await
            .with_context(|| format!("no answer to {method} within {timeout_dur:?}"))?
    }
}

/// Text of the first content block of a `tools/call` response, plus its `isError` flag.
///
/// # Errors
///
/// Returns an error if the message carries no tool call result or no text content.
pub fn tool_call_text(msg: &Value) -> anyhow::Result<(String, bool)> {
    let result = msg.get("result").context("tools/call missing result")?;
    let text = result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("text"))
        .and_then(Value::as_str)
        .context("tools/call missing result.content[0].text")?;
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Ok((text.to_string(), is_error))
}

fn rpc_request(id: u64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

async fn post(
    http: &reqwest::Client,
    endpoint: &str,
    session_id: Option<&str>,
    body: &Value,
) -> anyhow::Result<reqwest::Response> {
    let mut req = http
        .post(endpoint)
        .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
        .json(body);
    if let Some(id) = session_id {
        req = req.header(SESSION_HEADER, id);
    }
    let resp = req.send().await.context("POST /mcp")?;
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("POST /mcp answered {status}: {text}");
    }
    Ok(resp)
}

/// The JSON-RPC message whose `id` equals `id`, from either response flavour.
async fn response_for(resp: reqwest::Response, id: u64) -> anyhow::Result<Value> {
    let is_event_stream = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream"));

    if !is_event_stream {
        let msg: Value = resp.json().await.context("decode JSON response")?;
        anyhow::ensure!(answers(&msg, id), "response does not answer id {id}: {msg}");
        return Ok(msg);
    }

    let body = resp.bytes_stream().map_err(std::io::Error::other);
    let mut events = EventStream {
        lines: BufReader::new(StreamReader::new(body)).lines(),
    };
    while let Some(data) = events.next_data().await? {
        let msg: Value = serde_json::from_str(&data)
            .with_context(|| format!("event data is not JSON: {data}"))?;
        if answers(&msg, id) {
            return Ok(msg);
        }
    }
    anyhow::bail!("event stream closed before the answer to id {id}")
}

fn answers(msg: &Value, id: u64) -> bool {
    msg.get("method").is_none() && msg.get("id") == Some(&json!(id))
}

struct EventStream<R> {
    lines: Lines<R>,
}

impl<R: tokio::io::AsyncBufRead + Unpin> EventStream<R> {
    /// Joined `data:` payload of the next event that carries any; priming events and
    /// comment-only events are skipped.
    async fn next_data(&mut self) -> anyhow::Result<Option<String>> {
        let mut data: Vec<String> = Vec::new();
        while let Some(line) = self.lines.next_line().await.context("read event stream")? {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                let joined = data.join("\n");
                data.clear();
                if !joined.trim().is_empty() {
                    return Ok(Some(joined));
                }
                continue;
            }
            if let Some(value) = line.strip_prefix("data:") {
                data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
        }
        let joined = data.join("\n");
        Ok((!joined.trim().is_empty()).then_some(joined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_stream_skips_priming_and_notifications() {
        let raw: &[u8] = b"id: 0\nretry: 3000\ndata:\n\n\
: keep-alive\n\n\
data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\",\"params\":{}}\n\n\
data: {\"jsonrpc\":\"2.0\",\"id\":4,\r\ndata: \"result\":{}}\r\n\r\n";
        let mut events = EventStream { lines: raw.lines() };

        let first = events.next_data().await.expect("read").expect("event");
        let notification: Value = serde_json::from_str(&first).expect("json");
        assert!(!answers(&notification, 4));

        let second = events.next_data().await.expect("read").expect("event");
        let reply: Value = serde_json::from_str(&second).expect("json");
        assert!(answers(&reply, 4));
        assert_eq!(reply["result"], json!({}));

        assert!(events.next_data().await.expect("read").is_none());
    }
}
