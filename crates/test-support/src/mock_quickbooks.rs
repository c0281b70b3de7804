//! In-process stand-in for the QuickBooks business API and the Intuit token endpoint.
//!
//! Responses are scripted per endpoint (FIFO); once a script runs dry the mock answers with
//! defaults: the token endpoint issues `access-<n>` / `refresh-<n>` for the n-th exchange and the
//! business API echoes the request as JSON. Every request is recorded.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const TOKEN_PATH: &str = "/oauth2/v1/tokens/bearer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Raw request body; `None` when empty.
    pub body: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTokenRequest {
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub grant_type: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
struct ScriptedResponse {
    status: u16,
    content_type: &'static str,
    body: String,
}

impl ScriptedResponse {
    fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }
}

impl IntoResponse for ScriptedResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}

#[derive(Default)]
struct MockState {
    api_script: Mutex<VecDeque<ScriptedResponse>>,
    token_script: Mutex<VecDeque<ScriptedResponse>>,
    api_requests: Mutex<Vec<RecordedRequest>>,
    token_requests: Mutex<Vec<RecordedTokenRequest>>,
}

pub struct MockQuickbooks {
    base_url: String,
    state: Arc<MockState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockQuickbooks {
    /// Bind an ephemeral localhost port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route(TOKEN_PATH, post(token_handler))
            .fallback(api_handler)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
            shutdown: Some(shutdown_tx),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}{TOKEN_PATH}", self.base_url)
    }

    /// Queue a JSON response for the next business API request.
    pub fn push_api_response(&self, status: u16, body: Value) {
        self.state
            .api_script
            .lock()
            .push_back(ScriptedResponse::json(status, &body));
    }

    /// Queue a plain-text response for the next business API request.
    pub fn push_api_text(&self, status: u16, body: &str) {
        self.state.api_script.lock().push_back(ScriptedResponse {
            status,
            content_type: "text/plain",
            body: body.to_string(),
        });
    }

    /// Queue a JSON response for the next token exchange.
    pub fn push_token_response(&self, status: u16, body: Value) {
        self.state
            .token_script
            .lock()
            .push_back(ScriptedResponse::json(status, &body));
    }

    #[must_use]
    pub fn api_requests(&self) -> Vec<RecordedRequest> {
        self.state.api_requests.lock().clone()
    }

    #[must_use]
    pub fn token_requests(&self) -> Vec<RecordedTokenRequest> {
        self.state.token_requests.lock().clone()
    }
}

impl Drop for MockQuickbooks {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn token_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let form: HashMap<String, String> = url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect();

    let exchange_no = {
        let mut requests = state.token_requests.lock();
        requests.push(RecordedTokenRequest {
            authorization: header_text(&headers, header::AUTHORIZATION),
            accept: header_text(&headers, header::ACCEPT),
            grant_type: form.get("grant_type").cloned(),
            refresh_token: form.get("refresh_token").cloned(),
        });
        requests.len()
    };

    let scripted = state.token_script.lock().pop_front();
    scripted
        .unwrap_or_else(|| {
            ScriptedResponse::json(
                200,
                &json!({
                    "access_token": format!("access-{exchange_no}"),
                    "refresh_token": format!("refresh-{exchange_no}"),
                    "token_type": "bearer",
                    "expires_in": 3600
                }),
            )
        })
        .into_response()
}

async fn api_handler(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = (!body.is_empty()).then(|| String::from_utf8_lossy(&body).into_owned());
    let recorded = RecordedRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        body,
        authorization: header_text(&headers, header::AUTHORIZATION),
    };
    state.api_requests.lock().push(recorded.clone());

    let scripted = state.api_script.lock().pop_front();
    scripted
        .unwrap_or_else(|| {
            ScriptedResponse::json(
                200,
                &json!({
                    "method": recorded.method,
                    "path": recorded.path,
                    "query": recorded.query,
                }),
            )
        })
        .into_response()
}
