//! Authenticated, tenant-scoped access to the QuickBooks business API.
//!
//! The access/refresh token pair sits behind a `tokio` mutex together with a generation
//! counter. A call that observed generation *g* and received `401` only refreshes if the stored
//! generation is still *g*, so concurrent 401s trigger a single token exchange and every waiter
//! retries with the refreshed token.

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::safety::sanitize_reqwest_error;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use tokio::sync::Mutex;

const JSON_MEDIA_TYPE: &str = "application/json";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

struct TokenState {
    access_token: String,
    refresh_token: String,
    generation: u64,
}

pub struct RemoteSession {
    client: Client,
    client_id: String,
    client_secret: String,
    company_id: String,
    base_url: String,
    token_url: String,
    tokens: Mutex<TokenState>,
}

impl RemoteSession {
    /// Build the HTTP client and perform the initial token exchange.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for incomplete configuration and
    /// [`SessionError::Auth`] when the token endpoint does not answer `200`.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SessionError::Config(format!("failed to build HTTP client: {e}")))?;

        let session = Self {
            client,
            client_id: config.client_id,
            client_secret: config.client_secret,
            company_id: config.company_id,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_url: config.token_url,
            tokens: Mutex::new(TokenState {
                access_token: String::new(),
                refresh_token: config.refresh_token,
                generation: 0,
            }),
        };

        {
            let mut state = session.tokens.lock().await;
            session.exchange_token(&mut state).await?;
        }
        tracing::info!(
            company_id = %session.company_id,
            base_url = %session.base_url,
            "QuickBooks session established"
        );
        Ok(session)
    }

    #[must_use]
    pub fn company_id(&self) -> &str {
        &self.company_id
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn access_token(&self) -> String {
        self.tokens.lock().await.access_token.clone()
    }

    /// The refresh token currently held, after any rotation by the provider.
    pub async fn refresh_token(&self) -> String {
        self.tokens.lock().await.refresh_token.clone()
    }

    /// Call a tenant-scoped route and return the parsed JSON payload.
    ///
    /// `route` is relative to `/v3/company/<company id>`; a missing leading `/` is added. `body`
    /// is ignored for `GET`. A `401` triggers one token refresh and one retry.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Status`] for any non-200 answer that is not recovered by the
    /// retry, [`SessionError::Auth`] if the refresh itself fails, and transport/decode errors
    /// otherwise.
    pub async fn call_route(
        &self,
        method: &Method,
        route: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.route_url(route);
        let (token, generation) = self.current_token().await;

        let response = self.send(method, &url, query, body, &token).await?;
        match response.status() {
            StatusCode::OK => return decode_json(response).await,
            StatusCode::UNAUTHORIZED => {}
            _ => return Err(status_error(method, route, response).await),
        }

        let (token, _) = self.refresh_after(generation).await?;
        let response = self.send(method, &url, query, body, &token).await?;
        if response.status() == StatusCode::OK {
            decode_json(response).await
        } else {
            Err(status_error(method, route, response).await)
        }
    }

    /// Run a QuickBooks query-language statement against the `/query` endpoint.
    ///
    /// # Errors
    ///
    /// Same as [`Self::call_route`].
    pub async fn query(&self, statement: &str) -> Result<Value> {
        let params = [("query".to_string(), statement.to_string())];
        self.call_route(&Method::GET, "/query", &params, None).await
    }

    async fn current_token(&self) -> (String, u64) {
        let state = self.tokens.lock().await;
        (state.access_token.clone(), state.generation)
    }

    /// Refresh the token pair unless another caller already did so since `seen_generation`.
    async fn refresh_after(&self, seen_generation: u64) -> Result<(String, u64)> {
        let mut state = self.tokens.lock().await;
        if state.generation == seen_generation {
            tracing::info!("access token expired; refreshing");
            self.exchange_token(&mut state).await?;
            tracing::info!(generation = state.generation, "access token refreshed");
        } else {
            tracing::debug!(
                seen_generation,
                generation = state.generation,
                "access token already refreshed"
            );
        }
        Ok((state.access_token.clone(), state.generation))
    }

    async fn exchange_token(&self, state: &mut TokenState) -> Result<()> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", state.refresh_token.as_str()),
        ];
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "token exchange failed");
            return Err(SessionError::Auth {
                status: status.as_u16(),
                body,
            });
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| SessionError::Decode(sanitize_reqwest_error(&e)))?;
        state.access_token = tokens.access_token;
        if let Some(rotated) = tokens.refresh_token
            && rotated != state.refresh_token
        {
            tracing::info!("refresh token rotated by provider");
            state.refresh_token = rotated;
        }
        state.generation += 1;
        Ok(())
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        token: &str,
    ) -> Result<Response> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(token)
            .header(ACCEPT, JSON_MEDIA_TYPE);
        if !query.is_empty() {
            request = request.query(query);
        }
        if *method != Method::GET
            && let Some(body) = body
        {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    fn route_url(&self, route: &str) -> String {
        let route = if route.starts_with('/') {
            Cow::Borrowed(route)
        } else {
            Cow::Owned(format!("/{route}"))
        };
        format!("{}/v3/company/{}{route}", self.base_url, self.company_id)
    }
}

async fn decode_json(response: Response) -> Result<Value> {
    response
        .json()
        .await
        .map_err(|e| SessionError::Decode(sanitize_reqwest_error(&e)))
}

async fn status_error(method: &Method, route: &str, response: Response) -> SessionError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    tracing::error!(%method, route, status, "QuickBooks API call failed");
    SessionError::Status { status, body }
}
