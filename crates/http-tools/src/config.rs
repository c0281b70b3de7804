use crate::error::{Result, SessionError};
use std::fmt;
use std::time::Duration;

pub const PRODUCTION_BASE_URL: &str = "https://quickbooks.api.intuit.com";
pub const SANDBOX_BASE_URL: &str = "https://sandbox-quickbooks.api.intuit.com";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Which QuickBooks deployment the session talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiEnvironment {
    Production,
    #[default]
    Sandbox,
}

impl ApiEnvironment {
    /// Parse an environment name, falling back to sandbox for anything unrecognised.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" => Self::Production,
            "sandbox" | "" => Self::Sandbox,
            other => {
                tracing::warn!(
                    environment = other,
                    "unknown QuickBooks environment; using sandbox"
                );
                Self::Sandbox
            }
        }
    }

    #[must_use]
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_BASE_URL,
            Self::Sandbox => SANDBOX_BASE_URL,
        }
    }
}

/// Everything needed to open a [`crate::session::RemoteSession`].
#[derive(Clone)]
pub struct SessionConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub company_id: String,
    pub base_url: String,
    pub token_url: String,
    /// Per-request timeout; `None` disables it.
    pub request_timeout: Option<Duration>,
}

impl SessionConfig {
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
        company_id: impl Into<String>,
        environment: ApiEnvironment,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            company_id: company_id.into(),
            base_url: environment.base_url().to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Reject configurations with an empty credential or URL.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] naming the first missing field.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("client id", &self.client_id),
            ("client secret", &self.client_secret),
            ("refresh token", &self.refresh_token),
            ("company id", &self.company_id),
            ("base url", &self.base_url),
            ("token url", &self.token_url),
        ];
        for (label, value) in fields {
            if value.trim().is_empty() {
                return Err(SessionError::Config(format!("missing QuickBooks {label}")));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("company_id", &self.company_id)
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
