use serde::{Deserialize, Serialize};

/// Where the schema document lives and how it is verified.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSourceConfig {
    /// Path to the schema document (JSON or YAML).
    pub path: String,

    /// Optional expected hash, formatted as `sha256:<hex>`.
    #[serde(default)]
    pub sha256: Option<String>,

    /// What to do when `sha256` is set and does not match.
    #[serde(default)]
    pub hash_policy: HashPolicy,
}

impl SchemaSourceConfig {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sha256: None,
            hash_policy: HashPolicy::default(),
        }
    }
}

/// Hash verification policy.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HashPolicy {
    /// Log warning if hash doesn't match.
    #[default]
    Warn,
    /// Fail startup if hash doesn't match.
    Fail,
    /// Ignore hash verification.
    Ignore,
}
