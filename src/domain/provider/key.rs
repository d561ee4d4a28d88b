//! Provider key types
//!
//! The upstream provisioning service owns the credential objects; only the
//! opaque id is retained locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier issued by the key provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderKeyId(String);

impl ProviderKeyId {
    /// Create an ID from an existing value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ProviderKeyId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProviderKeyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ProviderKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A freshly provisioned key as returned by the provider.
///
/// The `key` field carries the secret material. It is returned exactly once
/// at creation time and never persisted or retrievable again.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderKey {
    pub id: ProviderKeyId,
    pub name: String,
    /// Secret key material - surfaced once, never stored
    pub key: String,
    pub created_at: DateTime<Utc>,
}

/// Key metadata as returned by get/list operations (no secret)
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderKeySummary {
    pub id: ProviderKeyId,
    pub name: String,
    #[serde(default)]
    pub limit_usd: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for provisioning a new key
#[derive(Debug, Clone, Serialize)]
pub struct CreateProviderKey {
    pub name: String,
    /// Monthly spend limit in USD forwarded to the provider, if limited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CreateProviderKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            limit_usd: None,
            label: None,
        }
    }

    pub fn with_limit_usd(mut self, limit: f64) -> Self {
        self.limit_usd = Some(limit);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Operation applied to a batch of provider keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOperation {
    Delete,
    Disable,
}

impl std::fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delete => write!(f, "delete"),
            Self::Disable => write!(f, "disable"),
        }
    }
}

/// Per-id outcome of a batch operation.
///
/// Partial failure is normal, not exceptional - callers inspect each result
/// rather than treating the batch as atomic.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResult {
    pub id: ProviderKeyId,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}
