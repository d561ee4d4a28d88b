//! User key record entity and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{validate_user_id, KeyValidationError};
use crate::domain::provider::ProviderKeyId;
use crate::domain::usage::current_cycle_start;

/// Identifier of a locally persisted key record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserKeyId(String);

impl UserKeyId {
    /// Create an ID from an existing value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new unique ID
    pub fn generate() -> Self {
        Self(format!("key-{}", uuid::Uuid::new_v4()))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserKeyId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserKeyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a user in the external user system - opaque here
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a new UserId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, KeyValidationError> {
        let id = id.into();
        validate_user_id(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = KeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a key record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    /// Key is active and accrues usage
    #[default]
    Active,
    /// Key has been deactivated (terminal short of external purge)
    Inactive,
    /// Key is temporarily suspended
    Suspended,
    /// Key has expired
    Expired,
}

impl KeyStatus {
    /// Check if the key is usable
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
            Self::Expired => "expired",
        }
    }

    /// Parse a status from its stored representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "suspended" => Some(Self::Suspended),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One logical record per user's current-or-past key.
///
/// Only the opaque provider key id is retained; the secret key material lives
/// with the provider and is surfaced exactly once at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserKey {
    /// Unique identifier for the record
    id: UserKeyId,
    /// Owner in the external user system
    user_id: UserId,
    /// Opaque identifier issued by the key provider
    provider_key_id: ProviderKeyId,
    /// Display name for the key
    name: String,
    /// Display label
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    /// Monthly spend limit in micro-dollars (None = unlimited)
    #[serde(skip_serializing_if = "Option::is_none")]
    monthly_limit_micros: Option<i64>,
    /// Usage accrued in the current cycle, in micro-dollars
    current_usage_micros: i64,
    /// First day of the billing cycle this usage applies to
    usage_reset_date: NaiveDate,
    /// Current status of the key
    status: KeyStatus,
    /// Creation timestamp
    created_at: DateTime<Utc>,
    /// Last update timestamp
    updated_at: DateTime<Utc>,
    /// Last time usage was logged against the key
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
}

impl UserKey {
    /// Create a new active key record for the current billing cycle
    pub fn new(
        user_id: UserId,
        provider_key_id: ProviderKeyId,
        name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: UserKeyId::generate(),
            user_id,
            provider_key_id,
            name: name.into(),
            label: None,
            monthly_limit_micros: None,
            current_usage_micros: 0,
            usage_reset_date: current_cycle_start(now),
            status: KeyStatus::Active,
            created_at: now,
            updated_at: now,
            last_used_at: None,
        }
    }

    /// Set the display label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the monthly limit in micro-dollars (None = unlimited)
    pub fn with_monthly_limit_micros(mut self, limit: Option<i64>) -> Self {
        self.monthly_limit_micros = limit;
        self
    }

    // Getters

    pub fn id(&self) -> &UserKeyId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn provider_key_id(&self) -> &ProviderKeyId {
        &self.provider_key_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn monthly_limit_micros(&self) -> Option<i64> {
        self.monthly_limit_micros
    }

    /// Monthly limit in USD, if limited
    pub fn monthly_limit_usd(&self) -> Option<f64> {
        self.monthly_limit_micros.map(|m| m as f64 / 1_000_000.0)
    }

    pub fn current_usage_micros(&self) -> i64 {
        self.current_usage_micros
    }

    /// Current cycle usage in USD
    pub fn current_usage_usd(&self) -> f64 {
        self.current_usage_micros as f64 / 1_000_000.0
    }

    pub fn usage_reset_date(&self) -> NaiveDate {
        self.usage_reset_date
    }

    pub fn status(&self) -> KeyStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    /// Fraction of the monthly limit consumed, as a percentage.
    ///
    /// None for unlimited keys - they have no meaningful percentage.
    pub fn usage_percent(&self) -> Option<f64> {
        self.monthly_limit_micros.and_then(|limit| {
            if limit <= 0 {
                return None;
            }
            Some(self.current_usage_micros as f64 / limit as f64 * 100.0)
        })
    }

    /// Whether the record may still accrue usage under its limit.
    ///
    /// Unlimited keys are always within limit; reaching the limit exactly
    /// counts as exceeded.
    pub fn is_within_limit(&self) -> bool {
        match self.monthly_limit_micros {
            Some(limit) => self.current_usage_micros < limit,
            None => true,
        }
    }

    // Mutators

    /// Record billed usage against the key
    pub fn apply_usage(&mut self, cost_micros: i64) {
        self.current_usage_micros += cost_micros;
        self.last_used_at = Some(Utc::now());
        self.touch();
    }

    /// Deactivate the key. Idempotent: deactivating an inactive key is a no-op.
    pub fn deactivate(&mut self) {
        if self.status != KeyStatus::Inactive {
            self.status = KeyStatus::Inactive;
            self.touch();
        }
    }

    /// Suspend the key
    pub fn suspend(&mut self) {
        self.status = KeyStatus::Suspended;
        self.touch();
    }

    /// Zero usage and advance the record into the given cycle
    pub fn reset_usage(&mut self, cycle_start: NaiveDate) {
        self.current_usage_micros = 0;
        self.usage_reset_date = cycle_start;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Rebuild a record from stored fields, bypassing the constructor defaults
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: UserKeyId,
        user_id: UserId,
        provider_key_id: ProviderKeyId,
        name: String,
        label: Option<String>,
        monthly_limit_micros: Option<i64>,
        current_usage_micros: i64,
        usage_reset_date: NaiveDate,
        status: KeyStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        last_used_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            user_id,
            provider_key_id,
            name,
            label,
            monthly_limit_micros,
            current_usage_micros,
            usage_reset_date,
            status,
            created_at,
            updated_at,
            last_used_at,
        }
    }
}
