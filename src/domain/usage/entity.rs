//! Usage log entities and derived reporting types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::key::{UserKeyId, UserId};

/// Unique identifier for a usage log entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageLogId(String);

impl UsageLogId {
    /// Create an ID from an existing value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new unique ID
    pub fn generate() -> Self {
        Self(format!("usage-{}", uuid::Uuid::new_v4()))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UsageLogId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UsageLogId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UsageLogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row per billed request. Created once, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLogEntry {
    /// Unique ID
    id: UsageLogId,
    /// Owner of the key the usage was billed against
    pub user_id: UserId,
    /// The key record active at time of logging
    pub api_key_id: UserKeyId,
    /// Model identifier
    pub model: String,
    /// Prompt-side token count
    pub request_tokens: u32,
    /// Completion-side token count
    pub response_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
    /// Cost in micro-dollars
    pub cost_micros: i64,
    /// Endpoint the request hit, if known
    pub endpoint: Option<String>,
    /// Originating agent, if known
    pub agent: Option<String>,
    /// Request duration in milliseconds, if measured
    pub duration_ms: Option<u64>,
    /// Timestamp when the request was logged
    pub created_at: DateTime<Utc>,
}

impl UsageLogEntry {
    /// Create a new usage log entry
    pub fn new(user_id: UserId, api_key_id: UserKeyId, model: impl Into<String>) -> Self {
        Self {
            id: UsageLogId::generate(),
            user_id,
            api_key_id,
            model: model.into(),
            request_tokens: 0,
            response_tokens: 0,
            total_tokens: 0,
            cost_micros: 0,
            endpoint: None,
            agent: None,
            duration_ms: None,
            created_at: Utc::now(),
        }
    }

    /// Set token counts
    pub fn with_tokens(mut self, request: u32, response: u32) -> Self {
        self.request_tokens = request;
        self.response_tokens = response;
        self.total_tokens = request + response;
        self
    }

    /// Set the cost in micro-dollars
    pub fn with_cost_micros(mut self, cost: i64) -> Self {
        self.cost_micros = cost;
        self
    }

    /// Set the cost in dollars
    pub fn with_cost_usd(mut self, cost_usd: f64) -> Self {
        self.cost_micros = (cost_usd * 1_000_000.0) as i64;
        self
    }

    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the originating agent
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Set the request duration
    pub fn with_duration_ms(mut self, duration: u64) -> Self {
        self.duration_ms = Some(duration);
        self
    }

    /// Get the entry ID
    pub fn id(&self) -> &UsageLogId {
        &self.id
    }

    /// Cost in USD
    pub fn cost_usd(&self) -> f64 {
        self.cost_micros as f64 / 1_000_000.0
    }
}

/// Severity of a key's proximity to its monthly limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitSeverity {
    /// Below all thresholds
    None,
    /// At or above 80% of the limit
    Warning,
    /// At or above 95% of the limit
    Critical,
}

impl LimitSeverity {
    /// Classify a usage percentage against the alert thresholds
    pub fn classify(usage_percent: f64) -> Self {
        if usage_percent >= 95.0 {
            Self::Critical
        } else if usage_percent >= 80.0 {
            Self::Warning
        } else {
            Self::None
        }
    }
}

impl std::fmt::Display for LimitSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Result of an on-demand limit check for one user
#[derive(Debug, Clone, Serialize)]
pub struct LimitCheck {
    pub user_id: UserId,
    pub api_key_id: UserKeyId,
    /// False once the limit has been reached
    pub within_limit: bool,
    /// Percentage of the limit consumed (None = unlimited)
    pub usage_percent: Option<f64>,
    pub severity: LimitSeverity,
    pub current_usage_micros: i64,
    pub monthly_limit_micros: Option<i64>,
}

/// Per-user usage summary for one billing cycle
#[derive(Debug, Clone, Serialize)]
pub struct MonthlySummary {
    pub user_id: UserId,
    /// First day of the summarized cycle
    pub cycle_start: NaiveDate,
    pub request_count: u64,
    pub total_tokens: u64,
    pub total_cost_micros: i64,
    /// Cost breakdown by model
    pub by_model: Vec<ModelUsage>,
}

impl MonthlySummary {
    pub fn total_cost_usd(&self) -> f64 {
        self.total_cost_micros as f64 / 1_000_000.0
    }
}

/// Per-model slice of a monthly summary
#[derive(Debug, Clone, Serialize)]
pub struct ModelUsage {
    pub model: String,
    pub request_count: u64,
    pub total_tokens: u64,
    pub cost_micros: i64,
}

/// System-wide aggregate statistics over a trailing time window
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemUsageStats {
    /// Start of the window the stats cover
    pub since: Option<DateTime<Utc>>,
    pub request_count: u64,
    pub total_tokens: u64,
    pub total_cost_micros: i64,
    pub avg_tokens_per_request: f64,
    pub avg_cost_micros_per_request: f64,
}

impl SystemUsageStats {
    pub fn total_cost_usd(&self) -> f64 {
        self.total_cost_micros as f64 / 1_000_000.0
    }
}

/// One row of the top-N usage ranking
#[derive(Debug, Clone, Serialize)]
pub struct TopUsageEntry {
    pub user_id: UserId,
    pub api_key_id: UserKeyId,
    pub current_usage_micros: i64,
    pub monthly_limit_micros: Option<i64>,
    pub usage_percent: Option<f64>,
}
