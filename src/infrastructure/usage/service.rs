//! Usage logging and limit queries

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::domain::key::{KeyStore, UserKey, UserKeyId, UserId};
use crate::domain::usage::{
    current_cycle_start, LimitCheck, LimitSeverity, MonthlySummary, SystemUsageStats,
    TopUsageEntry, UsageLogEntry,
};
use crate::domain::DomainError;

/// Parameters for logging one billed request
#[derive(Debug, Clone)]
pub struct LogUsageRequest {
    pub user_id: String,
    /// Target key record; when absent the user's active key is used
    pub api_key_id: Option<UserKeyId>,
    pub model: String,
    pub request_tokens: u32,
    pub response_tokens: u32,
    pub cost_micros: i64,
    pub endpoint: Option<String>,
    pub agent: Option<String>,
    pub duration_ms: Option<u64>,
}

impl LogUsageRequest {
    pub fn new(user_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            api_key_id: None,
            model: model.into(),
            request_tokens: 0,
            response_tokens: 0,
            cost_micros: 0,
            endpoint: None,
            agent: None,
            duration_ms: None,
        }
    }

    pub fn with_key(mut self, id: UserKeyId) -> Self {
        self.api_key_id = Some(id);
        self
    }

    pub fn with_tokens(mut self, request: u32, response: u32) -> Self {
        self.request_tokens = request;
        self.response_tokens = response;
        self
    }

    pub fn with_cost_micros(mut self, cost: i64) -> Self {
        self.cost_micros = cost;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_duration_ms(mut self, duration: u64) -> Self {
        self.duration_ms = Some(duration);
        self
    }
}

/// Service answering usage and limit questions against the key store
#[derive(Debug)]
pub struct UsageService<S: KeyStore> {
    store: Arc<S>,
}

impl<S: KeyStore> UsageService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Log one billed request and return the updated key record.
    ///
    /// The target key must belong to the user. Late usage against a rotated
    /// (now inactive) key is accepted; the cost still lands on the record
    /// that served the request.
    pub async fn log_usage(&self, request: LogUsageRequest) -> Result<UserKey, DomainError> {
        let user_id = UserId::new(&request.user_id)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        if request.model.is_empty() {
            return Err(DomainError::validation("Model must not be empty"));
        }
        if request.cost_micros < 0 {
            return Err(DomainError::validation("Cost must not be negative"));
        }

        let key = match request.api_key_id {
            Some(ref id) => self
                .store
                .get_key(id)
                .await?
                .ok_or_else(|| DomainError::not_found(format!("Key '{id}' not found")))?,
            None => self
                .store
                .find_active_for_user(&user_id)
                .await?
                .ok_or_else(|| {
                    DomainError::not_found(format!("No active key for user '{user_id}'"))
                })?,
        };

        if key.user_id() != &user_id {
            return Err(DomainError::validation(format!(
                "Key '{}' does not belong to user '{}'",
                key.id(),
                user_id
            )));
        }

        if !key.status().is_usable() {
            debug!(
                key_id = %key.id(),
                status = %key.status(),
                "Logging late usage against a non-active key"
            );
        }

        let entry = UsageLogEntry::new(user_id, key.id().clone(), request.model)
            .with_tokens(request.request_tokens, request.response_tokens)
            .with_cost_micros(request.cost_micros);
        let entry = apply_optional(entry, request.endpoint, UsageLogEntry::with_endpoint);
        let entry = apply_optional(entry, request.agent, UsageLogEntry::with_agent);
        let entry = apply_optional(entry, request.duration_ms, UsageLogEntry::with_duration_ms);

        let updated = self.store.log_usage(entry).await?;

        if !updated.is_within_limit() {
            warn!(
                user_id = %updated.user_id(),
                key_id = %updated.id(),
                usage_micros = updated.current_usage_micros(),
                limit_micros = ?updated.monthly_limit_micros(),
                "Key exceeded its monthly limit"
            );
        }

        Ok(updated)
    }

    /// Check a user's active key against its monthly limit
    pub async fn check_limit(&self, user_id: &UserId) -> Result<LimitCheck, DomainError> {
        let key = self
            .store
            .find_active_for_user(user_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("No active key for user '{user_id}'"))
            })?;

        Ok(limit_check_for(&key))
    }

    /// Per-user usage summary; defaults to the current billing cycle
    pub async fn usage_summary(
        &self,
        user_id: &UserId,
        cycle_start: Option<NaiveDate>,
    ) -> Result<MonthlySummary, DomainError> {
        let cycle_start = cycle_start.unwrap_or_else(|| current_cycle_start(Utc::now()));
        self.store.monthly_summary(user_id, cycle_start).await
    }

    pub async fn list_active_keys(&self) -> Result<Vec<UserKey>, DomainError> {
        self.store.list_active().await
    }

    /// Zero usage on every record still carrying a previous cycle's counter.
    /// Idempotent within a cycle.
    pub async fn reset_all_usage(&self) -> Result<usize, DomainError> {
        let cycle_start = current_cycle_start(Utc::now());
        let affected = self.store.reset_usage_before(cycle_start).await?;

        if affected > 0 {
            info!(affected, %cycle_start, "Monthly usage reset");
        }

        Ok(affected)
    }

    pub async fn system_stats(&self, since: DateTime<Utc>) -> Result<SystemUsageStats, DomainError> {
        self.store.system_stats(since).await
    }

    pub async fn top_usage(&self, n: usize) -> Result<Vec<TopUsageEntry>, DomainError> {
        self.store.top_usage(n).await
    }
}

/// Build a limit check from a key record
pub(crate) fn limit_check_for(key: &UserKey) -> LimitCheck {
    let usage_percent = key.usage_percent();
    LimitCheck {
        user_id: key.user_id().clone(),
        api_key_id: key.id().clone(),
        within_limit: key.is_within_limit(),
        usage_percent,
        severity: usage_percent.map_or(LimitSeverity::None, LimitSeverity::classify),
        current_usage_micros: key.current_usage_micros(),
        monthly_limit_micros: key.monthly_limit_micros(),
    }
}

fn apply_optional<T, V>(entry: T, value: Option<V>, f: impl FnOnce(T, V) -> T) -> T {
    match value {
        Some(v) => f(entry, v),
        None => entry,
    }
}
