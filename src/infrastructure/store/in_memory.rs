//! In-memory key store
//!
//! Backs tests and local development. A single lock over all state gives the
//! same atomicity the Postgres store gets from transactions.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::key::{KeyStatus, KeyStore, UserKey, UserKeyId, UserId};
use crate::domain::usage::{
    ModelUsage, MonthlySummary, SystemUsageStats, TopUsageEntry, UsageLogEntry,
};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct Inner {
    keys: HashMap<UserKeyId, UserKey>,
    logs: Vec<UsageLogEntry>,
}

/// Key store backed by process memory
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    inner: RwLock<Inner>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, active or not
    pub async fn key_count(&self) -> usize {
        self.inner.read().await.keys.len()
    }

    /// Number of stored usage log entries
    pub async fn log_count(&self) -> usize {
        self.inner.read().await.logs.len()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn insert_key(&self, key: UserKey) -> Result<UserKey, DomainError> {
        let mut inner = self.inner.write().await;

        if key.status() == KeyStatus::Active {
            let existing = inner
                .keys
                .values()
                .any(|k| k.user_id() == key.user_id() && k.status() == KeyStatus::Active);
            if existing {
                return Err(DomainError::conflict(format!(
                    "User '{}' already has an active key",
                    key.user_id()
                )));
            }
        }

        inner.keys.insert(key.id().clone(), key.clone());
        Ok(key)
    }

    async fn get_key(&self, id: &UserKeyId) -> Result<Option<UserKey>, DomainError> {
        Ok(self.inner.read().await.keys.get(id).cloned())
    }

    async fn find_active_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserKey>, DomainError> {
        let inner = self.inner.read().await;
        Ok(inner
            .keys
            .values()
            .find(|k| k.user_id() == user_id && k.status() == KeyStatus::Active)
            .cloned())
    }

    async fn deactivate_active(&self, user_id: &UserId) -> Result<Option<UserKey>, DomainError> {
        let mut inner = self.inner.write().await;

        let id = inner
            .keys
            .values()
            .find(|k| k.user_id() == user_id && k.status() == KeyStatus::Active)
            .map(|k| k.id().clone());

        match id {
            Some(id) => {
                let key = inner
                    .keys
                    .get_mut(&id)
                    .ok_or_else(|| DomainError::storage("Record vanished during deactivation"))?;
                key.deactivate();
                Ok(Some(key.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_key(&self, key: &UserKey) -> Result<UserKey, DomainError> {
        let mut inner = self.inner.write().await;

        if !inner.keys.contains_key(key.id()) {
            return Err(DomainError::not_found(format!(
                "Key '{}' not found",
                key.id()
            )));
        }

        inner.keys.insert(key.id().clone(), key.clone());
        Ok(key.clone())
    }

    async fn list_active(&self) -> Result<Vec<UserKey>, DomainError> {
        let inner = self.inner.read().await;
        let mut keys: Vec<UserKey> = inner
            .keys
            .values()
            .filter(|k| k.status() == KeyStatus::Active)
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.created_at().cmp(&b.created_at()));
        Ok(keys)
    }

    async fn log_usage(&self, entry: UsageLogEntry) -> Result<UserKey, DomainError> {
        let mut inner = self.inner.write().await;

        let key = inner.keys.get_mut(&entry.api_key_id).ok_or_else(|| {
            DomainError::not_found(format!("Key '{}' not found", entry.api_key_id))
        })?;
        key.apply_usage(entry.cost_micros);
        let updated = key.clone();

        inner.logs.push(entry);
        Ok(updated)
    }

    async fn reset_usage_before(&self, cycle_start: NaiveDate) -> Result<usize, DomainError> {
        let mut inner = self.inner.write().await;

        let mut affected = 0;
        for key in inner.keys.values_mut() {
            if key.usage_reset_date() < cycle_start {
                key.reset_usage(cycle_start);
                affected += 1;
            }
        }

        Ok(affected)
    }

    async fn monthly_summary(
        &self,
        user_id: &UserId,
        cycle_start: NaiveDate,
    ) -> Result<MonthlySummary, DomainError> {
        let inner = self.inner.read().await;

        if !inner.keys.values().any(|k| k.user_id() == user_id) {
            return Err(DomainError::not_found(format!(
                "No key records for user '{user_id}'"
            )));
        }

        let mut by_model: HashMap<String, ModelUsage> = HashMap::new();
        let mut request_count = 0u64;
        let mut total_tokens = 0u64;
        let mut total_cost_micros = 0i64;

        for entry in inner
            .logs
            .iter()
            .filter(|e| &e.user_id == user_id && e.created_at.date_naive() >= cycle_start)
        {
            request_count += 1;
            total_tokens += entry.total_tokens as u64;
            total_cost_micros += entry.cost_micros;

            let slot = by_model
                .entry(entry.model.clone())
                .or_insert_with(|| ModelUsage {
                    model: entry.model.clone(),
                    request_count: 0,
                    total_tokens: 0,
                    cost_micros: 0,
                });
            slot.request_count += 1;
            slot.total_tokens += entry.total_tokens as u64;
            slot.cost_micros += entry.cost_micros;
        }

        let mut by_model: Vec<ModelUsage> = by_model.into_values().collect();
        by_model.sort_by(|a, b| b.cost_micros.cmp(&a.cost_micros));

        Ok(MonthlySummary {
            user_id: user_id.clone(),
            cycle_start,
            request_count,
            total_tokens,
            total_cost_micros,
            by_model,
        })
    }

    async fn system_stats(&self, since: DateTime<Utc>) -> Result<SystemUsageStats, DomainError> {
        let inner = self.inner.read().await;

        let mut stats = SystemUsageStats {
            since: Some(since),
            ..Default::default()
        };

        for entry in inner.logs.iter().filter(|e| e.created_at >= since) {
            stats.request_count += 1;
            stats.total_tokens += entry.total_tokens as u64;
            stats.total_cost_micros += entry.cost_micros;
        }

        if stats.request_count > 0 {
            stats.avg_tokens_per_request = stats.total_tokens as f64 / stats.request_count as f64;
            stats.avg_cost_micros_per_request =
                stats.total_cost_micros as f64 / stats.request_count as f64;
        }

        Ok(stats)
    }

    async fn top_usage(&self, n: usize) -> Result<Vec<TopUsageEntry>, DomainError> {
        let inner = self.inner.read().await;

        let mut active: Vec<&UserKey> = inner
            .keys
            .values()
            .filter(|k| k.status() == KeyStatus::Active)
            .collect();
        active.sort_by(|a, b| b.current_usage_micros().cmp(&a.current_usage_micros()));

        Ok(active
            .into_iter()
            .take(n)
            .map(|k| TopUsageEntry {
                user_id: k.user_id().clone(),
                api_key_id: k.id().clone(),
                current_usage_micros: k.current_usage_micros(),
                monthly_limit_micros: k.monthly_limit_micros(),
                usage_percent: k.usage_percent(),
            })
            .collect())
    }

    async fn purge_key(&self, id: &UserKeyId) -> Result<bool, DomainError> {
        let mut inner = self.inner.write().await;

        let removed = inner.keys.remove(id).is_some();
        if removed {
            inner.logs.retain(|e| &e.api_key_id != id);
        }

        Ok(removed)
    }
}
