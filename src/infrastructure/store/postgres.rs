//! PostgreSQL key store with connection pooling
//!
//! Key records and usage logs live in two tables. A partial unique index on
//! `(user_id) WHERE status = 'active'` backs the one-active-key invariant at
//! the storage layer, and the log-append plus usage-increment pair runs in a
//! single transaction.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::domain::key::{KeyStatus, KeyStore, UserKey, UserKeyId, UserId};
use crate::domain::usage::{
    ModelUsage, MonthlySummary, SystemUsageStats, TopUsageEntry, UsageLogEntry,
};
use crate::domain::DomainError;

/// PostgreSQL connection configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            connect_timeout_secs: 10,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }
}

/// Key store backed by PostgreSQL
#[derive(Debug)]
pub struct PostgresKeyStore {
    pool: PgPool,
}

impl PostgresKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &PostgresConfig) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Ensures the tables and the active-key uniqueness index exist
    pub async fn ensure_tables(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_keys (
                id VARCHAR(64) PRIMARY KEY,
                user_id VARCHAR(64) NOT NULL,
                provider_key_id VARCHAR(255) NOT NULL,
                name VARCHAR(255) NOT NULL,
                label VARCHAR(255),
                monthly_limit_micros BIGINT,
                current_usage_micros BIGINT NOT NULL DEFAULT 0,
                usage_reset_date DATE NOT NULL,
                status VARCHAR(16) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_used_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create user_keys table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS user_keys_one_active
            ON user_keys (user_id) WHERE status = 'active'
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create unique index: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_logs (
                id VARCHAR(64) PRIMARY KEY,
                user_id VARCHAR(64) NOT NULL,
                api_key_id VARCHAR(64) NOT NULL REFERENCES user_keys(id) ON DELETE CASCADE,
                model VARCHAR(255) NOT NULL,
                request_tokens INTEGER NOT NULL,
                response_tokens INTEGER NOT NULL,
                total_tokens INTEGER NOT NULL,
                cost_micros BIGINT NOT NULL,
                endpoint VARCHAR(255),
                agent VARCHAR(255),
                duration_ms BIGINT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create usage_logs table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS usage_logs_user_created ON usage_logs (user_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create usage index: {}", e)))?;

        Ok(())
    }
}

fn row_to_key(row: &PgRow) -> Result<UserKey, DomainError> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let provider_key_id: String = row.get("provider_key_id");
    let status: String = row.get("status");

    let user_id = UserId::new(user_id)
        .map_err(|e| DomainError::storage(format!("Invalid stored user id: {}", e)))?;
    let status = KeyStatus::parse(&status)
        .ok_or_else(|| DomainError::storage(format!("Invalid stored status '{}'", status)))?;

    Ok(UserKey::from_parts(
        UserKeyId::from(id),
        user_id,
        provider_key_id.into(),
        row.get("name"),
        row.get("label"),
        row.get("monthly_limit_micros"),
        row.get("current_usage_micros"),
        row.get("usage_reset_date"),
        status,
        row.get("created_at"),
        row.get("updated_at"),
        row.get("last_used_at"),
    ))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.to_string().contains("duplicate key")
}

#[async_trait]
impl KeyStore for PostgresKeyStore {
    async fn insert_key(&self, key: UserKey) -> Result<UserKey, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO user_keys (
                id, user_id, provider_key_id, name, label, monthly_limit_micros,
                current_usage_micros, usage_reset_date, status,
                created_at, updated_at, last_used_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(key.id().as_str())
        .bind(key.user_id().as_str())
        .bind(key.provider_key_id().as_str())
        .bind(key.name())
        .bind(key.label())
        .bind(key.monthly_limit_micros())
        .bind(key.current_usage_micros())
        .bind(key.usage_reset_date())
        .bind(key.status().as_str())
        .bind(key.created_at())
        .bind(key.updated_at())
        .bind(key.last_used_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::conflict(format!(
                    "User '{}' already has an active key",
                    key.user_id()
                ))
            } else {
                DomainError::storage(format!("Failed to insert key: {}", e))
            }
        })?;

        Ok(key)
    }

    async fn get_key(&self, id: &UserKeyId) -> Result<Option<UserKey>, DomainError> {
        let row = sqlx::query("SELECT * FROM user_keys WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get key: {}", e)))?;

        row.as_ref().map(row_to_key).transpose()
    }

    async fn find_active_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserKey>, DomainError> {
        let row = sqlx::query("SELECT * FROM user_keys WHERE user_id = $1 AND status = 'active'")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to find active key: {}", e)))?;

        row.as_ref().map(row_to_key).transpose()
    }

    async fn deactivate_active(&self, user_id: &UserId) -> Result<Option<UserKey>, DomainError> {
        // Conditional on status so a concurrent deactivation sees None
        let row = sqlx::query(
            r#"
            UPDATE user_keys
            SET status = 'inactive', updated_at = NOW()
            WHERE user_id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to deactivate key: {}", e)))?;

        row.as_ref().map(row_to_key).transpose()
    }

    async fn update_key(&self, key: &UserKey) -> Result<UserKey, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE user_keys
            SET name = $2, label = $3, monthly_limit_micros = $4,
                current_usage_micros = $5, usage_reset_date = $6, status = $7,
                updated_at = $8, last_used_at = $9
            WHERE id = $1
            "#,
        )
        .bind(key.id().as_str())
        .bind(key.name())
        .bind(key.label())
        .bind(key.monthly_limit_micros())
        .bind(key.current_usage_micros())
        .bind(key.usage_reset_date())
        .bind(key.status().as_str())
        .bind(key.updated_at())
        .bind(key.last_used_at())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to update key: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Key '{}' not found",
                key.id()
            )));
        }

        Ok(key.clone())
    }

    async fn list_active(&self) -> Result<Vec<UserKey>, DomainError> {
        let rows =
            sqlx::query("SELECT * FROM user_keys WHERE status = 'active' ORDER BY created_at")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to list active keys: {}", e)))?;

        rows.iter().map(row_to_key).collect()
    }

    async fn log_usage(&self, entry: UsageLogEntry) -> Result<UserKey, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        let row = sqlx::query(
            r#"
            UPDATE user_keys
            SET current_usage_micros = current_usage_micros + $2,
                last_used_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(entry.api_key_id.as_str())
        .bind(entry.cost_micros)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to apply usage: {}", e)))?;

        let Some(row) = row else {
            return Err(DomainError::not_found(format!(
                "Key '{}' not found",
                entry.api_key_id
            )));
        };
        let updated = row_to_key(&row)?;

        sqlx::query(
            r#"
            INSERT INTO usage_logs (
                id, user_id, api_key_id, model, request_tokens, response_tokens,
                total_tokens, cost_micros, endpoint, agent, duration_ms, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(entry.id().as_str())
        .bind(entry.user_id.as_str())
        .bind(entry.api_key_id.as_str())
        .bind(&entry.model)
        .bind(entry.request_tokens as i32)
        .bind(entry.response_tokens as i32)
        .bind(entry.total_tokens as i32)
        .bind(entry.cost_micros)
        .bind(entry.endpoint.as_deref())
        .bind(entry.agent.as_deref())
        .bind(entry.duration_ms.map(|d| d as i64))
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to insert usage log: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit usage: {}", e)))?;

        Ok(updated)
    }

    async fn reset_usage_before(&self, cycle_start: NaiveDate) -> Result<usize, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE user_keys
            SET current_usage_micros = 0, usage_reset_date = $1, updated_at = NOW()
            WHERE usage_reset_date < $1
            "#,
        )
        .bind(cycle_start)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to reset usage: {}", e)))?;

        Ok(result.rows_affected() as usize)
    }

    async fn monthly_summary(
        &self,
        user_id: &UserId,
        cycle_start: NaiveDate,
    ) -> Result<MonthlySummary, DomainError> {
        let exists_row =
            sqlx::query("SELECT EXISTS(SELECT 1 FROM user_keys WHERE user_id = $1) AS present")
                .bind(user_id.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to check user: {}", e)))?;
        let present: bool = exists_row.get("present");
        if !present {
            return Err(DomainError::not_found(format!(
                "No key records for user '{user_id}'"
            )));
        }

        let rows = sqlx::query(
            r#"
            SELECT model,
                   COUNT(*) AS request_count,
                   COALESCE(SUM(total_tokens), 0)::BIGINT AS total_tokens,
                   COALESCE(SUM(cost_micros), 0)::BIGINT AS cost_micros
            FROM usage_logs
            WHERE user_id = $1 AND created_at >= $2
            GROUP BY model
            ORDER BY cost_micros DESC
            "#,
        )
        .bind(user_id.as_str())
        .bind(cycle_start.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to summarize usage: {}", e)))?;

        let mut summary = MonthlySummary {
            user_id: user_id.clone(),
            cycle_start,
            request_count: 0,
            total_tokens: 0,
            total_cost_micros: 0,
            by_model: Vec::with_capacity(rows.len()),
        };

        for row in rows {
            let request_count: i64 = row.get("request_count");
            let total_tokens: i64 = row.get("total_tokens");
            let cost_micros: i64 = row.get("cost_micros");

            summary.request_count += request_count as u64;
            summary.total_tokens += total_tokens as u64;
            summary.total_cost_micros += cost_micros;
            summary.by_model.push(ModelUsage {
                model: row.get("model"),
                request_count: request_count as u64,
                total_tokens: total_tokens as u64,
                cost_micros,
            });
        }

        Ok(summary)
    }

    async fn system_stats(&self, since: DateTime<Utc>) -> Result<SystemUsageStats, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS request_count,
                   COALESCE(SUM(total_tokens), 0)::BIGINT AS total_tokens,
                   COALESCE(SUM(cost_micros), 0)::BIGINT AS total_cost_micros
            FROM usage_logs
            WHERE created_at >= $1
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to compute stats: {}", e)))?;

        let request_count: i64 = row.get("request_count");
        let total_tokens: i64 = row.get("total_tokens");
        let total_cost_micros: i64 = row.get("total_cost_micros");

        let mut stats = SystemUsageStats {
            since: Some(since),
            request_count: request_count as u64,
            total_tokens: total_tokens as u64,
            total_cost_micros,
            ..Default::default()
        };

        if stats.request_count > 0 {
            stats.avg_tokens_per_request = stats.total_tokens as f64 / stats.request_count as f64;
            stats.avg_cost_micros_per_request =
                stats.total_cost_micros as f64 / stats.request_count as f64;
        }

        Ok(stats)
    }

    async fn top_usage(&self, n: usize) -> Result<Vec<TopUsageEntry>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM user_keys
            WHERE status = 'active'
            ORDER BY current_usage_micros DESC
            LIMIT $1
            "#,
        )
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to rank usage: {}", e)))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let key = row_to_key(row)?;
            entries.push(TopUsageEntry {
                user_id: key.user_id().clone(),
                api_key_id: key.id().clone(),
                current_usage_micros: key.current_usage_micros(),
                monthly_limit_micros: key.monthly_limit_micros(),
                usage_percent: key.usage_percent(),
            });
        }

        Ok(entries)
    }

    async fn purge_key(&self, id: &UserKeyId) -> Result<bool, DomainError> {
        // usage_logs rows follow via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM user_keys WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to purge key: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}
