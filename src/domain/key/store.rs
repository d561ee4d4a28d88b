//! Key store trait
//!
//! Persistence for key records and usage logs. Implementations must provide
//! the atomicity guarantees documented per method - rotations and usage
//! increments for the same user can be concurrent.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt::Debug;

use super::entity::{UserKey, UserKeyId, UserId};
use crate::domain::usage::{MonthlySummary, SystemUsageStats, TopUsageEntry, UsageLogEntry};
use crate::domain::DomainError;

/// Storage for key records and their usage logs
#[async_trait]
pub trait KeyStore: Send + Sync + Debug {
    /// Insert a new key record.
    ///
    /// Rejects the insert with a Conflict error when another active record
    /// already exists for the same user - the store is the last line of
    /// defense for the one-active-key invariant.
    async fn insert_key(&self, key: UserKey) -> Result<UserKey, DomainError>;

    /// Get a key record by its ID
    async fn get_key(&self, id: &UserKeyId) -> Result<Option<UserKey>, DomainError>;

    /// Find the active record for a user, if any
    async fn find_active_for_user(&self, user_id: &UserId)
        -> Result<Option<UserKey>, DomainError>;

    /// Atomically transition the user's active record to inactive.
    ///
    /// Scoped to `(user_id, status = active)`: a concurrent second transition
    /// for the same user observes no active record and returns None instead
    /// of double-writing.
    async fn deactivate_active(&self, user_id: &UserId) -> Result<Option<UserKey>, DomainError>;

    /// Update an existing record in place
    async fn update_key(&self, key: &UserKey) -> Result<UserKey, DomainError>;

    /// All currently active records
    async fn list_active(&self) -> Result<Vec<UserKey>, DomainError>;

    /// Append a usage log entry and increment the parent record's usage as
    /// one atomic unit.
    ///
    /// If the increment cannot be applied the append must not succeed.
    /// Returns the updated parent record.
    async fn log_usage(&self, entry: UsageLogEntry) -> Result<UserKey, DomainError>;

    /// Zero usage and advance the reset date for every record whose
    /// `usage_reset_date` precedes `cycle_start`. Returns the count affected.
    ///
    /// Records already in the current cycle are never touched, so a reset
    /// cannot erase usage logged concurrently against the new cycle.
    async fn reset_usage_before(&self, cycle_start: NaiveDate) -> Result<usize, DomainError>;

    /// Per-user usage summary for the cycle starting at `cycle_start`.
    ///
    /// NotFound when the user has no key records at all - never conflated
    /// with zero usage.
    async fn monthly_summary(
        &self,
        user_id: &UserId,
        cycle_start: NaiveDate,
    ) -> Result<MonthlySummary, DomainError>;

    /// Aggregate statistics over usage logged since the given instant
    async fn system_stats(&self, since: DateTime<Utc>) -> Result<SystemUsageStats, DomainError>;

    /// Active records ranked by current usage, highest first
    async fn top_usage(&self, n: usize) -> Result<Vec<TopUsageEntry>, DomainError>;

    /// Physically delete a record and its usage logs (external purge only).
    /// Returns whether a record was removed.
    async fn purge_key(&self, id: &UserKeyId) -> Result<bool, DomainError>;
}
