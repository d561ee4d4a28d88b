//! Key lifecycle service
//!
//! Drives the provisioning flow against the provider and the local store.
//! The store holds the durable truth; provider state is reconciled around it
//! with compensating deletes so a failed flow never leaves a live credential
//! the store does not know about.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::domain::key::{
    validate_monthly_limit, KeyStore, UserKey, UserKeyId, UserId,
};
use crate::domain::provider::{CreateProviderKey, ProviderClient, ProviderKeyId};
use crate::domain::tier::TierLimits;
use crate::domain::DomainError;
use crate::infrastructure::notifier::{Notifier, RotationOutcome, RotationReport};

/// Lifecycle errors that carry more context than the plain domain error
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The user already holds an active key; the existing record is attached
    /// so callers can surface it without a second lookup
    #[error("User '{}' already has an active key '{}'", existing.user_id(), existing.id())]
    ActiveKeyExists { existing: Box<UserKey> },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Request to provision a key for a user
#[derive(Debug, Clone)]
pub struct CreateKeyRequest {
    pub user_id: String,
    /// Display name; defaults to a name derived from the user id
    pub name: Option<String>,
    pub label: Option<String>,
    /// Explicit monthly limit in micro-dollars; overrides the tier table
    pub monthly_limit_micros: Option<i64>,
    /// Subscription tier used to resolve the limit when none is given
    pub subscription_tier: Option<String>,
}

impl CreateKeyRequest {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: None,
            label: None,
            monthly_limit_micros: None,
            subscription_tier: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_monthly_limit_micros(mut self, limit: i64) -> Self {
        self.monthly_limit_micros = Some(limit);
        self
    }

    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.subscription_tier = Some(tier.into());
        self
    }
}

/// A freshly provisioned key. The secret is surfaced here exactly once.
#[derive(Debug)]
pub struct CreatedKey {
    pub record: UserKey,
    pub secret: String,
}

/// Outcome of a single-user rotation
#[derive(Debug)]
pub struct RotatedKey {
    pub old_key_id: UserKeyId,
    pub old_provider_key_id: ProviderKeyId,
    pub record: UserKey,
    pub secret: String,
    /// Non-fatal problems, e.g. the old provider key could not be removed
    pub warnings: Vec<String>,
}

/// Service owning key creation, rotation and deactivation
#[derive(Debug)]
pub struct KeyLifecycleService<S: KeyStore, P: ProviderClient> {
    store: Arc<S>,
    provider: Arc<P>,
    tiers: TierLimits,
    notifier: Arc<dyn Notifier>,
}

impl<S: KeyStore + 'static, P: ProviderClient + 'static> KeyLifecycleService<S, P> {
    pub fn new(
        store: Arc<S>,
        provider: Arc<P>,
        tiers: TierLimits,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            provider,
            tiers,
            notifier,
        }
    }

    /// Provision a new key for a user.
    ///
    /// Fails fast when the user already holds an active key. The provider
    /// key is created before the record is persisted; if persisting fails
    /// the provider key is deleted again so no live credential is orphaned.
    pub async fn create_key(&self, request: CreateKeyRequest) -> Result<CreatedKey, LifecycleError> {
        let user_id = UserId::new(&request.user_id)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        if let Some(existing) = self.store.find_active_for_user(&user_id).await? {
            return Err(LifecycleError::ActiveKeyExists {
                existing: Box::new(existing),
            });
        }

        let limit_micros = self.resolve_limit(&request)?;
        let name = request
            .name
            .clone()
            .unwrap_or_else(|| format!("{}-key", user_id));

        let mut provider_request = CreateProviderKey::new(&name);
        if let Some(limit) = limit_micros {
            provider_request = provider_request.with_limit_usd(limit as f64 / 1_000_000.0);
        }
        if let Some(ref label) = request.label {
            provider_request = provider_request.with_label(label);
        }

        let provider_key = self.provider.create_key(provider_request).await?;

        let mut record = UserKey::new(user_id.clone(), provider_key.id.clone(), name)
            .with_monthly_limit_micros(limit_micros);
        if let Some(label) = request.label {
            record = record.with_label(label);
        }

        let record = match self.store.insert_key(record).await {
            Ok(record) => record,
            Err(e) => {
                self.compensate_provider_key(&provider_key.id).await;
                return Err(e.into());
            }
        };

        info!(
            user_id = %user_id,
            key_id = %record.id(),
            limit_micros = ?limit_micros,
            "Provisioned key"
        );

        Ok(CreatedKey {
            record,
            secret: provider_key.key,
        })
    }

    /// Rotate a user's active key: issue a replacement at the provider,
    /// retire the old record and persist the new one.
    ///
    /// The replacement inherits the old key's limit and label; accrued usage
    /// starts at zero. With `delete_old` the superseded provider key is
    /// removed best-effort, surfacing problems as warnings rather than
    /// failing the rotation.
    pub async fn rotate_key(
        &self,
        user_id: &UserId,
        delete_old: bool,
    ) -> Result<RotatedKey, LifecycleError> {
        let old = self
            .store
            .find_active_for_user(user_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("No active key for user '{user_id}'"))
            })?;

        let mut provider_request = CreateProviderKey::new(old.name());
        if let Some(limit_usd) = old.monthly_limit_usd() {
            provider_request = provider_request.with_limit_usd(limit_usd);
        }
        if let Some(label) = old.label() {
            provider_request = provider_request.with_label(label);
        }

        let provider_key = self.provider.create_key(provider_request).await?;

        // Past this point the old record goes inactive. A failure persisting
        // the replacement is compensated at the provider but still leaves the
        // user without an active key, which the caller sees as an error.
        if self.store.deactivate_active(user_id).await?.is_none() {
            self.compensate_provider_key(&provider_key.id).await;
            return Err(DomainError::conflict(format!(
                "Active key for user '{user_id}' changed during rotation"
            ))
            .into());
        }

        let mut record = UserKey::new(user_id.clone(), provider_key.id.clone(), old.name())
            .with_monthly_limit_micros(old.monthly_limit_micros());
        if let Some(label) = old.label() {
            record = record.with_label(label);
        }

        let record = match self.store.insert_key(record).await {
            Ok(record) => record,
            Err(e) => {
                self.compensate_provider_key(&provider_key.id).await;
                error!(
                    user_id = %user_id,
                    "Rotation failed after deactivation; user left without an active key"
                );
                return Err(e.into());
            }
        };

        let mut warnings = Vec::new();
        if delete_old {
            if let Err(e) = self.provider.delete_key(old.provider_key_id()).await {
                if !e.is_not_found() {
                    warn!(
                        user_id = %user_id,
                        provider_key_id = %old.provider_key_id(),
                        "Failed to delete superseded provider key: {}",
                        e
                    );
                    warnings.push(format!(
                        "Superseded provider key '{}' was not deleted: {}",
                        old.provider_key_id(),
                        e
                    ));
                }
            }
        }

        info!(
            user_id = %user_id,
            old_key_id = %old.id(),
            new_key_id = %record.id(),
            "Rotated key"
        );

        Ok(RotatedKey {
            old_key_id: old.id().clone(),
            old_provider_key_id: old.provider_key_id().clone(),
            record,
            secret: provider_key.key,
            warnings,
        })
    }

    /// Deactivate a user's active key. Idempotent: returns None when the
    /// user has no active key, which is not an error.
    ///
    /// The provider key is deleted best-effort; the local transition stands
    /// even if the provider call fails.
    pub async fn deactivate_key(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserKey>, LifecycleError> {
        let Some(record) = self.store.deactivate_active(user_id).await? else {
            return Ok(None);
        };

        if let Err(e) = self.provider.delete_key(record.provider_key_id()).await {
            if !e.is_not_found() {
                warn!(
                    user_id = %user_id,
                    provider_key_id = %record.provider_key_id(),
                    "Failed to delete provider key for deactivated record: {}",
                    e
                );
            }
        }

        info!(user_id = %user_id, key_id = %record.id(), "Deactivated key");
        Ok(Some(record))
    }

    /// Suspend a user's active key.
    ///
    /// Unlike deactivation this is a temporary block: the provider key is
    /// left in place so the record can be reinstated later without
    /// re-provisioning. Fails with NotFound when the user has no active key.
    pub async fn suspend_key(&self, user_id: &UserId) -> Result<UserKey, LifecycleError> {
        let mut record = self
            .store
            .find_active_for_user(user_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("No active key for user '{user_id}'"))
            })?;

        record.suspend();
        let record = self.store.update_key(&record).await?;

        info!(user_id = %user_id, key_id = %record.id(), "Suspended key");
        Ok(record)
    }

    /// Rotate every active key, continuing past per-user failures.
    ///
    /// Returns a manifest with one outcome per attempted user, in the order
    /// the active records were listed. The manifest is also dispatched to
    /// the notifier, fire and forget.
    pub async fn rotate_all(&self, delete_old: bool) -> Result<RotationReport, LifecycleError> {
        let started_at = Utc::now();
        let active = self.store.list_active().await?;
        let attempted = active.len();

        info!(count = attempted, "Starting rotation sweep");

        let mut outcomes = Vec::with_capacity(attempted);
        let mut rotated = 0;

        for key in active {
            let user_id = key.user_id().clone();
            match self.rotate_key(&user_id, delete_old).await {
                Ok(result) => {
                    rotated += 1;
                    outcomes.push(RotationOutcome {
                        user_id,
                        success: true,
                        old_provider_key_id: Some(result.old_provider_key_id),
                        new_key_id: Some(result.record.id().clone()),
                        error: None,
                        warnings: result.warnings,
                    });
                }
                Err(e) => {
                    warn!(user_id = %user_id, "Rotation failed: {}", e);
                    outcomes.push(RotationOutcome {
                        user_id,
                        success: false,
                        old_provider_key_id: Some(key.provider_key_id().clone()),
                        new_key_id: None,
                        error: Some(e.to_string()),
                        warnings: Vec::new(),
                    });
                }
            }
        }

        let report = RotationReport {
            started_at,
            finished_at: Utc::now(),
            attempted,
            rotated,
            failed: attempted - rotated,
            outcomes,
        };

        info!(
            attempted = report.attempted,
            rotated = report.rotated,
            failed = report.failed,
            "Rotation sweep finished"
        );

        let notifier = Arc::clone(&self.notifier);
        let dispatch = report.clone();
        tokio::spawn(async move {
            notifier.rotation_report(&dispatch).await;
        });

        Ok(report)
    }

    fn resolve_limit(&self, request: &CreateKeyRequest) -> Result<Option<i64>, DomainError> {
        if let Some(limit) = request.monthly_limit_micros {
            validate_monthly_limit(limit).map_err(|e| DomainError::validation(e.to_string()))?;
            return Ok(Some(limit));
        }

        let tier = request.subscription_tier.as_deref().unwrap_or("free");
        Ok(self.tiers.monthly_limit_micros(tier))
    }

    /// Delete a provider key created by a flow that could not complete. A
    /// failed delete leaves an orphaned credential, which only gets logged.
    async fn compensate_provider_key(&self, id: &ProviderKeyId) {
        if let Err(e) = self.provider.delete_key(id).await {
            error!(
                provider_key_id = %id,
                "Failed to clean up provider key after aborted flow, credential is orphaned: {}",
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::key::KeyStatus;
    use crate::domain::provider::mock::MockProviderClient;
    use crate::infrastructure::notifier::mock::RecordingNotifier;
    use crate::infrastructure::store::InMemoryKeyStore;

    struct Fixture {
        store: Arc<InMemoryKeyStore>,
        provider: Arc<MockProviderClient>,
        notifier: Arc<RecordingNotifier>,
        service: KeyLifecycleService<InMemoryKeyStore, MockProviderClient>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryKeyStore::new());
        let provider = Arc::new(MockProviderClient::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let service = KeyLifecycleService::new(
            Arc::clone(&store),
            Arc::clone(&provider),
            TierLimits::default(),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        );

        Fixture {
            store,
            provider,
            notifier,
            service,
        }
    }

    #[tokio::test]
    async fn test_create_key_with_tier_limit() {
        let f = fixture();

        let created = f
            .service
            .create_key(CreateKeyRequest::new("user-1").with_tier("standard"))
            .await
            .unwrap();

        assert_eq!(created.record.monthly_limit_micros(), Some(50_000_000));
        assert_eq!(created.record.status(), KeyStatus::Active);
        assert!(created.secret.starts_with("sk-mock-"));
    }

    #[tokio::test]
    async fn test_create_key_unknown_tier_gets_free_limit() {
        let f = fixture();

        let created = f
            .service
            .create_key(CreateKeyRequest::new("user-1").with_tier("platinum"))
            .await
            .unwrap();

        assert_eq!(created.record.monthly_limit_micros(), Some(10_000_000));
    }

    #[tokio::test]
    async fn test_create_key_explicit_limit_overrides_tier() {
        let f = fixture();

        let created = f
            .service
            .create_key(
                CreateKeyRequest::new("user-1")
                    .with_tier("enterprise")
                    .with_monthly_limit_micros(7_000_000),
            )
            .await
            .unwrap();

        assert_eq!(created.record.monthly_limit_micros(), Some(7_000_000));
    }

    #[tokio::test]
    async fn test_create_key_rejects_non_positive_limit() {
        let f = fixture();

        let result = f
            .service
            .create_key(CreateKeyRequest::new("user-1").with_monthly_limit_micros(0))
            .await;

        assert!(matches!(
            result,
            Err(LifecycleError::Domain(DomainError::Validation { .. }))
        ));
        assert_eq!(f.provider.key_count(), 0);
    }

    #[tokio::test]
    async fn test_create_key_conflict_returns_existing_record() {
        let f = fixture();

        let first = f
            .service
            .create_key(CreateKeyRequest::new("user-1"))
            .await
            .unwrap();

        let result = f.service.create_key(CreateKeyRequest::new("user-1")).await;

        match result {
            Err(LifecycleError::ActiveKeyExists { existing }) => {
                assert_eq!(existing.id(), first.record.id());
            }
            other => panic!("expected ActiveKeyExists, got {:?}", other),
        }
        // No second provider key was provisioned
        assert_eq!(f.provider.key_count(), 1);
    }

    /// Store wrapper that never reports an active record, so a conflicting
    /// insert reaches the storage layer the way a lost race would
    #[derive(Debug)]
    struct BlindStore(Arc<InMemoryKeyStore>);

    #[async_trait::async_trait]
    impl KeyStore for BlindStore {
        async fn insert_key(&self, key: UserKey) -> Result<UserKey, DomainError> {
            self.0.insert_key(key).await
        }

        async fn get_key(&self, id: &UserKeyId) -> Result<Option<UserKey>, DomainError> {
            self.0.get_key(id).await
        }

        async fn find_active_for_user(
            &self,
            _user_id: &UserId,
        ) -> Result<Option<UserKey>, DomainError> {
            Ok(None)
        }

        async fn deactivate_active(
            &self,
            user_id: &UserId,
        ) -> Result<Option<UserKey>, DomainError> {
            self.0.deactivate_active(user_id).await
        }

        async fn update_key(&self, key: &UserKey) -> Result<UserKey, DomainError> {
            self.0.update_key(key).await
        }

        async fn list_active(&self) -> Result<Vec<UserKey>, DomainError> {
            self.0.list_active().await
        }

        async fn log_usage(
            &self,
            entry: crate::domain::usage::UsageLogEntry,
        ) -> Result<UserKey, DomainError> {
            self.0.log_usage(entry).await
        }

        async fn reset_usage_before(
            &self,
            cycle_start: chrono::NaiveDate,
        ) -> Result<usize, DomainError> {
            self.0.reset_usage_before(cycle_start).await
        }

        async fn monthly_summary(
            &self,
            user_id: &UserId,
            cycle_start: chrono::NaiveDate,
        ) -> Result<crate::domain::usage::MonthlySummary, DomainError> {
            self.0.monthly_summary(user_id, cycle_start).await
        }

        async fn system_stats(
            &self,
            since: chrono::DateTime<Utc>,
        ) -> Result<crate::domain::usage::SystemUsageStats, DomainError> {
            self.0.system_stats(since).await
        }

        async fn top_usage(
            &self,
            n: usize,
        ) -> Result<Vec<crate::domain::usage::TopUsageEntry>, DomainError> {
            self.0.top_usage(n).await
        }

        async fn purge_key(&self, id: &UserKeyId) -> Result<bool, DomainError> {
            self.0.purge_key(id).await
        }
    }

    #[tokio::test]
    async fn test_create_key_compensates_on_persist_failure() {
        let inner = Arc::new(InMemoryKeyStore::new());
        let provider = Arc::new(MockProviderClient::new());
        let service = KeyLifecycleService::new(
            Arc::new(BlindStore(Arc::clone(&inner))),
            Arc::clone(&provider),
            TierLimits::default(),
            Arc::new(RecordingNotifier::new()) as Arc<dyn Notifier>,
        );

        service
            .create_key(CreateKeyRequest::new("user-1"))
            .await
            .unwrap();

        // The second create slips past the service check and collides in the
        // store; its provider key must be deleted again
        let result = service.create_key(CreateKeyRequest::new("user-1")).await;
        assert!(matches!(
            result,
            Err(LifecycleError::Domain(DomainError::Conflict { .. }))
        ));

        assert_eq!(provider.key_count(), 1);
        assert_eq!(provider.deleted_ids().len(), 1);
        assert_eq!(inner.key_count().await, 1);
    }

    #[tokio::test]
    async fn test_rotate_preserves_limit_and_zeroes_usage() {
        let f = fixture();
        let user = UserId::new("user-1").unwrap();

        let created = f
            .service
            .create_key(
                CreateKeyRequest::new("user-1")
                    .with_tier("standard")
                    .with_label("primary"),
            )
            .await
            .unwrap();

        // Accrue some usage before rotating
        let mut key = created.record.clone();
        key.apply_usage(12_000_000);
        f.store.update_key(&key).await.unwrap();

        let rotated = f.service.rotate_key(&user, true).await.unwrap();

        assert_eq!(rotated.record.monthly_limit_micros(), Some(50_000_000));
        assert_eq!(rotated.record.label(), Some("primary"));
        assert_eq!(rotated.record.current_usage_micros(), 0);
        assert_ne!(rotated.record.provider_key_id(), key.provider_key_id());
        assert!(rotated.warnings.is_empty());

        // Old record is inactive but still queryable
        let old = f.store.get_key(&rotated.old_key_id).await.unwrap().unwrap();
        assert_eq!(old.status(), KeyStatus::Inactive);
        assert_eq!(old.current_usage_micros(), 12_000_000);

        // Old provider key was deleted
        assert_eq!(f.provider.deleted_ids(), vec![rotated.old_provider_key_id]);
    }

    #[tokio::test]
    async fn test_rotate_keeps_old_provider_key_when_not_deleting() {
        let f = fixture();
        let user = UserId::new("user-1").unwrap();

        f.service
            .create_key(CreateKeyRequest::new("user-1"))
            .await
            .unwrap();

        let rotated = f.service.rotate_key(&user, false).await.unwrap();
        assert!(rotated.warnings.is_empty());
        assert!(f.provider.deleted_ids().is_empty());
        assert_eq!(f.provider.key_count(), 2);
    }

    #[tokio::test]
    async fn test_rotate_old_delete_failure_is_a_warning() {
        let f = fixture();
        let user = UserId::new("user-1").unwrap();

        f.service
            .create_key(CreateKeyRequest::new("user-1"))
            .await
            .unwrap();

        f.provider.set_fail_deletes(true);
        let rotated = f.service.rotate_key(&user, true).await.unwrap();

        assert_eq!(rotated.warnings.len(), 1);
        // The new record is active regardless
        let active = f.store.find_active_for_user(&user).await.unwrap().unwrap();
        assert_eq!(active.id(), rotated.record.id());
    }

    #[tokio::test]
    async fn test_rotate_without_active_key_is_not_found() {
        let f = fixture();
        let user = UserId::new("user-1").unwrap();

        let result = f.service.rotate_key(&user, false).await;
        assert!(matches!(
            result,
            Err(LifecycleError::Domain(DomainError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_deactivate_is_idempotent() {
        let f = fixture();
        let user = UserId::new("user-1").unwrap();

        f.service
            .create_key(CreateKeyRequest::new("user-1"))
            .await
            .unwrap();

        let first = f.service.deactivate_key(&user).await.unwrap();
        assert!(first.is_some());
        assert_eq!(first.unwrap().status(), KeyStatus::Inactive);

        let second = f.service.deactivate_key(&user).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_deactivate_survives_provider_failure() {
        let f = fixture();
        let user = UserId::new("user-1").unwrap();

        f.service
            .create_key(CreateKeyRequest::new("user-1"))
            .await
            .unwrap();

        f.provider.set_fail_deletes(true);
        let record = f.service.deactivate_key(&user).await.unwrap();

        assert!(record.is_some());
        assert!(f.store.find_active_for_user(&user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_suspend_keeps_provider_key() {
        let f = fixture();
        let user = UserId::new("user-1").unwrap();

        f.service
            .create_key(CreateKeyRequest::new("user-1"))
            .await
            .unwrap();

        let suspended = f.service.suspend_key(&user).await.unwrap();
        assert_eq!(suspended.status(), KeyStatus::Suspended);

        // No longer the active key, but the provider credential survives
        assert!(f.store.find_active_for_user(&user).await.unwrap().is_none());
        assert_eq!(f.provider.key_count(), 1);
        assert!(f.provider.deleted_ids().is_empty());
    }

    #[tokio::test]
    async fn test_suspend_without_active_key_is_not_found() {
        let f = fixture();
        let user = UserId::new("user-1").unwrap();

        let result = f.service.suspend_key(&user).await;
        assert!(matches!(
            result,
            Err(LifecycleError::Domain(DomainError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_rotate_all_continues_past_failures() {
        let f = fixture();

        for user in ["user-a", "user-b", "user-c"] {
            f.service
                .create_key(CreateKeyRequest::new(user))
                .await
                .unwrap();
        }

        // user-b's replacement key fails to provision
        f.provider.fail_create_containing("user-b");

        let report = f.service.rotate_all(false).await.unwrap();

        assert_eq!(report.attempted, 3);
        assert_eq!(report.rotated, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.outcomes.len(), 3);

        let failed: Vec<_> = report.outcomes.iter().filter(|o| !o.success).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].user_id.as_str(), "user-b");
        assert!(failed[0].error.is_some());

        // The failed user keeps their original active key
        let user_b = UserId::new("user-b").unwrap();
        let active = f
            .store
            .find_active_for_user(&user_b)
            .await
            .unwrap()
            .unwrap();
        assert!(report
            .outcomes
            .iter()
            .find(|o| o.user_id == user_b)
            .unwrap()
            .old_provider_key_id
            .as_ref()
            .is_some_and(|id| id == active.provider_key_id()));
    }

    #[tokio::test]
    async fn test_rotate_all_dispatches_report() {
        let f = fixture();

        f.service
            .create_key(CreateKeyRequest::new("user-1"))
            .await
            .unwrap();

        f.service.rotate_all(false).await.unwrap();

        // Dispatch is spawned; give it a beat
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let reports = f.notifier.rotation_reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].rotated, 1);
    }
}
