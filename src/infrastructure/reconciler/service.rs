//! Reconciliation passes over the key store
//!
//! Each pass is a full scan-and-report unit that can run on a schedule or be
//! invoked directly. Passes tolerate per-user failures and only fail as a
//! whole when the store itself is unreachable.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::domain::key::KeyStore;
use crate::domain::usage::{current_cycle_start, LimitSeverity};
use crate::domain::DomainError;
use crate::infrastructure::notifier::{AlertBatch, DailyReport, LimitAlert, Notifier};
use crate::infrastructure::usage::limit_check_for;

/// Scheduled reconciliation over active keys
#[derive(Debug)]
pub struct UsageReconciler<S: KeyStore> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    top_usage_count: usize,
}

impl<S: KeyStore> UsageReconciler<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, top_usage_count: usize) -> Self {
        Self {
            store,
            notifier,
            top_usage_count,
        }
    }

    /// Scan active records and alert on keys at or past the warning
    /// thresholds.
    ///
    /// Unlimited keys are skipped. Each alert is enriched with the user's
    /// cycle summary; a failed summary lookup logs a warning and drops that
    /// user from the batch without stopping the pass.
    pub async fn limit_check_pass(&self) -> Result<AlertBatch, DomainError> {
        let active = self.store.list_active().await?;
        let keys_checked = active.len();
        let cycle_start = current_cycle_start(Utc::now());

        let mut alerts = Vec::new();

        for key in &active {
            let Some(limit) = key.monthly_limit_micros() else {
                continue;
            };
            let check = limit_check_for(key);
            let Some(usage_percent) = check.usage_percent else {
                continue;
            };
            if check.severity == LimitSeverity::None {
                continue;
            }

            let summary = match self.store.monthly_summary(key.user_id(), cycle_start).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(
                        user_id = %key.user_id(),
                        "Skipping alert, summary lookup failed: {}",
                        e
                    );
                    continue;
                }
            };

            alerts.push(LimitAlert {
                user_id: check.user_id,
                api_key_id: check.api_key_id,
                severity: check.severity,
                usage_percent,
                current_usage_micros: check.current_usage_micros,
                monthly_limit_micros: limit,
                summary: Some(summary),
            });
        }

        let batch = AlertBatch {
            generated_at: Utc::now(),
            keys_checked,
            alerts,
        };

        if batch.is_empty() {
            debug!(keys_checked, "Limit check pass found no alerts");
        } else {
            info!(
                keys_checked,
                alerts = batch.alerts.len(),
                "Limit check pass produced alerts"
            );
            let notifier = Arc::clone(&self.notifier);
            let dispatch = batch.clone();
            tokio::spawn(async move {
                notifier.alert_batch(&dispatch).await;
            });
        }

        Ok(batch)
    }

    /// System-wide report over the trailing 24 hours plus a top-N ranking
    pub async fn daily_report_pass(&self) -> Result<DailyReport, DomainError> {
        let since = Utc::now() - Duration::hours(24);
        let stats = self.store.system_stats(since).await?;
        let top_usage = self.store.top_usage(self.top_usage_count).await?;

        let report = DailyReport {
            generated_at: Utc::now(),
            stats,
            top_usage,
        };

        info!(
            requests = report.stats.request_count,
            cost_micros = report.stats.total_cost_micros,
            "Daily report generated"
        );

        let notifier = Arc::clone(&self.notifier);
        let dispatch = report.clone();
        tokio::spawn(async move {
            notifier.daily_report(&dispatch).await;
        });

        Ok(report)
    }

    /// Reset usage counters still carrying a previous cycle. Idempotent
    /// within a cycle; records already in the current cycle are untouched.
    pub async fn monthly_reset_pass(&self) -> Result<usize, DomainError> {
        let cycle_start = current_cycle_start(Utc::now());
        let affected = self.store.reset_usage_before(cycle_start).await?;

        if affected > 0 {
            info!(affected, %cycle_start, "Monthly reset pass zeroed usage");
        } else {
            debug!(%cycle_start, "Monthly reset pass found nothing to reset");
        }

        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::key::{UserKey, UserId};
    use crate::domain::provider::ProviderKeyId;
    use crate::infrastructure::notifier::mock::RecordingNotifier;
    use crate::infrastructure::store::InMemoryKeyStore;
    use crate::infrastructure::usage::{LogUsageRequest, UsageService};
    use chrono::NaiveDate;

    struct Fixture {
        store: Arc<InMemoryKeyStore>,
        notifier: Arc<RecordingNotifier>,
        reconciler: UsageReconciler<InMemoryKeyStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryKeyStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let reconciler = UsageReconciler::new(
            Arc::clone(&store),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            10,
        );

        Fixture {
            store,
            notifier,
            reconciler,
        }
    }

    async fn seed(store: &InMemoryKeyStore, user: &str, limit: Option<i64>, usage: i64) {
        let key = UserKey::new(
            UserId::new(user).unwrap(),
            ProviderKeyId::from(format!("pk-{user}").as_str()),
            format!("{user}-key"),
        )
        .with_monthly_limit_micros(limit);
        let key = store.insert_key(key).await.unwrap();

        if usage > 0 {
            let entry = crate::domain::usage::UsageLogEntry::new(
                UserId::new(user).unwrap(),
                key.id().clone(),
                "gpt-4o",
            )
            .with_tokens(100, 100)
            .with_cost_micros(usage);
            store.log_usage(entry).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_limit_check_classifies_severities() {
        let f = fixture();

        seed(&f.store, "user-ok", Some(10_000_000), 1_000_000).await;
        seed(&f.store, "user-warn", Some(10_000_000), 8_500_000).await;
        seed(&f.store, "user-crit", Some(10_000_000), 9_500_000).await;
        seed(&f.store, "user-unlimited", None, 500_000_000).await;

        let batch = f.reconciler.limit_check_pass().await.unwrap();

        assert_eq!(batch.keys_checked, 4);
        assert_eq!(batch.alerts.len(), 2);

        let warn = batch
            .alerts
            .iter()
            .find(|a| a.user_id.as_str() == "user-warn")
            .unwrap();
        assert_eq!(warn.severity, LimitSeverity::Warning);
        assert!(warn.summary.is_some());
        assert_eq!(warn.summary.as_ref().unwrap().total_cost_micros, 8_500_000);

        let crit = batch
            .alerts
            .iter()
            .find(|a| a.user_id.as_str() == "user-crit")
            .unwrap();
        assert_eq!(crit.severity, LimitSeverity::Critical);
    }

    #[tokio::test]
    async fn test_limit_check_dispatches_non_empty_batch() {
        let f = fixture();
        seed(&f.store, "user-warn", Some(10_000_000), 8_500_000).await;

        f.reconciler.limit_check_pass().await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(f.notifier.alert_batches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_limit_check_empty_batch_not_dispatched() {
        let f = fixture();
        seed(&f.store, "user-ok", Some(10_000_000), 1_000_000).await;

        let batch = f.reconciler.limit_check_pass().await.unwrap();
        assert!(batch.is_empty());

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(f.notifier.alert_batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_daily_report_pass() {
        let f = fixture();
        seed(&f.store, "user-a", Some(10_000_000), 2_000_000).await;
        seed(&f.store, "user-b", Some(10_000_000), 4_000_000).await;

        let report = f.reconciler.daily_report_pass().await.unwrap();

        assert_eq!(report.stats.request_count, 2);
        assert_eq!(report.stats.total_cost_micros, 6_000_000);
        assert_eq!(report.top_usage.len(), 2);
        assert_eq!(report.top_usage[0].user_id.as_str(), "user-b");

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(f.notifier.daily_reports.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_monthly_reset_pass_idempotent() {
        let f = fixture();
        seed(&f.store, "user-a", Some(10_000_000), 5_000_000).await;

        // Age the record into a past cycle
        let keys = f.store.list_active().await.unwrap();
        let mut stale = keys[0].clone();
        stale.reset_usage(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        stale.apply_usage(5_000_000);
        f.store.update_key(&stale).await.unwrap();

        assert_eq!(f.reconciler.monthly_reset_pass().await.unwrap(), 1);
        assert_eq!(f.reconciler.monthly_reset_pass().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_log_usage_request_available() {
        // Exercised here to keep the reconciler and logging flows aligned on
        // the same store semantics
        let store = Arc::new(InMemoryKeyStore::new());
        seed(&store, "user-a", Some(10_000_000), 0).await;
        let usage = UsageService::new(Arc::clone(&store));

        usage
            .log_usage(LogUsageRequest::new("user-a", "gpt-4o").with_cost_micros(8_500_000))
            .await
            .unwrap();

        let reconciler = UsageReconciler::new(
            Arc::clone(&store),
            Arc::new(RecordingNotifier::new()) as Arc<dyn Notifier>,
            10,
        );
        let batch = reconciler.limit_check_pass().await.unwrap();
        assert_eq!(batch.alerts.len(), 1);
    }
}
