//! Outbound notifications for alerts and reports
//!
//! Delivery is fire and forget. A notifier failure is logged and never
//! propagates into the operation that produced the payload.

mod webhook;

pub use webhook::WebhookNotifier;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Debug;

use crate::domain::key::{UserKeyId, UserId};
use crate::domain::provider::ProviderKeyId;
use crate::domain::usage::{LimitSeverity, MonthlySummary, SystemUsageStats, TopUsageEntry};

/// One user's limit alert
#[derive(Debug, Clone, Serialize)]
pub struct LimitAlert {
    pub user_id: UserId,
    pub api_key_id: UserKeyId,
    pub severity: LimitSeverity,
    pub usage_percent: f64,
    pub current_usage_micros: i64,
    pub monthly_limit_micros: i64,
    /// Cycle summary, when the lookup succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<MonthlySummary>,
}

/// All alerts produced by one limit-check pass
#[derive(Debug, Clone, Serialize)]
pub struct AlertBatch {
    pub generated_at: DateTime<Utc>,
    pub keys_checked: usize,
    pub alerts: Vec<LimitAlert>,
}

impl AlertBatch {
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

/// System-wide usage report over a trailing window
#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub generated_at: DateTime<Utc>,
    pub stats: SystemUsageStats,
    pub top_usage: Vec<TopUsageEntry>,
}

/// Per-user outcome of a rotation sweep
#[derive(Debug, Clone, Serialize)]
pub struct RotationOutcome {
    pub user_id: UserId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_provider_key_id: Option<ProviderKeyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_key_id: Option<UserKeyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal problems, e.g. the old provider key could not be deleted
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Manifest of a batch rotation, one entry per attempted user
#[derive(Debug, Clone, Serialize)]
pub struct RotationReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub attempted: usize,
    pub rotated: usize,
    pub failed: usize,
    pub outcomes: Vec<RotationOutcome>,
}

/// Sink for alerts and reports.
///
/// Implementations log their own failures; callers never observe them.
#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    async fn alert_batch(&self, batch: &AlertBatch);

    async fn daily_report(&self, report: &DailyReport);

    async fn rotation_report(&self, report: &RotationReport);
}

/// Notifier that drops everything
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn alert_batch(&self, _batch: &AlertBatch) {}

    async fn daily_report(&self, _report: &DailyReport) {}

    async fn rotation_report(&self, _report: &RotationReport) {}
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Notifier that records every payload it receives
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub alert_batches: Mutex<Vec<AlertBatch>>,
        pub daily_reports: Mutex<Vec<DailyReport>>,
        pub rotation_reports: Mutex<Vec<RotationReport>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn alert_batch(&self, batch: &AlertBatch) {
            self.alert_batches.lock().unwrap().push(batch.clone());
        }

        async fn daily_report(&self, report: &DailyReport) {
            self.daily_reports.lock().unwrap().push(report.clone());
        }

        async fn rotation_report(&self, report: &RotationReport) {
            self.rotation_reports.lock().unwrap().push(report.clone());
        }
    }
}
