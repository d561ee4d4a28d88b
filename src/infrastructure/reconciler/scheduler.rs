//! Interval loops driving the reconciliation passes
//!
//! Each pass runs on its own tokio task with an independent cadence. A pass
//! failure is logged and the loop keeps ticking; only the shutdown signal
//! stops a loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, warn};

use super::UsageReconciler;
use crate::config::ReconcilerConfig;
use crate::domain::key::KeyStore;
use crate::domain::provider::ProviderClient;
use crate::infrastructure::key::KeyLifecycleService;

/// Runs the reconciliation passes on their configured intervals
pub struct ReconcilerScheduler<S: KeyStore + 'static, P: ProviderClient + 'static> {
    reconciler: Arc<UsageReconciler<S>>,
    lifecycle: Option<Arc<KeyLifecycleService<S, P>>>,
    config: ReconcilerConfig,
}

impl<S: KeyStore + 'static, P: ProviderClient + 'static> ReconcilerScheduler<S, P> {
    pub fn new(reconciler: Arc<UsageReconciler<S>>, config: ReconcilerConfig) -> Self {
        Self {
            reconciler,
            lifecycle: None,
            config,
        }
    }

    /// Enable the periodic rotation sweep. Only takes effect when
    /// `rotation_interval_secs` is configured.
    pub fn with_rotation(mut self, lifecycle: Arc<KeyLifecycleService<S, P>>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Run all loops until the shutdown signal flips to true
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let mut tasks = Vec::new();

        {
            let reconciler = Arc::clone(&self.reconciler);
            let rx = shutdown.clone();
            let secs = self.config.limit_check_interval_secs;
            tasks.push(tokio::spawn(async move {
                pass_loop("limit_check", secs, rx, move || {
                    let reconciler = Arc::clone(&reconciler);
                    async move { reconciler.limit_check_pass().await.map(|_| ()) }
                })
                .await;
            }));
        }

        {
            let reconciler = Arc::clone(&self.reconciler);
            let rx = shutdown.clone();
            let secs = self.config.daily_report_interval_secs;
            tasks.push(tokio::spawn(async move {
                pass_loop("daily_report", secs, rx, move || {
                    let reconciler = Arc::clone(&reconciler);
                    async move { reconciler.daily_report_pass().await.map(|_| ()) }
                })
                .await;
            }));
        }

        {
            let reconciler = Arc::clone(&self.reconciler);
            let rx = shutdown.clone();
            let secs = self.config.reset_check_interval_secs;
            tasks.push(tokio::spawn(async move {
                pass_loop("monthly_reset", secs, rx, move || {
                    let reconciler = Arc::clone(&reconciler);
                    async move { reconciler.monthly_reset_pass().await.map(|_| ()) }
                })
                .await;
            }));
        }

        match (self.config.rotation_interval_secs, self.lifecycle) {
            (Some(secs), Some(lifecycle)) => {
                let rx = shutdown.clone();
                tasks.push(tokio::spawn(async move {
                    rotation_loop(secs, rx, lifecycle).await;
                }));
            }
            (Some(_), None) => {
                warn!("Rotation interval configured but no lifecycle service attached");
            }
            _ => {}
        }

        info!("Reconciler scheduler started");

        for task in tasks {
            let _ = task.await;
        }

        info!("Reconciler scheduler stopped");
    }
}

/// Small random delay so co-scheduled loops do not all fire at once.
///
/// Returns true when shutdown arrives before the delay elapses. A closed
/// channel counts as shutdown.
async fn start_jitter(interval_secs: u64, shutdown: &mut watch::Receiver<bool>) -> bool {
    let max_ms = (interval_secs.min(60) * 1000 / 10).max(1);
    let delay = rand::thread_rng().gen_range(0..max_ms);
    tokio::select! {
        _ = time::sleep(Duration::from_millis(delay)) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

async fn pass_loop<F, Fut>(
    name: &'static str,
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
    mut pass: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), crate::domain::DomainError>>,
{
    if start_jitter(interval_secs, &mut shutdown).await {
        info!(pass = name, "Stopping reconciliation loop");
        return;
    }

    let mut ticker = time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = pass().await {
                    warn!(pass = name, "Reconciliation pass failed: {}", e);
                }
            }
            changed = shutdown.changed() => {
                // A dropped sender stops the loop like a shutdown signal
                if changed.is_err() || *shutdown.borrow() {
                    info!(pass = name, "Stopping reconciliation loop");
                    break;
                }
            }
        }
    }
}

/// The rotation sweep never fires at startup; the first run waits out a full
/// interval.
async fn rotation_loop<S: KeyStore + 'static, P: ProviderClient + 'static>(
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
    lifecycle: Arc<KeyLifecycleService<S, P>>,
) {
    if start_jitter(interval_secs, &mut shutdown).await {
        info!("Stopping rotation loop");
        return;
    }

    let period = Duration::from_secs(interval_secs);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match lifecycle.rotate_all(true).await {
                    Ok(report) => {
                        info!(
                            rotated = report.rotated,
                            failed = report.failed,
                            "Scheduled rotation sweep finished"
                        );
                    }
                    Err(e) => warn!("Scheduled rotation sweep failed: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Stopping rotation loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provider::mock::MockProviderClient;
    use crate::infrastructure::notifier::{mock::RecordingNotifier, Notifier};
    use crate::infrastructure::store::InMemoryKeyStore;

    fn hourly_scheduler() -> ReconcilerScheduler<InMemoryKeyStore, MockProviderClient> {
        let store = Arc::new(InMemoryKeyStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let reconciler = Arc::new(UsageReconciler::new(
            store,
            notifier as Arc<dyn Notifier>,
            10,
        ));

        let config = ReconcilerConfig {
            limit_check_interval_secs: 3600,
            daily_report_interval_secs: 3600,
            reset_check_interval_secs: 3600,
            rotation_interval_secs: None,
            top_usage_count: 10,
        };

        ReconcilerScheduler::new(reconciler, config)
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(hourly_scheduler().run(rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }

    /// The start delay for hourly loops can run for seconds; a shutdown sent
    /// while the loops are still in it must not wait it out.
    #[tokio::test]
    async fn test_shutdown_during_start_delay_is_observed() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let handle = tokio::spawn(hourly_scheduler().run(rx));

        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("scheduler did not stop during start delay")
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_sender_stops_scheduler() {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(hourly_scheduler().run(rx));
        drop(tx);

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler did not stop after sender was dropped")
            .unwrap();
    }
}
