use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use keywarden::config::AppConfig;
use keywarden::domain::tier::TierLimits;
use keywarden::infrastructure::key::KeyLifecycleService;
use keywarden::infrastructure::logging::init_logging;
use keywarden::infrastructure::notifier::{NoopNotifier, Notifier, WebhookNotifier};
use keywarden::infrastructure::provider::HttpProviderClient;
use keywarden::infrastructure::reconciler::{ReconcilerScheduler, UsageReconciler};
use keywarden::infrastructure::store::PostgresKeyStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_logging(&config.logging);

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

    info!("Connecting to PostgreSQL...");
    let store_config = keywarden::infrastructure::store::PostgresConfig::new(database_url)
        .with_max_connections(config.storage.max_connections)
        .with_connect_timeout(config.storage.connect_timeout_secs);
    let store = Arc::new(PostgresKeyStore::connect(&store_config).await?);
    store.ensure_tables().await?;
    info!("PostgreSQL connection established");

    let provider = Arc::new(HttpProviderClient::new(&config.provider)?);

    let notifier: Arc<dyn Notifier> = match config.notifier.webhook_url.clone() {
        Some(url) => {
            info!("Webhook notifier enabled");
            Arc::new(WebhookNotifier::new(
                url,
                config.notifier.webhook_secret.clone(),
            )?)
        }
        None => {
            info!("No webhook configured, notifications are dropped");
            Arc::new(NoopNotifier)
        }
    };

    let lifecycle = Arc::new(KeyLifecycleService::new(
        Arc::clone(&store),
        Arc::clone(&provider),
        TierLimits::default(),
        Arc::clone(&notifier),
    ));

    let reconciler = Arc::new(UsageReconciler::new(
        Arc::clone(&store),
        Arc::clone(&notifier),
        config.reconciler.top_usage_count,
    ));

    let scheduler = ReconcilerScheduler::new(reconciler, config.reconciler.clone())
        .with_rotation(Arc::clone(&lifecycle));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    info!("Keywarden started");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    shutdown_tx.send(true)?;
    scheduler_handle.await?;

    info!("Keywarden stopped");
    Ok(())
}
