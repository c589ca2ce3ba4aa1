// Worker binary: periodic mailbox sync and reminder dispatch

mod jobs;

use anyhow::Result;
use common::bootstrap::{init_database_pool, init_redis_pool, Services};
use common::config::Settings;
use common::telemetry;
use jobs::{run_periodic, MailboxSyncJob, PeriodicJob, ReminderJob};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load().map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;

    info!("Starting Tenantry worker");

    telemetry::init_metrics(settings.observability.metrics_port)?;

    // Migrations are applied by the api process
    let db_pool = init_database_pool(&settings).await?;
    let redis_pool = init_redis_pool(&settings).await?;
    let services = Services::build(&settings, &db_pool, &redis_pool)?;

    info!("Services initialized");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let sync_job: Arc<dyn PeriodicJob> = Arc::new(MailboxSyncJob::new(
        services.repos.emails.clone(),
        services.sync.clone(),
        Duration::from_secs(settings.worker.lock_ttl_seconds),
    ));
    let reminder_job: Arc<dyn PeriodicJob> = Arc::new(ReminderJob::new(
        services.dispatcher.clone(),
        settings.worker.reminder_batch_size,
    ));

    let handles = vec![
        tokio::spawn(run_periodic(
            sync_job,
            Duration::from_secs(settings.worker.sync_interval_seconds),
            shutdown_tx.subscribe(),
        )),
        tokio::spawn(run_periodic(
            reminder_job,
            Duration::from_secs(settings.worker.reminder_interval_seconds),
            shutdown_tx.subscribe(),
        )),
    ];

    info!("Worker is running. Press Ctrl+C to shutdown gracefully");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, initiating graceful shutdown");
        }
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
    }

    let _ = shutdown_tx.send(());

    // Let in-flight passes finish
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Periodic job task panicked");
        }
    }

    telemetry::shutdown_tracer();
    info!("Worker shutdown complete");
    Ok(())
}
