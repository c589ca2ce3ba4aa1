// Periodic background jobs run by the worker

use async_trait::async_trait;
use chrono::Utc;
use common::db::repositories::EmailRepository;
use common::email::sync::{MailboxSyncService, SyncOutcome};
use common::reminders::ReminderDispatcher;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// A unit of work repeated on a fixed period
#[async_trait]
pub trait PeriodicJob: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run one pass; returns how many items were processed
    async fn run_once(&self) -> anyhow::Result<usize>;
}

/// Tick `job` every `period` until a shutdown signal arrives.
///
/// A pass that is still running when a tick is due delays the next one rather
/// than queueing a burst.
pub async fn run_periodic(
    job: Arc<dyn PeriodicJob>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!(job = job.name(), period_seconds = period.as_secs(), "Starting periodic job");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match job.run_once().await {
                    Ok(0) => debug!(job = job.name(), "Nothing to do"),
                    Ok(count) => info!(job = job.name(), processed = count, "Periodic pass finished"),
                    Err(e) => error!(job = job.name(), error = %e, "Periodic pass failed"),
                }
            }
            _ = shutdown_rx.recv() => {
                info!(job = job.name(), "Shutdown signal received, stopping job");
                break;
            }
        }
    }
}

/// Mailboxes synced at once by one worker
const SYNC_CONCURRENCY: usize = 4;

/// Syncs every mailbox that is not already syncing
pub struct MailboxSyncJob {
    emails: EmailRepository,
    sync: MailboxSyncService,
    /// Rows stuck in `syncing` longer than this are picked up again
    stale_after: Duration,
}

impl MailboxSyncJob {
    pub fn new(emails: EmailRepository, sync: MailboxSyncService, stale_after: Duration) -> Self {
        Self {
            emails,
            sync,
            stale_after,
        }
    }
}

#[async_trait]
impl PeriodicJob for MailboxSyncJob {
    fn name(&self) -> &'static str {
        "mailbox_sync"
    }

    #[instrument(skip(self))]
    async fn run_once(&self) -> anyhow::Result<usize> {
        let mailboxes = self.emails.list_syncable(self.stale_after).await?;

        // One failing mailbox must not starve the others
        let synced = stream::iter(mailboxes)
            .map(|mailbox| async move {
                match self.sync.sync_mailbox(mailbox.id).await {
                    Ok(SyncOutcome::Completed(_)) => true,
                    Ok(SyncOutcome::AlreadyRunning) => {
                        debug!(mailbox_id = %mailbox.id, "Sync held by another node");
                        false
                    }
                    Err(e) => {
                        warn!(mailbox_id = %mailbox.id, error = %e, "Mailbox sync failed");
                        false
                    }
                }
            })
            .buffer_unordered(SYNC_CONCURRENCY)
            .filter(|completed| futures::future::ready(*completed))
            .count()
            .await;

        Ok(synced)
    }
}

/// Delivers reminders whose notification time has passed
pub struct ReminderJob {
    dispatcher: ReminderDispatcher,
    batch_size: i64,
}

impl ReminderJob {
    pub fn new(dispatcher: ReminderDispatcher, batch_size: i64) -> Self {
        Self {
            dispatcher,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl PeriodicJob for ReminderJob {
    fn name(&self) -> &'static str {
        "reminder_dispatch"
    }

    #[instrument(skip(self))]
    async fn run_once(&self) -> anyhow::Result<usize> {
        let report = self.dispatcher.dispatch_due(Utc::now(), self.batch_size).await?;
        if report.failed > 0 {
            warn!(failed = report.failed, "Some reminders failed to deliver");
        }
        Ok(report.sent)
    }
}
