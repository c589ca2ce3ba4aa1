// Mailbox synchronization: fetch, dedup, screen, thread and score

use super::provider::{EmailProvider, ProviderMessage};
use crate::billing::BillingService;
use crate::config::Settings;
use crate::db::repositories::{ContactRepository, EmailRepository, NewMessage, ScreeningRepository, ThreadUpsert};
use crate::errors::{DatabaseError, ServiceError, StorageError};
use crate::importance::{score_thread, ScoringContext, ThreadSignals};
use crate::lock::{DistributedLock, LockGuard};
use crate::models::{EmailMessage, EmailThread, Mailbox, SyncStatus, UsageMetric};
use crate::screening::{classify, normalize_sender, resolve_placement, SenderProfile};
use crate::telemetry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub threads_touched: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed(SyncReport),
    AlreadyRunning,
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub page_size: u32,
    pub max_pages: u32,
    pub lock_ttl: Duration,
    pub vip_domains: Vec<String>,
}

impl From<&Settings> for SyncSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            page_size: settings.email_provider.page_size,
            max_pages: settings.email_provider.max_pages_per_sync.max(1),
            lock_ttl: Duration::from_secs(settings.worker.lock_ttl_seconds),
            vip_domains: settings.screening.vip_domains.clone(),
        }
    }
}

pub fn lock_resource(mailbox_id: Uuid) -> String {
    format!("sync:mailbox:{}", mailbox_id)
}

/// Where the next sync picks up
///
/// The provider lists newest first, so the watermark only advances once a
/// listing has been read to its end. Until then the cursor is kept and the
/// newest timestamp seen so far waits in `high_water`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCheckpoint {
    pub watermark: Option<DateTime<Utc>>,
    pub cursor: Option<String>,
    pub high_water: Option<DateTime<Utc>>,
}

impl SyncCheckpoint {
    pub fn of(mailbox: &Mailbox) -> Self {
        Self {
            watermark: mailbox.last_synced_at,
            cursor: mailbox.sync_cursor.clone(),
            high_water: mailbox.sync_high_water,
        }
    }

    /// Checkpoint after a run that saw messages up to `latest` and stopped at `next_cursor`
    pub fn advance(&self, latest: Option<DateTime<Utc>>, next_cursor: Option<String>) -> Self {
        let high_water = self.high_water.max(latest);
        match next_cursor {
            Some(cursor) => Self {
                watermark: self.watermark,
                cursor: Some(cursor),
                high_water,
            },
            None => Self {
                watermark: self.watermark.max(high_water),
                cursor: None,
                high_water: None,
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct FetchedPages {
    pub messages: Vec<ProviderMessage>,
    /// Set when the page cap stopped the listing early
    pub next_cursor: Option<String>,
}

/// Read up to `max_pages` pages, resuming from the checkpoint's cursor
///
/// When a lock guard is given, its TTL is pushed out after every page.
pub async fn fetch_pages(
    provider: &dyn EmailProvider,
    grant_id: &str,
    checkpoint: &SyncCheckpoint,
    page_size: u32,
    max_pages: u32,
    mut guard: Option<&mut LockGuard>,
) -> Result<FetchedPages, ServiceError> {
    let mut fetched = FetchedPages::default();
    let mut cursor = checkpoint.cursor.clone();

    for page_number in 0..max_pages.max(1) {
        let page = provider
            .list_messages(grant_id, checkpoint.watermark, cursor.take(), page_size)
            .await?;
        fetched.messages.extend(page.messages);

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }

        if page_number + 1 < max_pages {
            if let Some(guard) = guard.as_deref_mut() {
                let ttl = guard.ttl();
                guard.extend(ttl).await?;
            }
        }
    }

    if cursor.is_some() {
        info!("Page limit reached; the listing resumes from its cursor on the next sync");
    }
    fetched.next_cursor = cursor;
    Ok(fetched)
}

/// Keep the first occurrence of each provider id; returns the kept messages and the drop count
pub fn dedup_batch(messages: Vec<ProviderMessage>) -> (Vec<ProviderMessage>, usize) {
    let total = messages.len();
    let mut seen = HashSet::with_capacity(total);
    let unique: Vec<ProviderMessage> = messages
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .collect();
    let dropped = total - unique.len();
    (unique, dropped)
}

/// Distinct lowercased addresses on a message: sender first, then recipients
pub fn participants_of(message: &ProviderMessage) -> Vec<String> {
    let mut participants = Vec::with_capacity(message.to.len() + 1);
    for address in std::iter::once(&message.from_email).chain(message.to.iter()) {
        let address = normalize_sender(address);
        if !address.is_empty() && !participants.contains(&address) {
            participants.push(address);
        }
    }
    participants
}

pub fn thread_signals(thread: &EmailThread, messages: &[EmailMessage]) -> ThreadSignals {
    ThreadSignals {
        participants: thread.participants.clone(),
        subject: thread.subject.clone(),
        snippets: messages.iter().map(|m| m.snippet.clone()).collect(),
        message_count: messages.len(),
        last_message_at: messages
            .iter()
            .map(|m| m.received_at)
            .max()
            .unwrap_or(thread.last_message_at),
    }
}

#[derive(Clone)]
pub struct MailboxSyncService {
    provider: Arc<dyn EmailProvider>,
    lock: Arc<dyn DistributedLock>,
    emails: EmailRepository,
    screening: ScreeningRepository,
    contacts: ContactRepository,
    billing: BillingService,
    settings: SyncSettings,
}

impl MailboxSyncService {
    pub fn new(
        provider: Arc<dyn EmailProvider>,
        lock: Arc<dyn DistributedLock>,
        emails: EmailRepository,
        screening: ScreeningRepository,
        contacts: ContactRepository,
        billing: BillingService,
        settings: SyncSettings,
    ) -> Self {
        Self {
            provider,
            lock,
            emails,
            screening,
            contacts,
            billing,
            settings,
        }
    }

    /// Sync the mailbox bound to a provider grant, if one is connected
    #[instrument(skip(self))]
    pub async fn sync_grant(&self, grant_id: &str) -> Result<Option<SyncOutcome>, ServiceError> {
        match self.emails.find_mailbox_by_grant(grant_id).await? {
            Some(mailbox) => Ok(Some(self.sync_mailbox(mailbox.id).await?)),
            None => {
                warn!(grant_id = %grant_id, "No mailbox for grant");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(mailbox_id = %mailbox_id))]
    pub async fn sync_mailbox(&self, mailbox_id: Uuid) -> Result<SyncOutcome, ServiceError> {
        let mut guard = match self
            .lock
            .acquire(&lock_resource(mailbox_id), self.settings.lock_ttl)
            .await
        {
            Ok(guard) => guard,
            Err(StorageError::LockHeld(_)) => {
                info!("Mailbox sync already running");
                return Ok(SyncOutcome::AlreadyRunning);
            }
            Err(e) => return Err(e.into()),
        };

        let mailbox = self
            .emails
            .find_mailbox(mailbox_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Mailbox not found: {}", mailbox_id)))?;

        self.emails.set_sync_status(mailbox.id, SyncStatus::Syncing).await?;
        let started = Instant::now();

        let checkpoint = SyncCheckpoint::of(&mailbox);
        let result = match self.run(&mailbox, &checkpoint, &mut guard).await {
            Ok((report, next)) => self
                .emails
                .mark_synced(mailbox.id, &next, report.inserted as i64)
                .await
                .map(|()| report)
                .map_err(ServiceError::from),
            Err(e) => Err(e),
        };
        telemetry::record_sync_duration(started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(report) => {
                telemetry::record_emails_synced(report.inserted as u64);

                if let Err(e) = self
                    .billing
                    .record_usage(mailbox.org_id, UsageMetric::EmailsSynced, report.inserted as i64)
                    .await
                {
                    warn!(error = %e, "Failed to record email usage");
                }

                info!(
                    fetched = report.fetched,
                    inserted = report.inserted,
                    duplicates = report.duplicates,
                    threads = report.threads_touched,
                    elapsed_ms = guard.elapsed().as_millis() as u64,
                    "Mailbox sync completed"
                );
                Ok(SyncOutcome::Completed(report))
            }
            Err(e) => {
                warn!(error = %e, "Mailbox sync failed");
                telemetry::record_sync_failure(failure_reason(&e));
                if let Err(mark_err) = self.emails.mark_failed(mailbox.id, &e.to_string()).await {
                    warn!(error = %mark_err, "Failed to record sync error on mailbox");
                }
                Err(e)
            }
        };

        drop(guard);
        outcome
    }

    async fn run(
        &self,
        mailbox: &Mailbox,
        checkpoint: &SyncCheckpoint,
        guard: &mut LockGuard,
    ) -> Result<(SyncReport, SyncCheckpoint), ServiceError> {
        let fetched = fetch_pages(
            self.provider.as_ref(),
            &mailbox.grant_id,
            checkpoint,
            self.settings.page_size,
            self.settings.max_pages,
            Some(guard),
        )
        .await?;
        let mut report = SyncReport {
            fetched: fetched.messages.len(),
            ..SyncReport::default()
        };
        let latest = fetched.messages.iter().map(|m| m.received_at).max();
        let next = checkpoint.advance(latest, fetched.next_cursor);

        let (batch, dropped) = dedup_batch(fetched.messages);
        report.duplicates = dropped;

        let contact_emails: Vec<String> = self.contacts.list_emails(mailbox.org_id).await?;
        let context = ScoringContext::new(&self.settings.vip_domains, contact_emails.iter().map(String::as_str));

        let senders: Vec<String> = batch
            .iter()
            .map(|m| normalize_sender(&m.from_email))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let decisions = self.screening.decisions_for_senders(mailbox.user_id, &senders).await?;

        let mut touched: HashSet<Uuid> = HashSet::new();

        for message in &batch {
            let sender = normalize_sender(&message.from_email);
            let thread_id = self
                .emails
                .upsert_thread(&ThreadUpsert {
                    org_id: mailbox.org_id,
                    mailbox_id: mailbox.id,
                    provider_thread_id: message.thread_id.clone(),
                    subject: message.subject.clone(),
                    participants: participants_of(message),
                    received_at: message.received_at,
                })
                .await?;

            let classification = classify(&SenderProfile {
                email: sender.clone(),
                display_name: message.from_name.clone(),
                subject: message.subject.clone(),
                body: message.body.clone().unwrap_or_else(|| message.snippet.clone()),
                has_list_unsubscribe: message.has_list_unsubscribe,
                is_known_contact: context.known_contacts.contains(&sender),
            });
            let (placement, auto_classified) = resolve_placement(decisions.get(&sender).copied(), &classification);

            let inserted = self
                .emails
                .insert_message(&NewMessage {
                    org_id: mailbox.org_id,
                    mailbox_id: mailbox.id,
                    thread_id,
                    provider_message_id: message.id.clone(),
                    from_email: sender,
                    from_name: message.from_name.clone(),
                    to_addresses: message.to.clone(),
                    subject: message.subject.clone(),
                    snippet: message.snippet.clone(),
                    body: message.body.clone(),
                    received_at: message.received_at,
                    unread: message.unread,
                    placement,
                    auto_classified,
                })
                .await?;

            if inserted {
                report.inserted += 1;
                touched.insert(thread_id);
            } else {
                report.duplicates += 1;
            }
        }

        let now = Utc::now();
        for thread_id in &touched {
            self.rescore(mailbox.org_id, *thread_id, &context, now).await?;
        }
        report.threads_touched = touched.len();

        Ok((report, next))
    }

    async fn rescore(
        &self,
        org_id: Uuid,
        thread_id: Uuid,
        context: &ScoringContext,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let Some(thread) = self.emails.find_thread(org_id, thread_id).await? else {
            return Ok(());
        };
        let messages = self.emails.list_thread_messages(thread_id).await?;
        let score = score_thread(&thread_signals(&thread, &messages), context, now);

        self.emails
            .update_thread_score(thread_id, messages.len() as i32, i32::from(score.total), score.level)
            .await?;
        Ok(())
    }
}

fn failure_reason(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::Provider(_) => "provider",
        ServiceError::Database(_) => "database",
        ServiceError::Storage(_) => "storage",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::email::provider::{MessagePage, OutgoingMessage};
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn provider_message(id: &str, from: &str, to: &[&str]) -> ProviderMessage {
        ProviderMessage {
            id: id.to_string(),
            thread_id: "t1".to_string(),
            from_email: from.to_string(),
            from_name: None,
            to: to.iter().map(|s| s.to_string()).collect(),
            subject: "Hello".to_string(),
            snippet: String::new(),
            body: None,
            received_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            unread: true,
            has_list_unsubscribe: false,
        }
    }

    #[test]
    fn test_dedup_batch_keeps_first_occurrence() {
        let mut second = provider_message("m1", "b@x.io", &[]);
        second.subject = "Later copy".to_string();
        let batch = vec![
            provider_message("m1", "a@x.io", &[]),
            provider_message("m2", "a@x.io", &[]),
            second,
        ];

        let (unique, dropped) = dedup_batch(batch);
        assert_eq!(dropped, 1);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].subject, "Hello");
        assert_eq!(unique[1].id, "m2");
    }

    #[test]
    fn test_participants_are_normalized_and_distinct() {
        let message = provider_message("m1", "Ada@X.io", &["me@y.io", "ADA@x.io", ""]);
        assert_eq!(participants_of(&message), vec!["ada@x.io".to_string(), "me@y.io".to_string()]);
    }

    #[test]
    fn test_lock_resource_name() {
        let id = Uuid::nil();
        assert_eq!(lock_resource(id), format!("sync:mailbox:{}", id));
    }

    struct HeldLock;

    #[async_trait]
    impl DistributedLock for HeldLock {
        async fn acquire(&self, resource: &str, _ttl: Duration) -> Result<LockGuard, StorageError> {
            Err(StorageError::LockHeld(resource.to_string()))
        }
    }

    #[tokio::test]
    async fn test_held_lock_reports_already_running() {
        use crate::db::repositories::{OrganizationRepository, UsageRepository};
        use crate::db::DbPool;
        use sqlx::postgres::PgPoolOptions;

        let pool = DbPool::from_pool(
            PgPoolOptions::new()
                .connect_lazy("postgres://unused@localhost/unused")
                .unwrap(),
        );
        let provider = super::super::provider::MockEmailProvider::new();
        let contacts = ContactRepository::new(pool.clone());
        let service = MailboxSyncService::new(
            Arc::new(provider),
            Arc::new(HeldLock),
            EmailRepository::new(pool.clone()),
            ScreeningRepository::new(pool.clone()),
            contacts.clone(),
            BillingService::new(
                OrganizationRepository::new(pool.clone()),
                contacts,
                UsageRepository::new(pool),
            ),
            SyncSettings::from(&Settings::default()),
        );

        let outcome = service.sync_mailbox(Uuid::new_v4()).await.unwrap();
        assert_eq!(outcome, SyncOutcome::AlreadyRunning);
    }

    /// Lists newest first with offset cursors, like the Nylas messages endpoint
    struct NewestFirstProvider {
        messages: std::sync::Mutex<Vec<ProviderMessage>>,
    }

    impl NewestFirstProvider {
        fn new(messages: Vec<ProviderMessage>) -> Self {
            Self {
                messages: std::sync::Mutex::new(messages),
            }
        }

        fn deliver(&self, message: ProviderMessage) {
            self.messages.lock().unwrap().push(message);
        }
    }

    #[async_trait]
    impl EmailProvider for NewestFirstProvider {
        async fn list_messages(
            &self,
            _grant_id: &str,
            received_after: Option<DateTime<Utc>>,
            page_token: Option<String>,
            limit: u32,
        ) -> Result<MessagePage, ProviderError> {
            let mut listing: Vec<ProviderMessage> = self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| received_after.map_or(true, |after| m.received_at > after))
                .cloned()
                .collect();
            listing.sort_by(|a, b| b.received_at.cmp(&a.received_at));

            let offset: usize = page_token.map_or(0, |t| t.parse().unwrap());
            let end = (offset + limit as usize).min(listing.len());
            Ok(MessagePage {
                messages: listing[offset.min(end)..end].to_vec(),
                next_cursor: (end < listing.len()).then(|| end.to_string()),
            })
        }

        async fn send_message(&self, _grant_id: &str, _message: OutgoingMessage) -> Result<String, ProviderError> {
            unreachable!("sync never sends")
        }
    }

    fn at_hour(id: &str, hour: u32) -> ProviderMessage {
        let mut message = provider_message(id, "a@x.io", &[]);
        message.received_at = Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap();
        message
    }

    async fn sync_passes(provider: &NewestFirstProvider, passes: usize) -> (Vec<String>, SyncCheckpoint) {
        let mut checkpoint = SyncCheckpoint::default();
        let mut seen = Vec::new();
        for _ in 0..passes {
            let fetched = fetch_pages(provider, "grant", &checkpoint, 2, 1, None).await.unwrap();
            let latest = fetched.messages.iter().map(|m| m.received_at).max();
            seen.extend(fetched.messages.iter().map(|m| m.id.clone()));
            checkpoint = checkpoint.advance(latest, fetched.next_cursor);
        }
        (seen, checkpoint)
    }

    #[tokio::test]
    async fn test_page_cap_does_not_skip_older_messages() {
        let provider = NewestFirstProvider::new(vec![at_hour("m1", 1), at_hour("m2", 2), at_hour("m3", 3)]);

        let (seen, checkpoint) = sync_passes(&provider, 3).await;

        assert_eq!(seen, vec!["m3", "m2", "m1"]);
        assert_eq!(checkpoint.watermark, Some(at_hour("m3", 3).received_at));
        assert_eq!(checkpoint.cursor, None);
        assert_eq!(checkpoint.high_water, None);
    }

    #[tokio::test]
    async fn test_mail_arriving_during_backfill_is_picked_up_afterwards() {
        let provider = NewestFirstProvider::new(vec![at_hour("m1", 1), at_hour("m2", 2), at_hour("m3", 3)]);

        let first = SyncCheckpoint::default();
        let page = fetch_pages(&provider, "grant", &first, 2, 1, None).await.unwrap();
        let latest = page.messages.iter().map(|m| m.received_at).max();
        let mut checkpoint = first.advance(latest, page.next_cursor);
        assert_eq!(checkpoint.watermark, None);
        assert!(checkpoint.cursor.is_some());

        provider.deliver(at_hour("m4", 4));

        let mut seen: HashSet<String> = page.messages.into_iter().map(|m| m.id).collect();
        for _ in 0..3 {
            let fetched = fetch_pages(&provider, "grant", &checkpoint, 2, 1, None).await.unwrap();
            let latest = fetched.messages.iter().map(|m| m.received_at).max();
            seen.extend(fetched.messages.into_iter().map(|m| m.id));
            checkpoint = checkpoint.advance(latest, fetched.next_cursor);
        }

        for id in ["m1", "m2", "m3", "m4"] {
            assert!(seen.contains(id), "{} was never fetched", id);
        }
        assert_eq!(checkpoint.watermark, Some(at_hour("m4", 4).received_at));
    }

    #[test]
    fn test_checkpoint_holds_watermark_until_listing_ends() {
        let start = SyncCheckpoint {
            watermark: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            cursor: None,
            high_water: None,
        };
        let newest = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let partial = start.advance(Some(newest), Some("50".to_string()));
        assert_eq!(partial.watermark, start.watermark);
        assert_eq!(partial.high_water, Some(newest));

        // Older pages do not lower the pending high water
        let older = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let done = partial.advance(Some(older), None);
        assert_eq!(done.watermark, Some(newest));
        assert_eq!(done.cursor, None);

        // Nothing new keeps the watermark
        assert_eq!(done.advance(None, None).watermark, Some(newest));
    }
}
