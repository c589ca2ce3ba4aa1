// Email client: provider seam, Nylas client, mailbox sync and AI-assisted actions

pub mod nylas;
pub mod provider;
pub mod sync;

pub use nylas::NylasClient;
pub use provider::{EmailProvider, MessagePage, OutgoingMessage, ProviderMessage};
pub use sync::{MailboxSyncService, SyncCheckpoint, SyncOutcome, SyncReport, SyncSettings};

#[cfg(any(test, feature = "test-doubles"))]
pub use provider::MockEmailProvider;

use crate::billing::BillingService;
use crate::db::repositories::{EmailRepository, Pagination};
use crate::errors::{DatabaseError, ProviderError, ServiceError, ValidationError};
use crate::llm::{reply_prompt, summary_prompt, LlmClient, REPLY_SYSTEM, SUMMARY_SYSTEM};
use crate::models::{EmailMessage, EmailThread, Mailbox, Placement, SyncStatus, UsageMetric};
use crate::screening::normalize_sender;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct ThreadView {
    pub thread: EmailThread,
    pub messages: Vec<EmailMessage>,
}

/// `Re: subject`, without stacking prefixes
pub fn reply_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    if trimmed.get(..3).map_or(false, |prefix| prefix.eq_ignore_ascii_case("re:")) {
        trimmed.to_string()
    } else {
        format!("Re: {}", trimmed)
    }
}

/// Who a reply goes to: the latest sender that is not the mailbox owner,
/// falling back to the latest message's recipients
pub fn reply_recipients(messages: &[EmailMessage], own_address: &str) -> Vec<String> {
    let own = normalize_sender(own_address);
    let Some(latest) = messages.iter().max_by_key(|m| m.received_at) else {
        return Vec::new();
    };

    if normalize_sender(&latest.from_email) != own {
        return vec![latest.from_email.clone()];
    }
    latest
        .to_addresses
        .iter()
        .filter(|a| normalize_sender(a) != own)
        .cloned()
        .collect()
}

#[derive(Clone)]
pub struct EmailService {
    emails: EmailRepository,
    provider: Arc<dyn EmailProvider>,
    llm: Arc<dyn LlmClient>,
    billing: BillingService,
}

impl EmailService {
    pub fn new(
        emails: EmailRepository,
        provider: Arc<dyn EmailProvider>,
        llm: Arc<dyn LlmClient>,
        billing: BillingService,
    ) -> Self {
        Self {
            emails,
            provider,
            llm,
            billing,
        }
    }

    /// Store a provider grant as a mailbox for the user
    #[instrument(skip(self))]
    pub async fn connect_mailbox(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        grant_id: &str,
        email_address: &str,
    ) -> Result<Mailbox, ServiceError> {
        if grant_id.trim().is_empty() {
            return Err(ValidationError::MissingField("grant_id".to_string()).into());
        }
        let email_address = normalize_sender(email_address);
        if !email_address.contains('@') {
            return Err(ValidationError::invalid("email_address", "not an email address").into());
        }

        let now = Utc::now();
        let mailbox = Mailbox {
            id: Uuid::new_v4(),
            org_id,
            user_id,
            provider: "nylas".to_string(),
            grant_id: grant_id.trim().to_string(),
            email_address,
            sync_status: SyncStatus::Idle,
            last_synced_at: None,
            sync_cursor: None,
            sync_high_water: None,
            last_error: None,
            messages_synced: 0,
            created_at: now,
            updated_at: now,
        };
        self.emails.create_mailbox(&mailbox).await?;
        Ok(mailbox)
    }

    pub async fn list_mailboxes(&self, org_id: Uuid, user_id: Uuid) -> Result<Vec<Mailbox>, ServiceError> {
        Ok(self.emails.list_mailboxes_for_user(org_id, user_id).await?)
    }

    /// Current sync state, polled by clients after triggering a sync
    pub async fn mailbox(&self, org_id: Uuid, user_id: Uuid, mailbox_id: Uuid) -> Result<Mailbox, ServiceError> {
        self.emails
            .find_mailbox_for_user(org_id, user_id, mailbox_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Mailbox not found: {}", mailbox_id)).into())
    }

    pub async fn list_by_placement(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        placement: Placement,
        page: Pagination,
    ) -> Result<Vec<EmailMessage>, ServiceError> {
        Ok(self.emails.list_by_placement(org_id, user_id, placement, page).await?)
    }

    pub async fn list_important_threads(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        page: Pagination,
    ) -> Result<Vec<EmailThread>, ServiceError> {
        Ok(self.emails.list_threads_by_importance(org_id, user_id, page).await?)
    }

    #[instrument(skip(self))]
    pub async fn thread(&self, org_id: Uuid, user_id: Uuid, thread_id: Uuid) -> Result<ThreadView, ServiceError> {
        let thread = self
            .emails
            .find_thread_for_user(org_id, user_id, thread_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Thread not found: {}", thread_id)))?;
        let messages = self.emails.list_thread_messages(thread.id).await?;
        Ok(ThreadView { thread, messages })
    }

    pub async fn mark_read(&self, org_id: Uuid, user_id: Uuid, message_id: Uuid, read: bool) -> Result<(), ServiceError> {
        self.emails.set_unread(org_id, user_id, message_id, !read).await?;
        Ok(())
    }

    /// Summarize a thread with the LLM and store the summary; counts one AI request
    #[instrument(skip(self))]
    pub async fn summarize_thread(&self, org_id: Uuid, user_id: Uuid, thread_id: Uuid) -> Result<String, ServiceError> {
        let view = self.thread(org_id, user_id, thread_id).await?;
        self.billing.enforce(org_id, UsageMetric::AiRequests, 1).await?;

        let summary = self
            .llm
            .complete(SUMMARY_SYSTEM, &summary_prompt(&view.thread, &view.messages))
            .await?;
        self.emails.update_thread_summary(thread_id, &summary).await?;
        Ok(summary)
    }

    /// Draft a reply to the latest message; nothing is sent
    #[instrument(skip(self, instructions))]
    pub async fn draft_reply(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        thread_id: Uuid,
        instructions: Option<&str>,
    ) -> Result<String, ServiceError> {
        let view = self.thread(org_id, user_id, thread_id).await?;
        self.billing.enforce(org_id, UsageMetric::AiRequests, 1).await?;

        Ok(self
            .llm
            .complete(REPLY_SYSTEM, &reply_prompt(&view.thread, &view.messages, instructions))
            .await?)
    }

    /// Send `body` as a reply on the thread through the mailbox's grant
    #[instrument(skip(self, body))]
    pub async fn send_reply(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        thread_id: Uuid,
        body: &str,
    ) -> Result<String, ServiceError> {
        if body.trim().is_empty() {
            return Err(ValidationError::MissingField("body".to_string()).into());
        }

        let view = self.thread(org_id, user_id, thread_id).await?;
        let mailbox = self
            .emails
            .find_mailbox(view.thread.mailbox_id)
            .await?
            .ok_or_else(|| ProviderError::NoMailbox(user_id.to_string()))?;

        let to = reply_recipients(&view.messages, &mailbox.email_address);
        if to.is_empty() {
            return Err(ValidationError::invalid("thread", "no recipient to reply to").into());
        }

        let latest_id = view
            .messages
            .iter()
            .max_by_key(|m| m.received_at)
            .map(|m| m.provider_message_id.clone());

        let sent_id = self
            .provider
            .send_message(
                &mailbox.grant_id,
                OutgoingMessage {
                    to,
                    subject: reply_subject(&view.thread.subject),
                    body: body.to_string(),
                    reply_to_message_id: latest_id,
                },
            )
            .await?;

        tracing::info!(thread_id = %thread_id, provider_id = %sent_id, "Reply sent");
        Ok(sent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn message(from: &str, to: &[&str], minutes_ago: i64) -> EmailMessage {
        EmailMessage {
            id: Uuid::new_v4(),
            org_id: Uuid::nil(),
            mailbox_id: Uuid::nil(),
            thread_id: Uuid::nil(),
            provider_message_id: format!("m-{}", minutes_ago),
            from_email: from.to_string(),
            from_name: None,
            to_addresses: to.iter().map(|s| s.to_string()).collect(),
            subject: "Hello".to_string(),
            snippet: String::new(),
            body: None,
            received_at: Utc::now() - Duration::minutes(minutes_ago),
            unread: false,
            placement: Placement::Imbox,
            auto_classified: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_reply_subject_does_not_stack() {
        assert_eq!(reply_subject("Quarterly plan"), "Re: Quarterly plan");
        assert_eq!(reply_subject("RE: Quarterly plan"), "RE: Quarterly plan");
        assert_eq!(reply_subject("  re: x "), "re: x");
    }

    #[test]
    fn test_reply_goes_to_latest_external_sender() {
        let messages = vec![
            message("ada@x.io", &["me@y.io"], 30),
            message("grace@x.io", &["me@y.io"], 5),
        ];
        assert_eq!(reply_recipients(&messages, "me@y.io"), vec!["grace@x.io".to_string()]);
    }

    #[test]
    fn test_reply_after_own_message_targets_its_recipients() {
        let messages = vec![
            message("ada@x.io", &["me@y.io"], 30),
            message("Me@Y.io", &["ada@x.io", "me@y.io"], 1),
        ];
        assert_eq!(reply_recipients(&messages, "me@y.io"), vec!["ada@x.io".to_string()]);
        assert!(reply_recipients(&[], "me@y.io").is_empty());
    }
}
