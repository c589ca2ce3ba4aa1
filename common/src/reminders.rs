// Reminders: scheduling rules, dispatch to in-app notifications or email

use crate::db::repositories::{EmailRepository, OrganizationRepository, ReminderRepository};
use crate::email::{EmailProvider, OutgoingMessage};
use crate::errors::{DatabaseError, ProviderError, ServiceError, ValidationError};
use crate::models::{EntityType, Notification, Reminder, ReminderChannel, ReminderStatus};
use crate::telemetry;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReminder {
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub entity_type: Option<EntityType>,
    #[serde(default)]
    pub entity_id: Option<Uuid>,
    pub due_at: DateTime<Utc>,
    #[serde(default)]
    pub remind_before_minutes: i32,
    #[serde(default = "default_channel")]
    pub channel: ReminderChannel,
}

fn default_channel() -> ReminderChannel {
    ReminderChannel::InApp
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    /// Outcomes that could not be written back; those reminders stay pending
    pub unrecorded: usize,
}

/// Build a pending reminder; the due time must lie in the future
pub fn build_reminder(
    org_id: Uuid,
    user_id: Uuid,
    input: NewReminder,
    now: DateTime<Utc>,
) -> Result<Reminder, ValidationError> {
    if input.title.trim().is_empty() {
        return Err(ValidationError::MissingField("title".to_string()));
    }
    if input.due_at <= now {
        return Err(ValidationError::invalid("due_at", "must be in the future"));
    }
    if input.remind_before_minutes < 0 {
        return Err(ValidationError::invalid("remind_before_minutes", "must not be negative"));
    }
    if input.entity_type.is_some() != input.entity_id.is_some() {
        return Err(ValidationError::invalid(
            "entity_id",
            "entity_type and entity_id must be given together",
        ));
    }

    Ok(Reminder {
        id: Uuid::new_v4(),
        org_id,
        user_id,
        title: input.title.trim().to_string(),
        notes: input.notes.filter(|n| !n.trim().is_empty()),
        entity_type: input.entity_type.map(|t| t.as_str().to_string()),
        entity_id: input.entity_id,
        due_at: input.due_at,
        remind_before_minutes: input.remind_before_minutes,
        channel: input.channel,
        status: ReminderStatus::Pending,
        sent_at: None,
        last_error: None,
        created_at: now,
    })
}

/// Message text with the due time shown in the organization's timezone
pub fn render_body(reminder: &Reminder, tz: Tz) -> String {
    let local = reminder.due_at.with_timezone(&tz);
    let mut body = format!("{} is due {}", reminder.title, local.format("%a %d %b %Y, %H:%M %Z"));
    if let Some(notes) = &reminder.notes {
        body.push_str("\n\n");
        body.push_str(notes);
    }
    body
}

#[derive(Clone)]
pub struct ReminderService {
    reminders: ReminderRepository,
}

impl ReminderService {
    pub fn new(reminders: ReminderRepository) -> Self {
        Self { reminders }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, org_id: Uuid, user_id: Uuid, input: NewReminder) -> Result<Reminder, ServiceError> {
        let reminder = build_reminder(org_id, user_id, input, Utc::now())?;
        self.reminders.create(&reminder).await?;
        Ok(reminder)
    }

    pub async fn list_upcoming(&self, org_id: Uuid, user_id: Uuid, limit: i64) -> Result<Vec<Reminder>, ServiceError> {
        Ok(self.reminders.list_upcoming(org_id, user_id, limit).await?)
    }

    async fn owned(&self, org_id: Uuid, user_id: Uuid, id: Uuid) -> Result<Reminder, ServiceError> {
        self.reminders
            .find_for_user(org_id, user_id, id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Reminder not found: {}", id)).into())
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, org_id: Uuid, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let reminder = self.owned(org_id, user_id, id).await?;
        if reminder.status != ReminderStatus::Pending {
            return Err(ValidationError::invalid("status", format!("reminder is already {}", reminder.status)).into());
        }
        let cancelled = self
            .reminders
            .finish_pending(id, reminder.due_at, ReminderStatus::Cancelled, None, None)
            .await?;
        if !cancelled {
            return Err(ValidationError::invalid("status", "reminder changed while cancelling").into());
        }
        Ok(())
    }

    /// Move the due time and make the reminder pending again
    #[instrument(skip(self))]
    pub async fn snooze(&self, org_id: Uuid, user_id: Uuid, id: Uuid, due_at: DateTime<Utc>) -> Result<(), ServiceError> {
        self.owned(org_id, user_id, id).await?;
        if due_at <= Utc::now() {
            return Err(ValidationError::invalid("due_at", "must be in the future").into());
        }
        self.reminders.reschedule(id, due_at).await?;
        Ok(())
    }

    pub async fn notifications(&self, org_id: Uuid, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>, ServiceError> {
        Ok(self.reminders.list_notifications(org_id, user_id, unread_only).await?)
    }

    pub async fn mark_notification_read(&self, org_id: Uuid, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        self.reminders.mark_notification_read(org_id, user_id, id).await?;
        Ok(())
    }
}

/// Sends due reminders in batches for the worker
#[derive(Clone)]
pub struct ReminderDispatcher {
    reminders: ReminderRepository,
    organizations: OrganizationRepository,
    emails: EmailRepository,
    provider: Arc<dyn EmailProvider>,
}

impl ReminderDispatcher {
    pub fn new(
        reminders: ReminderRepository,
        organizations: OrganizationRepository,
        emails: EmailRepository,
        provider: Arc<dyn EmailProvider>,
    ) -> Self {
        Self {
            reminders,
            organizations,
            emails,
            provider,
        }
    }

    async fn timezone(&self, cache: &mut HashMap<Uuid, Tz>, org_id: Uuid) -> Tz {
        if let Some(tz) = cache.get(&org_id) {
            return *tz;
        }
        let tz = match self.organizations.find_by_id(org_id).await {
            Ok(Some(org)) => org.tz(),
            Ok(None) => chrono_tz::UTC,
            Err(e) => {
                warn!(org_id = %org_id, error = %e, "Falling back to UTC for reminder");
                chrono_tz::UTC
            }
        };
        cache.insert(org_id, tz);
        tz
    }

    async fn deliver(&self, reminder: &Reminder, body: String) -> Result<(), ServiceError> {
        match reminder.channel {
            ReminderChannel::InApp => {
                self.reminders
                    .create_notification(&Notification {
                        id: Uuid::new_v4(),
                        org_id: reminder.org_id,
                        user_id: reminder.user_id,
                        title: reminder.title.clone(),
                        body,
                        read_at: None,
                        created_at: Utc::now(),
                    })
                    .await?;
            }
            ReminderChannel::Email => {
                let mailbox = self
                    .emails
                    .primary_mailbox(reminder.org_id, reminder.user_id)
                    .await?
                    .ok_or_else(|| ProviderError::NoMailbox(reminder.user_id.to_string()))?;
                self.provider
                    .send_message(
                        &mailbox.grant_id,
                        OutgoingMessage {
                            to: vec![mailbox.email_address.clone()],
                            subject: format!("Reminder: {}", reminder.title),
                            body,
                            reply_to_message_id: None,
                        },
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Deliver up to `batch` due reminders; one failure does not stop the rest
    #[instrument(skip(self))]
    pub async fn dispatch_due(&self, now: DateTime<Utc>, batch: i64) -> Result<DispatchReport, ServiceError> {
        let due = self.reminders.list_due(now, batch).await?;
        let mut report = DispatchReport::default();
        let mut zones = HashMap::new();

        for reminder in due.iter().filter(|r| r.is_due(now)) {
            let tz = self.timezone(&mut zones, reminder.org_id).await;
            let body = render_body(reminder, tz);

            let (status, sent_at, last_error) = match self.deliver(reminder, body).await {
                Ok(()) => {
                    telemetry::record_reminder_sent();
                    report.sent += 1;
                    (ReminderStatus::Sent, Some(Utc::now()), None)
                }
                Err(e) => {
                    warn!(reminder_id = %reminder.id, error = %e, "Reminder delivery failed");
                    telemetry::record_reminder_failed();
                    report.failed += 1;
                    (ReminderStatus::Failed, None, Some(e.to_string()))
                }
            };

            match self
                .reminders
                .finish_pending(reminder.id, reminder.due_at, status, sent_at, last_error.as_deref())
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    info!(reminder_id = %reminder.id, "Reminder changed during dispatch; keeping its new state");
                }
                Err(e) => {
                    warn!(reminder_id = %reminder.id, error = %e, "Failed to record reminder outcome");
                    report.unrecorded += 1;
                }
            }
        }

        if report.sent + report.failed > 0 {
            info!(
                sent = report.sent,
                failed = report.failed,
                unrecorded = report.unrecorded,
                "Reminders dispatched"
            );
        }
        Ok(report)
    }
}
