use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::string_enum;

string_enum! {
    pub enum ReminderChannel {
        Email => "email",
        InApp => "in_app",
    }
}

string_enum! {
    pub enum ReminderStatus {
        Pending => "pending",
        Sent => "sent",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

string_enum! {
    /// Record a reminder can point at
    pub enum EntityType {
        Deal => "deal",
        Contact => "contact",
        Task => "task",
        Project => "project",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reminder {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub notes: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub due_at: DateTime<Utc>,
    pub remind_before_minutes: i32,
    #[sqlx(try_from = "String")]
    pub channel: ReminderChannel,
    #[sqlx(try_from = "String")]
    pub status: ReminderStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    /// Moment the reminder should fire
    pub fn notify_at(&self) -> DateTime<Utc> {
        self.due_at - Duration::minutes(i64::from(self.remind_before_minutes))
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ReminderStatus::Pending && self.notify_at() <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
