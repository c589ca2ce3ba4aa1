use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::string_enum;

string_enum! {
    pub enum CampaignStatus {
        Draft => "draft",
        Active => "active",
        Paused => "paused",
        Completed => "completed",
    }
}

impl CampaignStatus {
    /// Allowed lifecycle moves: draft → active ⇄ paused → completed
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Draft, Active) | (Active, Paused) | (Paused, Active) | (Active, Completed) | (Paused, Completed)
        )
    }
}

string_enum! {
    pub enum CampaignCategory {
        Sales => "sales",
        Support => "support",
        Survey => "survey",
        Reminder => "reminder",
        Recruitment => "recruitment",
        Other => "other",
    }
}

/// AI voice campaign; call placement happens at the telephony provider
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VoiceCampaign {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub goal: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: CampaignStatus,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VoiceCampaign {
    pub fn category(&self) -> Option<CampaignCategory> {
        self.category.as_deref().and_then(|c| c.parse().ok())
    }
}
