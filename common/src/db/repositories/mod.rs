// Repository layer; every business query is scoped by org_id

pub mod activity;
pub mod audit;
pub mod campaign;
pub mod contact;
pub mod deal;
pub mod email;
pub mod onboarding;
pub mod organization;
pub mod queries;
pub mod reminder;
pub mod screening;
pub mod usage;
pub mod user;

pub use activity::ActivityRepository;
pub use audit::AuditRepository;
pub use campaign::CampaignRepository;
pub use contact::{ContactFilter, ContactRepository};
pub use deal::DealRepository;
pub use email::{EmailRepository, NewMessage, ThreadUpsert};
pub use onboarding::{OnboardingRepository, ProjectRepository, TaskRepository};
pub use organization::OrganizationRepository;
pub use reminder::ReminderRepository;
pub use screening::{ScreenerSender, ScreeningRepository};
pub use usage::UsageRepository;
pub use user::UserRepository;

use serde::Deserialize;

/// Limit/offset pagination from query strings
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl Pagination {
    pub const MAX_LIMIT: i64 = 200;

    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }.clamped()
    }

    /// Limit within 1..=MAX_LIMIT, offset non-negative
    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.clamp(1, Self::MAX_LIMIT),
            offset: self.offset.max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_is_clamped() {
        let page = Pagination::new(10_000, -5);
        assert_eq!(page.limit, Pagination::MAX_LIMIT);
        assert_eq!(page.offset, 0);
        assert_eq!(Pagination::new(0, 3).limit, 1);
    }
}
