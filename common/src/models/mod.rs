// Domain models shared by the api and worker binaries
// Enums are persisted as TEXT and parsed back through `TryFrom<String>`

pub mod billing;
pub mod campaign;
pub mod crm;
pub mod email;
pub mod onboarding;
pub mod organization;
pub mod reminder;

pub use billing::{PlanTier, Subscription, UsageMetric, UsageRecord};
pub use campaign::{CampaignCategory, CampaignStatus, VoiceCampaign};
pub use crm::{Activity, ActivityKind, Contact, ContactStatus, Deal, DealStage};
pub use email::{
    EmailMessage, EmailThread, ImportanceLevel, Mailbox, Placement, ScreeningBucket,
    ScreeningDecision, SyncStatus,
};
pub use onboarding::{
    ConditionOperator, FieldCondition, FieldKind, FormField, OnboardingSession, OnboardingStep,
    OnboardingTemplate, Project, ProjectStatus, SessionStatus, Task, TaskPriority, TaskRule,
    TaskStatus, VisibilityRule,
};
pub use organization::{
    MemberChange, MemberChangeDenied, Membership, MemberView, OrgRole, Organization, User, UserClaims,
};
pub use reminder::{EntityType, Notification, Reminder, ReminderChannel, ReminderStatus};

/// Declares a fieldless enum stored as a snake_case string.
///
/// Generates `as_str`, `ALL`, `Display`, `FromStr` and `TryFrom<String>` so the
/// type can be bound as `&str` and decoded with `#[sqlx(try_from = "String")]`.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, String> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(s: String) -> Result<Self, String> {
                s.parse()
            }
        }
    };
}

pub(crate) use string_enum;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_enum_round_trip_through_text() {
        for stage in DealStage::ALL {
            let parsed: DealStage = stage.as_str().parse().unwrap();
            assert_eq!(parsed, *stage);
        }
        assert!("won".parse::<DealStage>().is_err());
    }

    #[test]
    fn test_string_enum_serde_matches_as_str() {
        let json = serde_json::to_string(&Placement::PaperTrail).unwrap();
        assert_eq!(json, "\"paper_trail\"");
        let back: Placement = serde_json::from_str("\"screener\"").unwrap();
        assert_eq!(back, Placement::Screener);
    }

    #[test]
    fn test_enum_with_error_variant_decodes_from_text() {
        assert_eq!(SyncStatus::try_from("error".to_string()), Ok(SyncStatus::Error));
        assert!(SyncStatus::try_from("broken".to_string()).is_err());
    }
}
