use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::billing::PlanTier;
use super::string_enum;

/// Organization is the tenant boundary; every business row carries its id
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub timezone: String,
    /// Plan tier, read from the organization's subscription row
    #[sqlx(try_from = "String")]
    pub plan: PlanTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// Parsed timezone, falling back to UTC for unknown names
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

string_enum! {
    /// Role a user holds inside one organization
    pub enum OrgRole {
        Owner => "owner",
        Admin => "admin",
        Member => "member",
        Viewer => "viewer",
    }
}

const READ_PERMISSIONS: &[&str] = &[
    "crm:read",
    "email:read",
    "onboarding:read",
    "campaign:read",
    "reminder:read",
    "org:read",
];

const MEMBER_PERMISSIONS: &[&str] = &[
    "crm:write",
    "email:write",
    "onboarding:write",
    "campaign:write",
    "reminder:write",
];

const ADMIN_PERMISSIONS: &[&str] = &["org:manage", "billing:read", "crm:delete", "campaign:delete"];

const OWNER_PERMISSIONS: &[&str] = &["billing:manage", "org:delete"];

impl OrgRole {
    /// Permissions granted by this role; each role includes the ones below it
    pub fn permissions(&self) -> Vec<String> {
        let layers: &[&[&str]] = match self {
            OrgRole::Viewer => &[READ_PERMISSIONS],
            OrgRole::Member => &[READ_PERMISSIONS, MEMBER_PERMISSIONS],
            OrgRole::Admin => &[READ_PERMISSIONS, MEMBER_PERMISSIONS, ADMIN_PERMISSIONS],
            OrgRole::Owner => &[
                READ_PERMISSIONS,
                MEMBER_PERMISSIONS,
                ADMIN_PERMISSIONS,
                OWNER_PERMISSIONS,
            ],
        };
        layers
            .iter()
            .flat_map(|layer| layer.iter().map(|p| p.to_string()))
            .collect()
    }

    pub fn can_manage_members(&self) -> bool {
        matches!(self, OrgRole::Owner | OrgRole::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub org_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub role: OrgRole,
    pub created_at: DateTime<Utc>,
}

/// A change to an existing membership
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberChange {
    SetRole(OrgRole),
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberChangeDenied {
    /// Only owners may grant, revoke or remove ownership
    OwnerOnly,
    /// The organization would be left without an owner
    LastOwner,
}

impl MemberChange {
    /// Check a change made by `actor` to a member who currently holds `current`,
    /// given the organization's owner count
    pub fn check(&self, actor: OrgRole, current: OrgRole, owners: i64) -> Result<(), MemberChangeDenied> {
        let grants_owner = matches!(self, MemberChange::SetRole(OrgRole::Owner));
        if (current == OrgRole::Owner || grants_owner) && actor != OrgRole::Owner {
            return Err(MemberChangeDenied::OwnerOnly);
        }
        if current == OrgRole::Owner && !grants_owner && owners <= 1 {
            return Err(MemberChangeDenied::LastOwner);
        }
        Ok(())
    }
}

/// Membership joined with the user's public profile
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MemberView {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: OrgRole,
    pub joined_at: DateTime<Utc>,
}

/// User represents a login account; organization access comes from memberships
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// UserClaims represents JWT token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,              // Subject (user ID)
    pub username: String,         // Username
    #[serde(default)]
    pub org_id: Option<Uuid>,     // Active organization
    #[serde(default)]
    pub role: Option<OrgRole>,    // Role in the active organization
    pub permissions: Vec<String>, // Permissions derived from the role
    pub exp: i64,                 // Expiration time (Unix timestamp)
    pub iat: i64,                 // Issued at (Unix timestamp)
}

impl UserClaims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}
