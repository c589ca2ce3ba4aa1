// Organization lifecycle and membership management

use crate::billing::{period_start, BillingService};
use crate::db::repositories::{OrganizationRepository, UserRepository};
use crate::errors::{AuthError, BillingError, DatabaseError, ServiceError, ValidationError};
use crate::models::{MemberChange, MemberChangeDenied, MemberView, OrgRole, Organization, PlanTier, UsageMetric};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

/// URL-safe slug: lowercase ASCII alphanumerics separated by single dashes
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "org".to_string()
    } else {
        slug
    }
}

/// `base`, or `base-N` with the smallest N ≥ 2 not in `taken`
pub fn unique_slug(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|s| s == base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| format!("{}-{}", base, Uuid::new_v4().simple()))
}

#[derive(Clone)]
pub struct OrganizationService {
    organizations: OrganizationRepository,
    users: UserRepository,
    billing: BillingService,
}

impl OrganizationService {
    pub fn new(
        organizations: OrganizationRepository,
        users: UserRepository,
        billing: BillingService,
    ) -> Self {
        Self {
            organizations,
            users,
            billing,
        }
    }

    #[instrument(skip(self))]
    pub async fn create_organization(
        &self,
        owner_id: Uuid,
        name: &str,
        timezone: Option<&str>,
    ) -> Result<Organization, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name".to_string()).into());
        }

        let timezone = match timezone.map(str::trim).filter(|tz| !tz.is_empty()) {
            Some(tz) => {
                tz.parse::<chrono_tz::Tz>()
                    .map_err(|_| ValidationError::invalid("timezone", format!("unknown timezone {}", tz)))?;
                tz.to_string()
            }
            None => "UTC".to_string(),
        };

        let base = slugify(name);
        let taken = self.organizations.slugs_like(&base).await?;
        let now = Utc::now();

        let org = Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: unique_slug(&base, &taken),
            timezone,
            plan: PlanTier::Free,
            created_at: now,
            updated_at: now,
        };

        self.organizations
            .create_with_owner(&org, owner_id, period_start(now))
            .await?;

        Ok(org)
    }

    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Organization>, ServiceError> {
        Ok(self.organizations.list_for_user(user_id).await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, org_id: Uuid) -> Result<Organization, ServiceError> {
        self.organizations
            .find_by_id(org_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Organization not found: {}", org_id)).into())
    }

    #[instrument(skip(self))]
    pub async fn update(&self, org_id: Uuid, name: &str, timezone: &str) -> Result<Organization, ServiceError> {
        if name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()).into());
        }
        timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| ValidationError::invalid("timezone", format!("unknown timezone {}", timezone)))?;

        self.organizations.update(org_id, name.trim(), timezone).await?;
        self.get(org_id).await
    }

    #[instrument(skip(self))]
    pub async fn list_members(&self, org_id: Uuid) -> Result<Vec<MemberView>, ServiceError> {
        Ok(self.organizations.list_members(org_id).await?)
    }

    /// Add an existing user by email; counts against the plan's seats
    #[instrument(skip(self))]
    pub async fn add_member(&self, org_id: Uuid, email: &str, role: OrgRole) -> Result<(), ServiceError> {
        let user = self
            .users
            .find_by_email(email.trim())
            .await?
            .ok_or_else(|| AuthError::UserNotFound(email.to_string()))?;

        if self.organizations.get_membership(org_id, user.id).await?.is_some() {
            return Err(DatabaseError::DuplicateKey(format!("{} is already a member", email)).into());
        }

        let seats = self.billing.check_usage(org_id, UsageMetric::Seats, 1).await?;
        if !seats.allowed {
            return Err(BillingError::LimitExceeded {
                metric: UsageMetric::Seats.to_string(),
                used: seats.used,
                limit: seats.limit.unwrap_or_default(),
            }
            .into());
        }

        self.organizations.add_member(org_id, user.id, role).await?;
        Ok(())
    }

    /// `actor` is the caller's role; only owners may touch ownership
    #[instrument(skip(self))]
    pub async fn update_member_role(
        &self,
        org_id: Uuid,
        actor: OrgRole,
        user_id: Uuid,
        role: OrgRole,
    ) -> Result<(), ServiceError> {
        let outcome = self
            .organizations
            .apply_member_change(org_id, user_id, actor, MemberChange::SetRole(role))
            .await?;
        outcome.map_err(denied)
    }

    #[instrument(skip(self))]
    pub async fn remove_member(&self, org_id: Uuid, actor: OrgRole, user_id: Uuid) -> Result<(), ServiceError> {
        let outcome = self
            .organizations
            .apply_member_change(org_id, user_id, actor, MemberChange::Remove)
            .await?;
        outcome.map_err(denied)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, org_id: Uuid) -> Result<(), ServiceError> {
        self.organizations.delete(org_id).await?;
        Ok(())
    }
}

fn denied(reason: MemberChangeDenied) -> ServiceError {
    match reason {
        MemberChangeDenied::OwnerOnly => AuthError::InsufficientPermissions("owner".to_string()).into(),
        MemberChangeDenied::LastOwner => {
            ValidationError::ConstraintViolation("an organization must keep at least one owner".to_string()).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_slugify_examples() {
        assert_eq!(slugify("Acme Corp"), "acme-corp");
        assert_eq!(slugify("  Hello,   World!! "), "hello-world");
        assert_eq!(slugify("Café Déjà Vu"), "caf-d-j-vu");
        assert_eq!(slugify("!!!"), "org");
        assert_eq!(slugify(""), "org");
    }

    #[test]
    fn test_unique_slug_appends_counter() {
        assert_eq!(unique_slug("acme", &[]), "acme");
        let taken = vec!["acme".to_string(), "acme-2".to_string()];
        assert_eq!(unique_slug("acme", &taken), "acme-3");
        let gap = vec!["acme".to_string(), "acme-3".to_string()];
        assert_eq!(unique_slug("acme", &gap), "acme-2");
    }

    proptest! {
        /// Slugs never start or end with a dash and never contain "--"
        #[test]
        fn prop_slug_shape(name in ".{0,40}") {
            let slug = slugify(&name);
            prop_assert!(!slug.is_empty());
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }
    }
}
