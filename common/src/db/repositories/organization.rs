// Organization, membership and subscription persistence

use super::queries::organization_queries::SELECT_WITH_PLAN;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{
    MemberChange, MemberChangeDenied, MemberView, Membership, OrgRole, Organization, PlanTier, Subscription,
};
use chrono::NaiveDate;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct OrganizationRepository {
    pool: DbPool,
}

impl OrganizationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Slugs equal to `base` or of the form `base-N`
    #[instrument(skip(self))]
    pub async fn slugs_like(&self, base: &str) -> Result<Vec<String>, DatabaseError> {
        let slugs: Vec<(String,)> =
            sqlx::query_as("SELECT slug FROM organizations WHERE slug = $1 OR slug LIKE $1 || '-%'")
                .bind(base)
                .fetch_all(self.pool.pool())
                .await?;
        Ok(slugs.into_iter().map(|(s,)| s).collect())
    }

    /// Insert the organization, its owner membership and a free subscription together
    #[instrument(skip(self, org), fields(slug = %org.slug))]
    pub async fn create_with_owner(
        &self,
        org: &Organization,
        owner_id: Uuid,
        period_start: NaiveDate,
    ) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, slug, timezone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(org.id)
        .bind(&org.name)
        .bind(&org.slug)
        .bind(&org.timezone)
        .bind(org.created_at)
        .bind(org.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO memberships (org_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(org.id)
            .bind(owner_id)
            .bind(OrgRole::Owner.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO subscriptions (org_id, plan, status, current_period_start) VALUES ($1, $2, 'active', $3)",
        )
        .bind(org.id)
        .bind(org.plan.as_str())
        .bind(period_start)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tracing::info!(org_id = %org.id, slug = %org.slug, owner_id = %owner_id, "Organization created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Organization>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM organizations o LEFT JOIN subscriptions s ON s.org_id = o.id WHERE o.id = $1",
            SELECT_WITH_PLAN
        );
        let org = sqlx::query_as::<_, Organization>(&query)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(org)
    }

    #[instrument(skip(self))]
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Organization>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM organizations o LEFT JOIN subscriptions s ON s.org_id = o.id WHERE o.slug = $1",
            SELECT_WITH_PLAN
        );
        let org = sqlx::query_as::<_, Organization>(&query)
            .bind(slug)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(org)
    }

    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Organization>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM organizations o
            INNER JOIN memberships m ON m.org_id = o.id
            LEFT JOIN subscriptions s ON s.org_id = o.id
            WHERE m.user_id = $1
            ORDER BY m.created_at ASC
            "#,
            SELECT_WITH_PLAN
        );
        let orgs = sqlx::query_as::<_, Organization>(&query)
            .bind(user_id)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(orgs)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: Uuid,
        name: &str,
        timezone: &str,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE organizations SET name = $2, timezone = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(name)
        .bind(timezone)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Organization not found: {}", id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Organization not found: {}", id)));
        }
        tracing::info!(org_id = %id, "Organization deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_membership(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, DatabaseError> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT org_id, user_id, role, created_at FROM memberships WHERE org_id = $1 AND user_id = $2",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(self.pool.pool())
        .await?;
        Ok(membership)
    }

    /// Oldest membership, used when login does not name an organization
    #[instrument(skip(self))]
    pub async fn first_membership(&self, user_id: Uuid) -> Result<Option<Membership>, DatabaseError> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT org_id, user_id, role, created_at
            FROM memberships
            WHERE user_id = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.pool())
        .await?;
        Ok(membership)
    }

    #[instrument(skip(self))]
    pub async fn list_members(&self, org_id: Uuid) -> Result<Vec<MemberView>, DatabaseError> {
        let members = sqlx::query_as::<_, MemberView>(
            r#"
            SELECT u.id AS user_id, u.username, u.email, m.role, m.created_at AS joined_at
            FROM memberships m
            INNER JOIN users u ON u.id = m.user_id
            WHERE m.org_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(org_id)
        .fetch_all(self.pool.pool())
        .await?;
        Ok(members)
    }

    #[instrument(skip(self))]
    pub async fn count_members(&self, org_id: Uuid) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM memberships WHERE org_id = $1")
            .bind(org_id)
            .fetch_one(self.pool.pool())
            .await?;
        Ok(count)
    }

    #[instrument(skip(self))]
    pub async fn add_member(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
    ) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO memberships (org_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(org_id)
            .bind(user_id)
            .bind(role.as_str())
            .execute(self.pool.pool())
            .await?;

        tracing::info!(org_id = %org_id, user_id = %user_id, role = %role, "Member added");
        Ok(())
    }

    /// Apply a role change or removal after checking it against the owner rows
    ///
    /// The owner memberships are locked for the transaction, so two concurrent
    /// demotions cannot both observe a second owner.
    #[instrument(skip(self))]
    pub async fn apply_member_change(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        actor: OrgRole,
        change: MemberChange,
    ) -> Result<Result<(), MemberChangeDenied>, DatabaseError> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT user_id, role FROM memberships
            WHERE org_id = $1 AND (role = 'owner' OR user_id = $2)
            ORDER BY user_id
            FOR UPDATE
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        let owners = rows.iter().filter(|(_, role)| role == OrgRole::Owner.as_str()).count() as i64;
        let current = rows
            .iter()
            .find(|(id, _)| *id == user_id)
            .map(|(_, role)| OrgRole::try_from(role.clone()))
            .transpose()
            .map_err(DatabaseError::QueryFailed)?
            .ok_or_else(|| DatabaseError::NotFound(format!("Membership not found: {}", user_id)))?;

        if let Err(denied) = change.check(actor, current, owners) {
            tx.rollback()
                .await
                .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
            return Ok(Err(denied));
        }

        match change {
            MemberChange::SetRole(role) => {
                sqlx::query("UPDATE memberships SET role = $3 WHERE org_id = $1 AND user_id = $2")
                    .bind(org_id)
                    .bind(user_id)
                    .bind(role.as_str())
                    .execute(&mut *tx)
                    .await?;
            }
            MemberChange::Remove => {
                sqlx::query("DELETE FROM memberships WHERE org_id = $1 AND user_id = $2")
                    .bind(org_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tracing::info!(org_id = %org_id, user_id = %user_id, change = ?change, "Membership changed");
        Ok(Ok(()))
    }

    #[instrument(skip(self))]
    pub async fn get_subscription(&self, org_id: Uuid) -> Result<Option<Subscription>, DatabaseError> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT org_id, plan, status, current_period_start, created_at, updated_at
            FROM subscriptions
            WHERE org_id = $1
            "#,
        )
        .bind(org_id)
        .fetch_optional(self.pool.pool())
        .await?;
        Ok(subscription)
    }

    #[instrument(skip(self))]
    pub async fn set_plan(&self, org_id: Uuid, plan: PlanTier) -> Result<(), DatabaseError> {
        let result =
            sqlx::query("UPDATE subscriptions SET plan = $2, updated_at = NOW() WHERE org_id = $1")
                .bind(org_id)
                .bind(plan.as_str())
                .execute(self.pool.pool())
                .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Subscription not found: {}", org_id)));
        }
        tracing::info!(org_id = %org_id, plan = %plan, "Plan changed");
        Ok(())
    }
}
