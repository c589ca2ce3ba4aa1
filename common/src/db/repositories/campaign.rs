// Voice campaign repository

use super::queries::campaign_queries::SELECT_ALL_COLUMNS;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{CampaignCategory, CampaignStatus, VoiceCampaign};
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct CampaignRepository {
    pool: DbPool,
}

impl CampaignRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, campaign), fields(org_id = %campaign.org_id))]
    pub async fn create(&self, campaign: &VoiceCampaign) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO voice_campaigns (id, org_id, name, description, goal, status, category, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(campaign.id)
        .bind(campaign.org_id)
        .bind(&campaign.name)
        .bind(&campaign.description)
        .bind(&campaign.goal)
        .bind(campaign.status.as_str())
        .bind(&campaign.category)
        .bind(campaign.created_at)
        .bind(campaign.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(campaign_id = %campaign.id, "Campaign created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, org_id: Uuid, id: Uuid) -> Result<Option<VoiceCampaign>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM voice_campaigns WHERE org_id = $1 AND id = $2",
            SELECT_ALL_COLUMNS
        );
        let campaign = sqlx::query_as::<_, VoiceCampaign>(&query)
            .bind(org_id)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(campaign)
    }

    #[instrument(skip(self))]
    pub async fn list(&self, org_id: Uuid) -> Result<Vec<VoiceCampaign>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM voice_campaigns WHERE org_id = $1 ORDER BY created_at DESC",
            SELECT_ALL_COLUMNS
        );
        let campaigns = sqlx::query_as::<_, VoiceCampaign>(&query)
            .bind(org_id)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(campaigns)
    }

    #[instrument(skip(self))]
    pub async fn list_uncategorized(&self, org_id: Uuid) -> Result<Vec<VoiceCampaign>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM voice_campaigns WHERE org_id = $1 AND category IS NULL ORDER BY created_at",
            SELECT_ALL_COLUMNS
        );
        let campaigns = sqlx::query_as::<_, VoiceCampaign>(&query)
            .bind(org_id)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(campaigns)
    }

    #[instrument(skip(self, campaign), fields(campaign_id = %campaign.id))]
    pub async fn update(&self, campaign: &VoiceCampaign) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE voice_campaigns
            SET name = $3, description = $4, goal = $5, category = $6, updated_at = NOW()
            WHERE org_id = $1 AND id = $2
            "#,
        )
        .bind(campaign.org_id)
        .bind(campaign.id)
        .bind(&campaign.name)
        .bind(&campaign.description)
        .bind(&campaign.goal)
        .bind(&campaign.category)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Campaign not found: {}", campaign.id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn update_status(&self, org_id: Uuid, id: Uuid, status: CampaignStatus) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE voice_campaigns SET status = $3, updated_at = NOW() WHERE org_id = $1 AND id = $2",
        )
        .bind(org_id)
        .bind(id)
        .bind(status.as_str())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Campaign not found: {}", id)));
        }
        tracing::info!(campaign_id = %id, status = %status, "Campaign status changed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_category(&self, org_id: Uuid, id: Uuid, category: CampaignCategory) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE voice_campaigns SET category = $3, updated_at = NOW() WHERE org_id = $1 AND id = $2",
        )
        .bind(org_id)
        .bind(id)
        .bind(category.as_str())
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, org_id: Uuid, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM voice_campaigns WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Campaign not found: {}", id)));
        }
        Ok(())
    }
}
