// Voice campaign lifecycle and LLM-assisted categorization

use crate::billing::BillingService;
use crate::db::repositories::CampaignRepository;
use crate::errors::{DatabaseError, LlmError, ServiceError, ValidationError};
use crate::llm::{category_prompt, parse_category, LlmClient, CATEGORY_SYSTEM};
use crate::models::{CampaignCategory, CampaignStatus, UsageMetric, VoiceCampaign};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub category: Option<CampaignCategory>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizeReport {
    pub processed: usize,
    pub categorized: usize,
    pub failed: usize,
}

/// Ask the model for a category and map its answer onto the known set
pub async fn categorize(llm: &dyn LlmClient, campaign: &VoiceCampaign) -> Result<CampaignCategory, LlmError> {
    let answer = llm.complete(CATEGORY_SYSTEM, &category_prompt(campaign)).await?;
    Ok(parse_category(&answer, CampaignCategory::ALL))
}

#[derive(Clone)]
pub struct CampaignService {
    campaigns: CampaignRepository,
    llm: Arc<dyn LlmClient>,
    billing: BillingService,
}

impl CampaignService {
    pub fn new(campaigns: CampaignRepository, llm: Arc<dyn LlmClient>, billing: BillingService) -> Self {
        Self {
            campaigns,
            llm,
            billing,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, org_id: Uuid, input: CampaignInput) -> Result<VoiceCampaign, ServiceError> {
        if input.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()).into());
        }
        let now = Utc::now();
        let campaign = VoiceCampaign {
            id: Uuid::new_v4(),
            org_id,
            name: input.name.trim().to_string(),
            description: input.description,
            goal: input.goal,
            status: CampaignStatus::Draft,
            category: input.category.map(|c| c.as_str().to_string()),
            created_at: now,
            updated_at: now,
        };
        self.campaigns.create(&campaign).await?;
        Ok(campaign)
    }

    pub async fn get(&self, org_id: Uuid, id: Uuid) -> Result<VoiceCampaign, ServiceError> {
        self.campaigns
            .find_by_id(org_id, id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Campaign not found: {}", id)).into())
    }

    pub async fn list(&self, org_id: Uuid) -> Result<Vec<VoiceCampaign>, ServiceError> {
        Ok(self.campaigns.list(org_id).await?)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, org_id: Uuid, id: Uuid, input: CampaignInput) -> Result<VoiceCampaign, ServiceError> {
        if input.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()).into());
        }
        let mut campaign = self.get(org_id, id).await?;
        campaign.name = input.name.trim().to_string();
        campaign.description = input.description;
        campaign.goal = input.goal;
        if let Some(category) = input.category {
            campaign.category = Some(category.as_str().to_string());
        }
        campaign.updated_at = Utc::now();

        self.campaigns.update(&campaign).await?;
        Ok(campaign)
    }

    /// Move to `next` when the lifecycle allows it
    #[instrument(skip(self))]
    pub async fn change_status(&self, org_id: Uuid, id: Uuid, next: CampaignStatus) -> Result<VoiceCampaign, ServiceError> {
        let mut campaign = self.get(org_id, id).await?;
        if !campaign.status.can_transition_to(next) {
            return Err(ValidationError::invalid(
                "status",
                format!("cannot move campaign from {} to {}", campaign.status, next),
            )
            .into());
        }
        self.campaigns.update_status(org_id, id, next).await?;
        campaign.status = next;
        Ok(campaign)
    }

    pub async fn delete(&self, org_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        self.campaigns.delete(org_id, id).await?;
        Ok(())
    }

    /// Categorize every uncategorized campaign; failures are counted, not fatal
    #[instrument(skip(self))]
    pub async fn bulk_categorize(&self, org_id: Uuid) -> Result<CategorizeReport, ServiceError> {
        let pending = self.campaigns.list_uncategorized(org_id).await?;
        let mut report = CategorizeReport::default();

        for campaign in &pending {
            report.processed += 1;

            if let Err(e) = self.billing.enforce(org_id, UsageMetric::AiRequests, 1).await {
                warn!(campaign_id = %campaign.id, error = %e, "AI request quota unavailable");
                report.failed += 1;
                continue;
            }

            let category = match categorize(self.llm.as_ref(), campaign).await {
                Ok(category) => category,
                Err(e) => {
                    warn!(campaign_id = %campaign.id, error = %e, "Campaign categorization failed");
                    report.failed += 1;
                    continue;
                }
            };

            match self.campaigns.set_category(org_id, campaign.id, category).await {
                Ok(()) => report.categorized += 1,
                Err(e) => {
                    warn!(campaign_id = %campaign.id, error = %e, "Failed to store campaign category");
                    report.failed += 1;
                }
            }
        }

        info!(
            processed = report.processed,
            categorized = report.categorized,
            failed = report.failed,
            "Bulk categorization finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use mockall::predicate::*;

    fn campaign(name: &str) -> VoiceCampaign {
        VoiceCampaign {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            name: name.to_string(),
            description: Some("Call churned customers about the new plan".to_string()),
            goal: None,
            status: CampaignStatus::Draft,
            category: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_categorize_maps_model_answer() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .with(eq(CATEGORY_SYSTEM), function(|prompt: &str| prompt.contains("Win-back")))
            .times(1)
            .returning(|_, _| Ok("Sales.".to_string()));

        let category = categorize(&llm, &campaign("Win-back")).await.unwrap();
        assert_eq!(category, CampaignCategory::Sales);
    }

    #[tokio::test]
    async fn test_categorize_unknown_answer_is_other() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .returning(|_, _| Ok("I cannot tell".to_string()));

        let category = categorize(&llm, &campaign("Mystery")).await.unwrap();
        assert_eq!(category, CampaignCategory::Other);
    }

    #[tokio::test]
    async fn test_categorize_propagates_llm_error() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .returning(|_, _| Err(LlmError::EmptyResponse));

        assert!(matches!(
            categorize(&llm, &campaign("x")).await,
            Err(LlmError::EmptyResponse)
        ));
    }
}
