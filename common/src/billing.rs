// Plan limits and monthly usage metering

use crate::db::repositories::{ContactRepository, OrganizationRepository, UsageRepository};
use crate::errors::BillingError;
use crate::models::{PlanTier, UsageMetric};
use crate::telemetry;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

/// Monthly allowance for `metric` on `plan`; `None` is unlimited
pub fn plan_limit(plan: PlanTier, metric: UsageMetric) -> Option<i64> {
    use PlanTier::*;
    use UsageMetric::*;

    match (plan, metric) {
        (Enterprise, _) => None,
        (Free, Seats) => Some(2),
        (Starter, Seats) => Some(5),
        (Pro, Seats) => Some(25),
        (Free, Contacts) => Some(250),
        (Starter, Contacts) => Some(2_500),
        (Pro, Contacts) => Some(25_000),
        (Free, EmailsSynced) => Some(1_000),
        (Starter, EmailsSynced) => Some(10_000),
        (Pro, EmailsSynced) => Some(100_000),
        (Free, AiRequests) => Some(50),
        (Starter, AiRequests) => Some(1_000),
        (Pro, AiRequests) => Some(10_000),
        (Free, VoiceMinutes) => Some(0),
        (Starter, VoiceMinutes) => Some(100),
        (Pro, VoiceMinutes) => Some(1_000),
    }
}

/// First day of the month containing `now`, in UTC
pub fn period_start(now: DateTime<Utc>) -> NaiveDate {
    let today = now.date_naive();
    today.with_day(1).unwrap_or(today)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageCheck {
    pub metric: UsageMetric,
    pub used: i64,
    pub limit: Option<i64>,
    pub remaining: Option<i64>,
    pub allowed: bool,
}

impl UsageCheck {
    /// Whether `additional` more units fit under `limit`
    pub fn evaluate(metric: UsageMetric, used: i64, limit: Option<i64>, additional: i64) -> Self {
        match limit {
            None => Self {
                metric,
                used,
                limit,
                remaining: None,
                allowed: true,
            },
            Some(limit) => Self {
                metric,
                used,
                limit: Some(limit),
                remaining: Some((limit - used).max(0)),
                allowed: used + additional <= limit,
            },
        }
    }
}

/// Seats and contacts are counted from live rows rather than period counters
pub fn is_live_metric(metric: UsageMetric) -> bool {
    matches!(metric, UsageMetric::Seats | UsageMetric::Contacts)
}

#[derive(Clone)]
pub struct BillingService {
    organizations: OrganizationRepository,
    contacts: ContactRepository,
    usage: UsageRepository,
}

impl BillingService {
    pub fn new(
        organizations: OrganizationRepository,
        contacts: ContactRepository,
        usage: UsageRepository,
    ) -> Self {
        Self {
            organizations,
            contacts,
            usage,
        }
    }

    async fn plan_for(&self, org_id: Uuid) -> Result<PlanTier, BillingError> {
        self.organizations
            .get_subscription(org_id)
            .await?
            .map(|s| s.plan)
            .ok_or_else(|| BillingError::SubscriptionNotFound(org_id.to_string()))
    }

    async fn used(&self, org_id: Uuid, metric: UsageMetric, now: DateTime<Utc>) -> Result<i64, BillingError> {
        Ok(match metric {
            UsageMetric::Seats => self.organizations.count_members(org_id).await?,
            UsageMetric::Contacts => self.contacts.count(org_id).await?,
            _ => self.usage.get(org_id, metric, period_start(now)).await?,
        })
    }

    #[instrument(skip(self))]
    pub async fn check_usage(
        &self,
        org_id: Uuid,
        metric: UsageMetric,
        additional: i64,
    ) -> Result<UsageCheck, BillingError> {
        let now = Utc::now();
        let plan = self.plan_for(org_id).await?;
        let used = self.used(org_id, metric, now).await?;
        Ok(UsageCheck::evaluate(metric, used, plan_limit(plan, metric), additional))
    }

    #[instrument(skip(self))]
    pub async fn record_usage(
        &self,
        org_id: Uuid,
        metric: UsageMetric,
        quantity: i64,
    ) -> Result<i64, BillingError> {
        if quantity <= 0 || is_live_metric(metric) {
            return self.used(org_id, metric, Utc::now()).await;
        }
        let total = self
            .usage
            .increment(org_id, metric, period_start(Utc::now()), quantity)
            .await?;
        telemetry::record_usage(metric, quantity as u64);
        Ok(total)
    }

    /// Check, then record; fails with `LimitExceeded` without recording
    #[instrument(skip(self))]
    pub async fn enforce(
        &self,
        org_id: Uuid,
        metric: UsageMetric,
        quantity: i64,
    ) -> Result<UsageCheck, BillingError> {
        let check = self.check_usage(org_id, metric, quantity).await?;
        if !check.allowed {
            tracing::warn!(org_id = %org_id, metric = %metric, used = check.used, "Usage limit exceeded");
            return Err(BillingError::LimitExceeded {
                metric: metric.to_string(),
                used: check.used,
                limit: check.limit.unwrap_or_default(),
            });
        }
        self.record_usage(org_id, metric, quantity).await?;
        Ok(check)
    }

    #[instrument(skip(self))]
    pub async fn usage_summary(&self, org_id: Uuid) -> Result<UsageSummary, BillingError> {
        let now = Utc::now();
        let plan = self.plan_for(org_id).await?;
        let mut metrics = Vec::with_capacity(UsageMetric::ALL.len());
        for metric in UsageMetric::ALL {
            let used = self.used(org_id, *metric, now).await?;
            metrics.push(UsageCheck::evaluate(*metric, used, plan_limit(plan, *metric), 0));
        }
        Ok(UsageSummary {
            plan,
            period_start: period_start(now),
            metrics,
        })
    }

    #[instrument(skip(self))]
    pub async fn change_plan(&self, org_id: Uuid, plan: PlanTier) -> Result<(), BillingError> {
        self.organizations.set_plan(org_id, plan).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
    pub plan: PlanTier,
    pub period_start: NaiveDate,
    pub metrics: Vec<UsageCheck>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_plan_limits_table() {
        assert_eq!(plan_limit(PlanTier::Free, UsageMetric::Seats), Some(2));
        assert_eq!(plan_limit(PlanTier::Starter, UsageMetric::Contacts), Some(2_500));
        assert_eq!(plan_limit(PlanTier::Pro, UsageMetric::EmailsSynced), Some(100_000));
        assert_eq!(plan_limit(PlanTier::Free, UsageMetric::VoiceMinutes), Some(0));
        for metric in UsageMetric::ALL {
            assert_eq!(plan_limit(PlanTier::Enterprise, *metric), None);
        }
    }

    #[test]
    fn test_period_start_is_first_of_month() {
        let now = Utc.with_ymd_and_hms(2026, 2, 28, 23, 59, 59).unwrap();
        assert_eq!(period_start(now), NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
    }

    #[test]
    fn test_usage_check_at_the_boundary() {
        let at_limit = UsageCheck::evaluate(UsageMetric::AiRequests, 49, Some(50), 1);
        assert!(at_limit.allowed);
        assert_eq!(at_limit.remaining, Some(1));

        let over = UsageCheck::evaluate(UsageMetric::AiRequests, 50, Some(50), 1);
        assert!(!over.allowed);
        assert_eq!(over.remaining, Some(0));

        let unlimited = UsageCheck::evaluate(UsageMetric::AiRequests, 1_000_000, None, 5);
        assert!(unlimited.allowed);
        assert_eq!(unlimited.remaining, None);
    }

    #[test]
    fn test_free_plan_has_no_voice_minutes() {
        let check = UsageCheck::evaluate(
            UsageMetric::VoiceMinutes,
            0,
            plan_limit(PlanTier::Free, UsageMetric::VoiceMinutes),
            1,
        );
        assert!(!check.allowed);
    }
}
