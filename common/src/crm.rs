// Pipeline analytics over a set of deals

use crate::models::{Deal, DealStage};
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    pub stage: DealStage,
    pub count: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesMetrics {
    pub total_deals: usize,
    pub open_deals: usize,
    pub won_deals: usize,
    pub lost_deals: usize,
    pub win_rate: f64,
    pub pipeline_value: f64,
    pub weighted_pipeline_value: f64,
    pub won_revenue: f64,
    pub average_deal_size: f64,
    pub average_sales_cycle_days: f64,
    pub stage_breakdown: Vec<StageSummary>,
    pub closing_this_month: usize,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn compute_sales_metrics(deals: &[Deal], now: DateTime<Utc>) -> SalesMetrics {
    let open: Vec<&Deal> = deals.iter().filter(|d| !d.stage.is_closed()).collect();
    let won: Vec<&Deal> = deals
        .iter()
        .filter(|d| d.stage == DealStage::ClosedWon)
        .collect();
    let lost_deals = deals
        .iter()
        .filter(|d| d.stage == DealStage::ClosedLost)
        .count();

    let closed = won.len() + lost_deals;
    let win_rate = if closed == 0 {
        0.0
    } else {
        won.len() as f64 / closed as f64 * 100.0
    };

    let pipeline_value: f64 = open.iter().map(|d| d.value).sum();
    let weighted_pipeline_value: f64 = open
        .iter()
        .map(|d| d.value * f64::from(d.stage.probability()) / 100.0)
        .sum();
    let won_revenue: f64 = won.iter().map(|d| d.value).sum();
    let average_deal_size = if won.is_empty() {
        0.0
    } else {
        won_revenue / won.len() as f64
    };

    let cycles: Vec<f64> = won
        .iter()
        .filter_map(|d| d.closed_at.map(|closed| closed - d.created_at))
        .map(|span| span.num_seconds() as f64 / 86_400.0)
        .collect();
    let average_sales_cycle_days = if cycles.is_empty() {
        0.0
    } else {
        cycles.iter().sum::<f64>() / cycles.len() as f64
    };

    let stage_breakdown = DealStage::ALL
        .iter()
        .map(|stage| {
            let in_stage = deals.iter().filter(|d| d.stage == *stage);
            let (count, value) = in_stage.fold((0, 0.0), |(c, v), d| (c + 1, v + d.value));
            StageSummary {
                stage: *stage,
                count,
                value: round2(value),
            }
        })
        .collect();

    let today = now.date_naive();
    let closing_this_month = open
        .iter()
        .filter_map(|d| d.expected_close_date)
        .filter(|date| date.year() == today.year() && date.month() == today.month())
        .count();

    SalesMetrics {
        total_deals: deals.len(),
        open_deals: open.len(),
        won_deals: won.len(),
        lost_deals,
        win_rate: round2(win_rate),
        pipeline_value: round2(pipeline_value),
        weighted_pipeline_value: round2(weighted_pipeline_value),
        won_revenue: round2(won_revenue),
        average_deal_size: round2(average_deal_size),
        average_sales_cycle_days: round2(average_sales_cycle_days),
        stage_breakdown,
        closing_this_month,
    }
}

/// Resulting `(closed_at, lost_reason)` when a deal moves to `stage`
pub fn stage_transition(
    stage: DealStage,
    current_closed_at: Option<DateTime<Utc>>,
    lost_reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<(Option<DateTime<Utc>>, Option<String>), crate::errors::ValidationError> {
    match stage {
        DealStage::ClosedLost => {
            let reason = lost_reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .ok_or_else(|| crate::errors::ValidationError::MissingField("lost_reason".to_string()))?;
            Ok((Some(current_closed_at.unwrap_or(now)), Some(reason)))
        }
        DealStage::ClosedWon => Ok((Some(current_closed_at.unwrap_or(now)), None)),
        _ => Ok((None, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use uuid::Uuid;

    fn deal(stage: DealStage, value: f64, created_at: DateTime<Utc>) -> Deal {
        Deal {
            id: Uuid::new_v4(),
            org_id: Uuid::nil(),
            title: "Deal".to_string(),
            value,
            currency: "USD".to_string(),
            stage,
            contact_id: None,
            owner_id: None,
            expected_close_date: None,
            closed_at: None,
            lost_reason: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_empty_pipeline() {
        let metrics = compute_sales_metrics(&[], Utc::now());
        assert_eq!(metrics.total_deals, 0);
        assert_eq!(metrics.win_rate, 0.0);
        assert_eq!(metrics.average_deal_size, 0.0);
        assert_eq!(metrics.stage_breakdown.len(), DealStage::ALL.len());
    }

    #[test]
    fn test_metrics_for_mixed_pipeline() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let start = now - Duration::days(30);

        let mut won = deal(DealStage::ClosedWon, 1000.0, start);
        won.closed_at = Some(start + Duration::days(10));
        let mut lost = deal(DealStage::ClosedLost, 500.0, start);
        lost.closed_at = Some(now);
        let mut proposal = deal(DealStage::Proposal, 2000.0, start);
        proposal.expected_close_date = NaiveDate::from_ymd_opt(2026, 3, 31);
        let lead = deal(DealStage::Lead, 333.33, start);

        let metrics = compute_sales_metrics(&[won, lost, proposal, lead], now);
        assert_eq!(metrics.open_deals, 2);
        assert_eq!(metrics.won_deals, 1);
        assert_eq!(metrics.lost_deals, 1);
        assert_eq!(metrics.win_rate, 50.0);
        assert_eq!(metrics.pipeline_value, 2333.33);
        // 2000 * 0.5 + 333.33 * 0.1
        assert_eq!(metrics.weighted_pipeline_value, 1033.33);
        assert_eq!(metrics.won_revenue, 1000.0);
        assert_eq!(metrics.average_deal_size, 1000.0);
        assert_eq!(metrics.average_sales_cycle_days, 10.0);
        assert_eq!(metrics.closing_this_month, 1);

        let proposal_row = &metrics.stage_breakdown[2];
        assert_eq!(proposal_row.stage, DealStage::Proposal);
        assert_eq!(proposal_row.count, 1);
    }

    #[test]
    fn test_closed_lost_requires_reason() {
        let now = Utc::now();
        assert!(stage_transition(DealStage::ClosedLost, None, None, now).is_err());
        assert!(stage_transition(DealStage::ClosedLost, None, Some("  ".into()), now).is_err());

        let (closed_at, reason) =
            stage_transition(DealStage::ClosedLost, None, Some("budget".into()), now).unwrap();
        assert_eq!(closed_at, Some(now));
        assert_eq!(reason.as_deref(), Some("budget"));
    }

    #[test]
    fn test_reopening_clears_closed_at() {
        let now = Utc::now();
        let (closed_at, reason) =
            stage_transition(DealStage::Negotiation, Some(now), None, now).unwrap();
        assert!(closed_at.is_none());
        assert!(reason.is_none());
    }
}
