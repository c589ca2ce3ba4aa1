// Task drafts produced from template rules when a session completes

use super::conditions::is_visible;
use crate::models::{TaskPriority, TaskRule};
use chrono::{Duration, NaiveDate};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: NaiveDate,
}

/// Drafts for every rule whose condition holds, due `today + due_in_days`
pub fn draft_tasks(rules: &[TaskRule], responses: &Map<String, Value>, today: NaiveDate) -> Vec<TaskDraft> {
    rules
        .iter()
        .filter(|rule| is_visible(rule.condition.as_ref(), responses))
        .map(|rule| TaskDraft {
            title: rule.title.clone(),
            description: rule.description.clone(),
            priority: rule.priority,
            due_date: today + Duration::days(rule.due_in_days),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConditionOperator, FieldCondition, VisibilityRule};
    use serde_json::json;

    #[test]
    fn test_only_matching_rules_produce_tasks() {
        let rules = vec![
            TaskRule {
                title: "Kickoff call".to_string(),
                description: None,
                priority: TaskPriority::High,
                due_in_days: 2,
                condition: None,
            },
            TaskRule {
                title: "SEO audit".to_string(),
                description: Some("Baseline crawl".to_string()),
                priority: TaskPriority::Medium,
                due_in_days: 7,
                condition: Some(VisibilityRule::Single(FieldCondition {
                    field: "services".to_string(),
                    operator: ConditionOperator::Includes,
                    value: json!("seo"),
                })),
            },
        ];
        let today = NaiveDate::from_ymd_opt(2026, 1, 30).unwrap();

        let none = draft_tasks(&rules, &Map::new(), today);
        assert_eq!(none.len(), 1);
        assert_eq!(none[0].due_date, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());

        let responses = json!({ "services": ["seo"] }).as_object().cloned().unwrap();
        let both = draft_tasks(&rules, &responses, today);
        assert_eq!(both.len(), 2);
        assert_eq!(both[1].title, "SEO audit");
        assert_eq!(both[1].due_date, NaiveDate::from_ymd_opt(2026, 2, 6).unwrap());
    }
}
