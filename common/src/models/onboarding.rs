use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::string_enum;

string_enum! {
    pub enum ProjectStatus {
        Onboarding => "onboarding",
        Active => "active",
        Completed => "completed",
        Archived => "archived",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub client_contact_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub status: ProjectStatus,
    pub template_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Onboarding form definition; steps and task rules live in JSONB columns
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OnboardingTemplate {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    #[sqlx(json)]
    pub steps: Vec<OnboardingStep>,
    #[sqlx(json)]
    pub task_rules: Vec<TaskRule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OnboardingStep {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FormField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<VisibilityRule>,
}

string_enum! {
    pub enum FieldKind {
        Text => "text",
        Textarea => "textarea",
        Email => "email",
        Number => "number",
        Select => "select",
        Multiselect => "multiselect",
        Checkbox => "checkbox",
        Date => "date",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormField {
    pub id: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<VisibilityRule>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Includes,
}

/// `{ "field": "plan", "operator": "equals", "value": "pro" }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldCondition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: serde_json::Value,
}

/// A single condition, or `{ "any": [...] }` for OR-of-conditions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum VisibilityRule {
    Any { any: Vec<FieldCondition> },
    Single(FieldCondition),
}

string_enum! {
    pub enum TaskPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

/// Task produced when a completed session satisfies `condition`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRule {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_in_days: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<VisibilityRule>,
}

string_enum! {
    pub enum SessionStatus {
        InProgress => "in_progress",
        Completed => "completed",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OnboardingSession {
    pub id: Uuid,
    pub org_id: Uuid,
    pub project_id: Uuid,
    pub template_id: Uuid,
    pub current_step: i32,
    pub responses: serde_json::Value,
    pub completion_percentage: i32,
    #[sqlx(try_from = "String")]
    pub status: SessionStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub tasks_generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

string_enum! {
    pub enum TaskStatus {
        Todo => "todo",
        InProgress => "in_progress",
        Done => "done",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub org_id: Uuid,
    pub project_id: Uuid,
    pub session_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub priority: TaskPriority,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub assignee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_condition_deserializes() {
        let rule: VisibilityRule = serde_json::from_value(serde_json::json!({
            "field": "has_website",
            "operator": "equals",
            "value": "yes"
        }))
        .unwrap();
        assert!(matches!(rule, VisibilityRule::Single(ref c) if c.field == "has_website"));
    }

    #[test]
    fn test_any_condition_deserializes() {
        let rule: VisibilityRule = serde_json::from_value(serde_json::json!({
            "any": [
                { "field": "services", "operator": "includes", "value": "seo" },
                { "field": "budget", "operator": "notEquals", "value": "none" }
            ]
        }))
        .unwrap();
        match rule {
            VisibilityRule::Any { any } => {
                assert_eq!(any.len(), 2);
                assert_eq!(any[1].operator, ConditionOperator::NotEquals);
            }
            other => panic!("unexpected rule: {:?}", other),
        }
    }

    #[test]
    fn test_task_rule_defaults() {
        let rule: TaskRule =
            serde_json::from_value(serde_json::json!({ "title": "Kickoff call" })).unwrap();
        assert_eq!(rule.priority, TaskPriority::Medium);
        assert_eq!(rule.due_in_days, 0);
        assert!(rule.condition.is_none());
    }
}
