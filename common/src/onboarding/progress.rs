// Step visibility, validation and completion tracking for onboarding sessions

use super::conditions::is_visible;
use crate::models::{FieldKind, FormField, OnboardingStep, OnboardingTemplate};
use serde_json::{Map, Value};

/// Indices of steps currently shown, in template order
pub fn visible_step_indices(template: &OnboardingTemplate, responses: &Map<String, Value>) -> Vec<usize> {
    template
        .steps
        .iter()
        .enumerate()
        .filter(|(_, step)| is_visible(step.condition.as_ref(), responses))
        .map(|(i, _)| i)
        .collect()
}

pub fn visible_steps<'a>(
    template: &'a OnboardingTemplate,
    responses: &Map<String, Value>,
) -> Vec<&'a OnboardingStep> {
    visible_step_indices(template, responses)
        .into_iter()
        .map(|i| &template.steps[i])
        .collect()
}

pub fn visible_fields<'a>(step: &'a OnboardingStep, responses: &Map<String, Value>) -> Vec<&'a FormField> {
    step.fields
        .iter()
        .filter(|field| is_visible(field.condition.as_ref(), responses))
        .collect()
}

fn is_empty_response(field: &FormField, value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Bool(false)) => field.kind == FieldKind::Checkbox,
        Some(_) => false,
    }
}

/// Ids of visible required fields that have no usable answer
pub fn validate_step(step: &OnboardingStep, responses: &Map<String, Value>) -> Vec<String> {
    visible_fields(step, responses)
        .into_iter()
        .filter(|field| field.required && is_empty_response(field, responses.get(&field.id)))
        .map(|field| field.id.clone())
        .collect()
}

/// Shallow merge of `updates` into `responses`
pub fn merge_responses(responses: &mut Map<String, Value>, updates: Map<String, Value>) {
    for (key, value) in updates {
        responses.insert(key, value);
    }
}

/// First visible step after `step_index`, or `steps.len()` when none remain
pub fn next_visible_step(visible: &[usize], step_index: usize, step_count: usize) -> usize {
    visible
        .iter()
        .copied()
        .find(|&i| i > step_index)
        .unwrap_or(step_count)
}

/// Share of visible steps that sit before `current_step`, as a rounded percentage
pub fn completion_percentage(visible: &[usize], current_step: usize) -> u8 {
    if visible.is_empty() {
        return 100;
    }
    let completed = visible.iter().filter(|&&i| i < current_step).count();
    ((completed as f64 / visible.len() as f64) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConditionOperator, FieldCondition, VisibilityRule};
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn field(id: &str, kind: FieldKind, required: bool) -> FormField {
        FormField {
            id: id.to_string(),
            label: id.to_string(),
            kind,
            required,
            options: vec![],
            condition: None,
        }
    }

    fn step(id: &str, fields: Vec<FormField>, condition: Option<VisibilityRule>) -> OnboardingStep {
        OnboardingStep {
            id: id.to_string(),
            title: id.to_string(),
            description: None,
            fields,
            condition,
        }
    }

    fn template() -> OnboardingTemplate {
        let has_site = VisibilityRule::Single(FieldCondition {
            field: "has_website".to_string(),
            operator: ConditionOperator::Equals,
            value: json!("yes"),
        });
        OnboardingTemplate {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            name: "Agency intake".to_string(),
            steps: vec![
                step(
                    "company",
                    vec![
                        field("company_name", FieldKind::Text, true),
                        field("has_website", FieldKind::Select, true),
                    ],
                    None,
                ),
                step("website", vec![field("url", FieldKind::Text, true)], Some(has_site)),
                step("terms", vec![field("accept", FieldKind::Checkbox, true)], None),
            ],
            task_rules: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_conditional_step_hidden_until_answered() {
        let t = template();
        assert_eq!(visible_step_indices(&t, &Map::new()), vec![0, 2]);
        assert_eq!(visible_step_indices(&t, &map(json!({ "has_website": "yes" }))), vec![0, 1, 2]);
    }

    #[test]
    fn test_validate_step_reports_empty_values() {
        let t = template();
        let missing = validate_step(&t.steps[0], &map(json!({ "company_name": "  ", "has_website": null })));
        assert_eq!(missing, vec!["company_name".to_string(), "has_website".to_string()]);

        let missing = validate_step(&t.steps[2], &map(json!({ "accept": false })));
        assert_eq!(missing, vec!["accept".to_string()]);
        assert!(validate_step(&t.steps[2], &map(json!({ "accept": true }))).is_empty());
    }

    #[test]
    fn test_progress_skips_hidden_steps() {
        let t = template();
        let responses = map(json!({ "company_name": "Acme", "has_website": "no" }));
        let visible = visible_step_indices(&t, &responses);
        let next = next_visible_step(&visible, 0, t.steps.len());
        assert_eq!(next, 2);
        assert_eq!(completion_percentage(&visible, next), 50);
        assert_eq!(completion_percentage(&visible, next_visible_step(&visible, 2, 3)), 100);
    }

    #[test]
    fn test_merge_is_shallow() {
        let mut responses = map(json!({ "a": 1, "nested": { "x": 1 } }));
        merge_responses(&mut responses, map(json!({ "nested": { "y": 2 }, "b": 2 })));
        assert_eq!(Value::Object(responses), json!({ "a": 1, "b": 2, "nested": { "y": 2 } }));
    }
}
