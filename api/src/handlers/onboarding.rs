use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use common::models::{FormField, OnboardingSession, OnboardingTemplate, Task};
use common::onboarding::{responses_map, visible_fields, visible_step_indices};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::handlers::{ok, ApiResult, Scope};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    pub template_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SaveStepRequest {
    pub responses: Map<String, Value>,
}

/// A step as the client should render it: only visible fields
#[derive(Debug, Serialize)]
pub struct StepView {
    pub index: usize,
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session: OnboardingSession,
    pub template_name: String,
    pub steps: Vec<StepView>,
}

#[derive(Debug, Serialize)]
pub struct StepProgressView {
    pub session: OnboardingSession,
    pub next_step: usize,
    pub finished: bool,
}

#[derive(Debug, Serialize)]
pub struct CompletionView {
    pub session_id: Uuid,
    pub tasks: Vec<Task>,
}

/// Visible steps and fields under the current responses
pub fn session_view(
    session: OnboardingSession,
    template: &OnboardingTemplate,
    responses: &Map<String, Value>,
) -> SessionView {
    let steps = visible_step_indices(template, responses)
        .into_iter()
        .filter_map(|index| template.steps.get(index).map(|step| (index, step)))
        .map(|(index, step)| StepView {
            index,
            id: step.id.clone(),
            title: step.title.clone(),
            description: step.description.clone(),
            fields: visible_fields(step, responses).into_iter().cloned().collect(),
        })
        .collect();

    SessionView {
        session,
        template_name: template.name.clone(),
        steps,
    }
}

/// Start (or resume) the onboarding session of a project
#[tracing::instrument(skip(state, req))]
pub async fn start_session(
    State(state): State<AppState>,
    scope: Scope,
    Path(project_id): Path<Uuid>,
    req: Option<Json<StartSessionRequest>>,
) -> ApiResult<OnboardingSession> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    ok(state
        .services
        .onboarding
        .start_session(scope.org_id, project_id, req.template_id)
        .await?)
}

#[tracing::instrument(skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    scope: Scope,
    Path(session_id): Path<Uuid>,
) -> ApiResult<SessionView> {
    let session = state
        .services
        .onboarding
        .load_session(scope.org_id, session_id)
        .await?;
    let template = state
        .services
        .onboarding
        .load_template(scope.org_id, session.template_id)
        .await?;
    let responses = responses_map(&session)?;

    ok(session_view(session, &template, &responses))
}

#[tracing::instrument(skip(state, req))]
pub async fn save_step(
    State(state): State<AppState>,
    scope: Scope,
    Path((session_id, step_index)): Path<(Uuid, usize)>,
    Json(req): Json<SaveStepRequest>,
) -> ApiResult<StepProgressView> {
    let progress = state
        .services
        .onboarding
        .save_step(scope.org_id, session_id, step_index, req.responses)
        .await?;

    ok(StepProgressView {
        session: progress.session,
        next_step: progress.next_step,
        finished: progress.finished,
    })
}

#[tracing::instrument(skip(state))]
pub async fn complete_session(
    State(state): State<AppState>,
    scope: Scope,
    Path(session_id): Path<Uuid>,
) -> ApiResult<CompletionView> {
    let outcome = state
        .services
        .onboarding
        .complete_session(scope.org_id, session_id, Utc::now().date_naive())
        .await?;

    ok(CompletionView {
        session_id: outcome.session_id,
        tasks: outcome.tasks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::{
        ConditionOperator, FieldCondition, FieldKind, OnboardingStep, SessionStatus, VisibilityRule,
    };
    use serde_json::json;

    fn field(id: &str, condition: Option<VisibilityRule>) -> FormField {
        FormField {
            id: id.to_string(),
            label: id.to_string(),
            kind: FieldKind::Text,
            required: true,
            options: vec![],
            condition,
        }
    }

    fn equals(field: &str, value: Value) -> VisibilityRule {
        VisibilityRule::Single(FieldCondition {
            field: field.to_string(),
            operator: ConditionOperator::Equals,
            value,
        })
    }

    #[test]
    fn test_session_view_hides_conditional_steps_and_fields() {
        let now = Utc::now();
        let template = OnboardingTemplate {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            name: "Agency intake".to_string(),
            steps: vec![
                OnboardingStep {
                    id: "basics".to_string(),
                    title: "Basics".to_string(),
                    description: None,
                    fields: vec![
                        field("has_site", None),
                        field("site_url", Some(equals("has_site", json!("yes")))),
                    ],
                    condition: None,
                },
                OnboardingStep {
                    id: "ads".to_string(),
                    title: "Ads".to_string(),
                    description: None,
                    fields: vec![field("budget", None)],
                    condition: Some(equals("wants_ads", json!(true))),
                },
            ],
            task_rules: vec![],
            created_at: now,
            updated_at: now,
        };
        let session = OnboardingSession {
            id: Uuid::new_v4(),
            org_id: template.org_id,
            project_id: Uuid::new_v4(),
            template_id: template.id,
            current_step: 0,
            responses: json!({ "has_site": "no" }),
            completion_percentage: 0,
            status: SessionStatus::InProgress,
            completed_at: None,
            tasks_generated_at: None,
            created_at: now,
            updated_at: now,
        };

        let responses = responses_map(&session).unwrap();
        let view = session_view(session, &template, &responses);

        assert_eq!(view.steps.len(), 1);
        assert_eq!(view.steps[0].index, 0);
        let ids: Vec<&str> = view.steps[0].fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["has_site"]);
    }
}
