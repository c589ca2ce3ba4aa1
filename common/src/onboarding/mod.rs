// Client onboarding: conditional form steps, session progress and task generation

pub mod conditions;
pub mod progress;
pub mod tasks;

pub use conditions::{evaluate_condition, evaluate_rule, is_visible};
pub use progress::{
    completion_percentage, merge_responses, next_visible_step, validate_step, visible_fields,
    visible_step_indices, visible_steps,
};
pub use tasks::{draft_tasks, TaskDraft};

use crate::db::repositories::{OnboardingRepository, ProjectRepository};
use crate::errors::{DatabaseError, OnboardingError, ValidationError};
use crate::models::{
    FieldKind, OnboardingSession, OnboardingStep, OnboardingTemplate, Project, ProjectStatus,
    SessionStatus, Task, TaskRule, TaskStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::instrument;
use uuid::Uuid;

/// Progress after a step was saved
#[derive(Debug, Clone)]
pub struct StepProgress {
    pub session: OnboardingSession,
    pub next_step: usize,
    pub finished: bool,
}

/// Result of completing a session
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub session_id: Uuid,
    pub tasks: Vec<Task>,
}

pub fn responses_map(session: &OnboardingSession) -> Result<Map<String, Value>, OnboardingError> {
    match &session.responses {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        _ => Err(OnboardingError::InvalidResponses),
    }
}

/// Structural checks on a template before it is stored
///
/// Step ids and field ids must be unique and non-empty, select-style fields
/// need options and due offsets cannot be negative.
pub fn validate_template(steps: &[OnboardingStep], rules: &[TaskRule]) -> Result<(), ValidationError> {
    if steps.is_empty() {
        return Err(ValidationError::MissingField("steps".to_string()));
    }

    let mut step_ids = HashSet::new();
    let mut field_ids = HashSet::new();
    for step in steps {
        if step.id.trim().is_empty() || !step_ids.insert(step.id.as_str()) {
            return Err(ValidationError::invalid("steps", format!("duplicate or empty step id '{}'", step.id)));
        }
        for field in &step.fields {
            if field.id.trim().is_empty() || !field_ids.insert(field.id.as_str()) {
                return Err(ValidationError::invalid("fields", format!("duplicate or empty field id '{}'", field.id)));
            }
            if matches!(field.kind, FieldKind::Select | FieldKind::Multiselect) && field.options.is_empty() {
                return Err(ValidationError::invalid(field.id.clone(), "select fields need options"));
            }
        }
    }

    if let Some(rule) = rules.iter().find(|r| r.due_in_days < 0 || r.title.trim().is_empty()) {
        return Err(ValidationError::invalid("task_rules", format!("invalid rule '{}'", rule.title)));
    }

    Ok(())
}

/// Turn drafts into task rows tied to the session's project
pub fn build_tasks(session: &OnboardingSession, drafts: Vec<TaskDraft>, now: DateTime<Utc>) -> Vec<Task> {
    drafts
        .into_iter()
        .map(|draft| Task {
            id: Uuid::new_v4(),
            org_id: session.org_id,
            project_id: session.project_id,
            session_id: Some(session.id),
            title: draft.title,
            description: draft.description,
            priority: draft.priority,
            status: TaskStatus::Todo,
            due_date: Some(draft.due_date),
            assignee_id: None,
            created_at: now,
            updated_at: now,
        })
        .collect()
}

#[derive(Clone)]
pub struct OnboardingService {
    projects: ProjectRepository,
    sessions: OnboardingRepository,
}

impl OnboardingService {
    pub fn new(projects: ProjectRepository, sessions: OnboardingRepository) -> Self {
        Self { projects, sessions }
    }

    async fn load_project(&self, org_id: Uuid, project_id: Uuid) -> Result<Project, OnboardingError> {
        self.projects
            .find_by_id(org_id, project_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Project not found: {}", project_id)).into())
    }

    pub async fn load_template(&self, org_id: Uuid, template_id: Uuid) -> Result<OnboardingTemplate, OnboardingError> {
        self.projects
            .find_template(org_id, template_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Template not found: {}", template_id)).into())
    }

    pub async fn load_session(&self, org_id: Uuid, session_id: Uuid) -> Result<OnboardingSession, OnboardingError> {
        self.sessions
            .find_session(org_id, session_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Session not found: {}", session_id)).into())
    }

    /// Start onboarding for a project, or return its in-progress session
    #[instrument(skip(self))]
    pub async fn start_session(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        template_id: Option<Uuid>,
    ) -> Result<OnboardingSession, OnboardingError> {
        if let Some(existing) = self.sessions.find_active_for_project(org_id, project_id).await? {
            return Ok(existing);
        }

        let project = self.load_project(org_id, project_id).await?;
        let template_id = template_id.or(project.template_id).ok_or_else(|| {
            DatabaseError::NotFound(format!("Project {} has no onboarding template", project_id))
        })?;
        let template = self.load_template(org_id, template_id).await?;

        let visible = visible_step_indices(&template, &Map::new());
        let now = Utc::now();
        let session = OnboardingSession {
            id: Uuid::new_v4(),
            org_id,
            project_id,
            template_id: template.id,
            current_step: visible.first().copied().unwrap_or(template.steps.len()) as i32,
            responses: Value::Object(Map::new()),
            completion_percentage: 0,
            status: SessionStatus::InProgress,
            completed_at: None,
            tasks_generated_at: None,
            created_at: now,
            updated_at: now,
        };

        match self.sessions.create_session(&session).await {
            Ok(()) => Ok(session),
            // Lost a race against another start; the unique index kept one session
            Err(DatabaseError::DuplicateKey(_)) => self
                .sessions
                .find_active_for_project(org_id, project_id)
                .await?
                .ok_or_else(|| DatabaseError::NotFound(format!("Session for project {}", project_id)).into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Merge answers for one step, validate it and advance to the next visible step
    #[instrument(skip(self, step_responses))]
    pub async fn save_step(
        &self,
        org_id: Uuid,
        session_id: Uuid,
        step_index: usize,
        step_responses: Map<String, Value>,
    ) -> Result<StepProgress, OnboardingError> {
        let mut session = self.load_session(org_id, session_id).await?;
        if session.status == SessionStatus::Completed {
            return Err(OnboardingError::AlreadyCompleted);
        }
        let template = self.load_template(org_id, session.template_id).await?;

        let step = template
            .steps
            .get(step_index)
            .ok_or(OnboardingError::StepOutOfRange(step_index))?;

        let mut responses = responses_map(&session)?;
        merge_responses(&mut responses, step_responses);

        let missing = validate_step(step, &responses);
        if !missing.is_empty() {
            return Err(OnboardingError::MissingFields(missing));
        }

        let visible = visible_step_indices(&template, &responses);
        let next_step = next_visible_step(&visible, step_index, template.steps.len());
        let percentage = completion_percentage(&visible, next_step);

        session.responses = Value::Object(responses);
        session.current_step = next_step as i32;
        session.completion_percentage = i32::from(percentage);

        self.sessions
            .save_progress(session.id, session.current_step, &session.responses, session.completion_percentage)
            .await?;

        Ok(StepProgress {
            finished: next_step >= template.steps.len(),
            next_step,
            session,
        })
    }

    /// Finish the session once every visible step is valid, then generate tasks
    #[instrument(skip(self))]
    pub async fn complete_session(
        &self,
        org_id: Uuid,
        session_id: Uuid,
        today: NaiveDate,
    ) -> Result<CompletionOutcome, OnboardingError> {
        let session = self.load_session(org_id, session_id).await?;
        if session.status == SessionStatus::Completed {
            return Err(OnboardingError::AlreadyCompleted);
        }
        let template = self.load_template(org_id, session.template_id).await?;
        let responses = responses_map(&session)?;

        let missing: Vec<String> = visible_steps(&template, &responses)
            .into_iter()
            .flat_map(|step| validate_step(step, &responses))
            .collect();
        if !missing.is_empty() {
            return Err(OnboardingError::MissingFields(missing));
        }

        self.sessions
            .complete(&session, template.steps.len() as i32)
            .await?;

        let tasks = self.generate_tasks(&session, &template, today).await?;
        Ok(CompletionOutcome {
            session_id: session.id,
            tasks,
        })
    }

    /// Create tasks for every matching rule; a session generates tasks at most once
    #[instrument(skip(self, session, template), fields(session_id = %session.id))]
    pub async fn generate_tasks(
        &self,
        session: &OnboardingSession,
        template: &OnboardingTemplate,
        today: NaiveDate,
    ) -> Result<Vec<Task>, OnboardingError> {
        if session.tasks_generated_at.is_some() {
            return Ok(Vec::new());
        }

        let responses = responses_map(session)?;
        let tasks = build_tasks(session, draft_tasks(&template.task_rules, &responses, today), Utc::now());

        if self.sessions.insert_generated_tasks(session.id, &tasks).await? {
            Ok(tasks)
        } else {
            tracing::debug!(session_id = %session.id, "Tasks were already generated");
            Ok(Vec::new())
        }
    }

    #[instrument(skip(self))]
    pub async fn set_project_status(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        status: ProjectStatus,
    ) -> Result<(), OnboardingError> {
        self.projects.update_status(org_id, project_id, status).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskPriority;
    use serde_json::json;

    fn session(responses: Value) -> OnboardingSession {
        let now = Utc::now();
        OnboardingSession {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            template_id: Uuid::new_v4(),
            current_step: 0,
            responses,
            completion_percentage: 0,
            status: SessionStatus::InProgress,
            completed_at: None,
            tasks_generated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_responses_map_accepts_object_and_null() {
        assert_eq!(responses_map(&session(json!({"a": 1}))).unwrap().len(), 1);
        assert!(responses_map(&session(Value::Null)).unwrap().is_empty());
        assert!(matches!(
            responses_map(&session(json!([1, 2]))),
            Err(OnboardingError::InvalidResponses)
        ));
    }

    fn field(id: &str, kind: FieldKind) -> crate::models::FormField {
        crate::models::FormField {
            id: id.to_string(),
            label: id.to_string(),
            kind,
            required: false,
            options: vec![],
            condition: None,
        }
    }

    fn step(id: &str, fields: Vec<crate::models::FormField>) -> OnboardingStep {
        OnboardingStep {
            id: id.to_string(),
            title: id.to_string(),
            description: None,
            fields,
            condition: None,
        }
    }

    #[test]
    fn test_validate_template() {
        let ok = vec![step("company", vec![field("name", FieldKind::Text)])];
        assert!(validate_template(&ok, &[]).is_ok());
        assert!(validate_template(&[], &[]).is_err());

        let duplicate_field = vec![
            step("a", vec![field("name", FieldKind::Text)]),
            step("b", vec![field("name", FieldKind::Email)]),
        ];
        assert!(validate_template(&duplicate_field, &[]).is_err());

        let select_without_options = vec![step("a", vec![field("plan", FieldKind::Select)])];
        assert!(validate_template(&select_without_options, &[]).is_err());

        let negative_due = TaskRule {
            title: "Kickoff".to_string(),
            description: None,
            priority: TaskPriority::Low,
            due_in_days: -1,
            condition: None,
        };
        assert!(validate_template(&ok, &[negative_due]).is_err());
    }

    #[test]
    fn test_build_tasks_links_session_and_project() {
        let s = session(json!({}));
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let drafts = vec![TaskDraft {
            title: "Send welcome pack".to_string(),
            description: None,
            priority: TaskPriority::High,
            due_date: today,
        }];

        let tasks = build_tasks(&s, drafts, Utc::now());
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].project_id, s.project_id);
        assert_eq!(tasks[0].session_id, Some(s.id));
        assert_eq!(tasks[0].status, TaskStatus::Todo);
        assert_eq!(tasks[0].due_date, Some(today));
    }
}
