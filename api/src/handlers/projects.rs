use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use common::models::{
    OnboardingStep, OnboardingTemplate, Project, ProjectStatus, Task, TaskPriority, TaskRule,
    TaskStatus,
};
use common::onboarding::validate_template;
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::{not_found, ok, ok_with_message, ApiResult, ErrorResponse, Scope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub client_contact_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectStatusRequest {
    pub status: ProjectStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub steps: Vec<OnboardingStep>,
    #[serde(default)]
    pub task_rules: Vec<TaskRule>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatusRequest {
    pub status: TaskStatus,
}

async fn load_project(state: &AppState, org_id: Uuid, id: Uuid) -> Result<Project, ErrorResponse> {
    state
        .services
        .repos
        .projects
        .find_by_id(org_id, id)
        .await?
        .ok_or_else(|| not_found("Project"))
}

#[tracing::instrument(skip(state))]
pub async fn list_projects(State(state): State<AppState>, scope: Scope) -> ApiResult<Vec<Project>> {
    ok(state.services.repos.projects.list(scope.org_id).await?)
}

#[tracing::instrument(skip(state, req))]
pub async fn create_project(
    State(state): State<AppState>,
    scope: Scope,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<Project> {
    if req.name.trim().is_empty() {
        return Err(ErrorResponse::new("validation_error", "Project name is required"));
    }

    if let Some(template_id) = req.template_id {
        state
            .services
            .repos
            .projects
            .find_template(scope.org_id, template_id)
            .await?
            .ok_or_else(|| not_found("Onboarding template"))?;
    }

    let now = Utc::now();
    let project = Project {
        id: Uuid::new_v4(),
        org_id: scope.org_id,
        name: req.name.trim().to_string(),
        client_contact_id: req.client_contact_id,
        status: ProjectStatus::Onboarding,
        template_id: req.template_id,
        created_at: now,
        updated_at: now,
    };

    state.services.repos.projects.create(&project).await?;
    ok(project)
}

#[tracing::instrument(skip(state))]
pub async fn get_project(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<Project> {
    ok(load_project(&state, scope.org_id, id).await?)
}

#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn update_project_status(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
    Json(req): Json<ProjectStatusRequest>,
) -> ApiResult<()> {
    state
        .services
        .onboarding
        .set_project_status(scope.org_id, id, req.status)
        .await?;
    ok_with_message((), "Project status updated")
}

#[tracing::instrument(skip(state))]
pub async fn delete_project(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state.services.repos.projects.delete(scope.org_id, id).await?;
    ok_with_message((), "Project deleted")
}

#[tracing::instrument(skip(state))]
pub async fn list_templates(
    State(state): State<AppState>,
    scope: Scope,
) -> ApiResult<Vec<OnboardingTemplate>> {
    ok(state.services.repos.projects.list_templates(scope.org_id).await?)
}

#[tracing::instrument(skip(state, req), fields(name = %req.name))]
pub async fn create_template(
    State(state): State<AppState>,
    scope: Scope,
    Json(req): Json<CreateTemplateRequest>,
) -> ApiResult<OnboardingTemplate> {
    if req.name.trim().is_empty() {
        return Err(ErrorResponse::new("validation_error", "Template name is required"));
    }
    validate_template(&req.steps, &req.task_rules)?;

    let now = Utc::now();
    let template = OnboardingTemplate {
        id: Uuid::new_v4(),
        org_id: scope.org_id,
        name: req.name.trim().to_string(),
        steps: req.steps,
        task_rules: req.task_rules,
        created_at: now,
        updated_at: now,
    };

    state.services.repos.projects.create_template(&template).await?;
    ok(template)
}

#[tracing::instrument(skip(state))]
pub async fn get_template(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<OnboardingTemplate> {
    let template = state
        .services
        .repos
        .projects
        .find_template(scope.org_id, id)
        .await?
        .ok_or_else(|| not_found("Onboarding template"))?;
    ok(template)
}

#[tracing::instrument(skip(state))]
pub async fn list_tasks(
    State(state): State<AppState>,
    scope: Scope,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Vec<Task>> {
    ok(state
        .services
        .repos
        .tasks
        .list_by_project(scope.org_id, project_id)
        .await?)
}

#[tracing::instrument(skip(state, req))]
pub async fn create_task(
    State(state): State<AppState>,
    scope: Scope,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<Task> {
    if req.title.trim().is_empty() {
        return Err(ErrorResponse::new("validation_error", "Task title is required"));
    }
    let project = load_project(&state, scope.org_id, project_id).await?;

    let now = Utc::now();
    let task = Task {
        id: Uuid::new_v4(),
        org_id: scope.org_id,
        project_id: project.id,
        session_id: None,
        title: req.title.trim().to_string(),
        description: req.description,
        priority: req.priority.unwrap_or(TaskPriority::Medium),
        status: TaskStatus::Todo,
        due_date: req.due_date,
        assignee_id: req.assignee_id,
        created_at: now,
        updated_at: now,
    };

    state.services.repos.tasks.create(&task).await?;
    ok(task)
}

#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn update_task_status(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
    Json(req): Json<TaskStatusRequest>,
) -> ApiResult<()> {
    state
        .services
        .repos
        .tasks
        .update_status(scope.org_id, id, req.status)
        .await?;
    ok_with_message((), "Task updated")
}

#[tracing::instrument(skip(state))]
pub async fn delete_task(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state.services.repos.tasks.delete(scope.org_id, id).await?;
    ok_with_message((), "Task deleted")
}
