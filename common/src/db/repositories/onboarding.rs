// Projects, onboarding templates, sessions and tasks

use super::queries::onboarding_queries::{
    PROJECT_COLUMNS, SESSION_COLUMNS, TASK_COLUMNS, TEMPLATE_COLUMNS,
};
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{
    OnboardingSession, OnboardingTemplate, Project, ProjectStatus, SessionStatus, Task, TaskStatus,
};
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct ProjectRepository {
    pool: DbPool,
}

impl ProjectRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, project), fields(org_id = %project.org_id))]
    pub async fn create(&self, project: &Project) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, org_id, name, client_contact_id, status, template_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(project.id)
        .bind(project.org_id)
        .bind(&project.name)
        .bind(project.client_contact_id)
        .bind(project.status.as_str())
        .bind(project.template_id)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(project_id = %project.id, "Project created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, org_id: Uuid, id: Uuid) -> Result<Option<Project>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM projects WHERE org_id = $1 AND id = $2",
            PROJECT_COLUMNS
        );
        let project = sqlx::query_as::<_, Project>(&query)
            .bind(org_id)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(project)
    }

    #[instrument(skip(self))]
    pub async fn list(&self, org_id: Uuid) -> Result<Vec<Project>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM projects WHERE org_id = $1 ORDER BY created_at DESC",
            PROJECT_COLUMNS
        );
        let projects = sqlx::query_as::<_, Project>(&query)
            .bind(org_id)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(projects)
    }

    #[instrument(skip(self))]
    pub async fn update_status(&self, org_id: Uuid, id: Uuid, status: ProjectStatus) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE projects SET status = $3, updated_at = NOW() WHERE org_id = $1 AND id = $2",
        )
        .bind(org_id)
        .bind(id)
        .bind(status.as_str())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Project not found: {}", id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, org_id: Uuid, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM projects WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Project not found: {}", id)));
        }
        Ok(())
    }

    #[instrument(skip(self, template), fields(org_id = %template.org_id))]
    pub async fn create_template(&self, template: &OnboardingTemplate) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO onboarding_templates (id, org_id, name, steps, task_rules, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(template.id)
        .bind(template.org_id)
        .bind(&template.name)
        .bind(Json(&template.steps))
        .bind(Json(&template.task_rules))
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(template_id = %template.id, steps = template.steps.len(), "Onboarding template created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_template(&self, org_id: Uuid, id: Uuid) -> Result<Option<OnboardingTemplate>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM onboarding_templates WHERE org_id = $1 AND id = $2",
            TEMPLATE_COLUMNS
        );
        let template = sqlx::query_as::<_, OnboardingTemplate>(&query)
            .bind(org_id)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(template)
    }

    #[instrument(skip(self))]
    pub async fn list_templates(&self, org_id: Uuid) -> Result<Vec<OnboardingTemplate>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM onboarding_templates WHERE org_id = $1 ORDER BY name",
            TEMPLATE_COLUMNS
        );
        let templates = sqlx::query_as::<_, OnboardingTemplate>(&query)
            .bind(org_id)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(templates)
    }
}

#[derive(Clone)]
pub struct OnboardingRepository {
    pool: DbPool,
}

impl OnboardingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, session), fields(project_id = %session.project_id))]
    pub async fn create_session(&self, session: &OnboardingSession) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO onboarding_sessions (
                id, org_id, project_id, template_id, current_step, responses,
                completion_percentage, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(session.id)
        .bind(session.org_id)
        .bind(session.project_id)
        .bind(session.template_id)
        .bind(session.current_step)
        .bind(&session.responses)
        .bind(session.completion_percentage)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(session_id = %session.id, "Onboarding session started");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_session(&self, org_id: Uuid, id: Uuid) -> Result<Option<OnboardingSession>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM onboarding_sessions WHERE org_id = $1 AND id = $2",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, OnboardingSession>(&query)
            .bind(org_id)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(session)
    }

    #[instrument(skip(self))]
    pub async fn find_active_for_project(
        &self,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<OnboardingSession>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM onboarding_sessions WHERE org_id = $1 AND project_id = $2 AND status = 'in_progress'",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, OnboardingSession>(&query)
            .bind(org_id)
            .bind(project_id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(session)
    }

    #[instrument(skip(self, responses))]
    pub async fn save_progress(
        &self,
        id: Uuid,
        current_step: i32,
        responses: &serde_json::Value,
        completion_percentage: i32,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE onboarding_sessions
            SET current_step = $2, responses = $3, completion_percentage = $4, updated_at = NOW()
            WHERE id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(id)
        .bind(current_step)
        .bind(responses)
        .bind(completion_percentage)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Active session not found: {}", id)));
        }
        Ok(())
    }

    /// Mark the session completed and move its project to `active`
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn complete(&self, session: &OnboardingSession, current_step: i32) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE onboarding_sessions
            SET status = $2, completion_percentage = 100, current_step = $3,
                completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(session.id)
        .bind(SessionStatus::Completed.as_str())
        .bind(current_step)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Active session not found: {}", session.id)));
        }

        sqlx::query("UPDATE projects SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(session.project_id)
            .bind(ProjectStatus::Active.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tracing::info!(session_id = %session.id, project_id = %session.project_id, "Onboarding completed");
        Ok(())
    }

    /// Insert generated tasks and stamp `tasks_generated_at` atomically
    ///
    /// Returns `false` without inserting anything when the session was already stamped.
    #[instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub async fn insert_generated_tasks(&self, session_id: Uuid, tasks: &[Task]) -> Result<bool, DatabaseError> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        let stamped = sqlx::query(
            r#"
            UPDATE onboarding_sessions
            SET tasks_generated_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND tasks_generated_at IS NULL
            "#,
        )
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        if stamped.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
            return Ok(false);
        }

        for task in tasks {
            insert_task(&mut *tx, task).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tracing::info!(session_id = %session_id, count = tasks.len(), "Onboarding tasks generated");
        Ok(true)
    }
}

async fn insert_task<'e, E>(executor: E, task: &Task) -> Result<(), DatabaseError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO tasks (
            id, org_id, project_id, session_id, title, description, priority, status,
            due_date, assignee_id, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(task.id)
    .bind(task.org_id)
    .bind(task.project_id)
    .bind(task.session_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.priority.as_str())
    .bind(task.status.as_str())
    .bind(task.due_date)
    .bind(task.assignee_id)
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[derive(Clone)]
pub struct TaskRepository {
    pool: DbPool,
}

impl TaskRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, task), fields(project_id = %task.project_id))]
    pub async fn create(&self, task: &Task) -> Result<(), DatabaseError> {
        insert_task(self.pool.pool(), task).await?;
        tracing::info!(task_id = %task.id, "Task created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_by_project(&self, org_id: Uuid, project_id: Uuid) -> Result<Vec<Task>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM tasks
            WHERE org_id = $1 AND project_id = $2
            ORDER BY due_date NULLS LAST, created_at
            "#,
            TASK_COLUMNS
        );
        let tasks = sqlx::query_as::<_, Task>(&query)
            .bind(org_id)
            .bind(project_id)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(tasks)
    }

    #[instrument(skip(self))]
    pub async fn update_status(&self, org_id: Uuid, id: Uuid, status: TaskStatus) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE tasks SET status = $3, updated_at = NOW() WHERE org_id = $1 AND id = $2",
        )
        .bind(org_id)
        .bind(id)
        .bind(status.as_str())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Task not found: {}", id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, org_id: Uuid, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM tasks WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Task not found: {}", id)));
        }
        Ok(())
    }
}
