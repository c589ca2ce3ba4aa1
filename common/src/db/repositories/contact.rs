// Contact repository: CRM people, also the known-sender list for email

use super::queries::contact_queries::SELECT_ALL_COLUMNS;
use super::Pagination;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::Contact;
use tracing::instrument;
use uuid::Uuid;

/// Search and status filter for contact listings
#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Clone)]
pub struct ContactRepository {
    pool: DbPool,
}

impl ContactRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, contact), fields(org_id = %contact.org_id))]
    pub async fn create(&self, contact: &Contact) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO contacts (
                id, org_id, first_name, last_name, email, phone, company, job_title,
                status, tags, notes, owner_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(contact.id)
        .bind(contact.org_id)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.company)
        .bind(&contact.job_title)
        .bind(contact.status.as_str())
        .bind(&contact.tags)
        .bind(&contact.notes)
        .bind(contact.owner_id)
        .bind(contact.created_at)
        .bind(contact.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(contact_id = %contact.id, "Contact created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, org_id: Uuid, id: Uuid) -> Result<Option<Contact>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM contacts WHERE org_id = $1 AND id = $2",
            SELECT_ALL_COLUMNS
        );
        let contact = sqlx::query_as::<_, Contact>(&query)
            .bind(org_id)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(contact)
    }

    #[instrument(skip(self))]
    pub async fn exists_by_email(&self, org_id: Uuid, email: &str) -> Result<bool, DatabaseError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM contacts WHERE org_id = $1 AND email = LOWER($2))",
        )
        .bind(org_id)
        .bind(email)
        .fetch_one(self.pool.pool())
        .await?;
        Ok(exists)
    }

    #[instrument(skip(self, filter))]
    pub async fn list(
        &self,
        org_id: Uuid,
        filter: &ContactFilter,
        page: Pagination,
    ) -> Result<(Vec<Contact>, i64), DatabaseError> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let where_clause = r#"
            WHERE org_id = $1
              AND ($2::TEXT IS NULL
                   OR first_name ILIKE $2 OR last_name ILIKE $2
                   OR email ILIKE $2 OR company ILIKE $2)
              AND ($3::TEXT IS NULL OR status = $3)
        "#;

        let query = format!(
            "SELECT {} FROM contacts {} ORDER BY created_at DESC LIMIT $4 OFFSET $5",
            SELECT_ALL_COLUMNS, where_clause
        );
        let contacts = sqlx::query_as::<_, Contact>(&query)
            .bind(org_id)
            .bind(&pattern)
            .bind(&filter.status)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.pool.pool())
            .await?;

        let count_query = format!("SELECT COUNT(*) FROM contacts {}", where_clause);
        let (total,): (i64,) = sqlx::query_as(&count_query)
            .bind(org_id)
            .bind(&pattern)
            .bind(&filter.status)
            .fetch_one(self.pool.pool())
            .await?;

        Ok((contacts, total))
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self, org_id: Uuid) -> Result<Vec<Contact>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM contacts WHERE org_id = $1 ORDER BY last_name NULLS LAST, first_name",
            SELECT_ALL_COLUMNS
        );
        let contacts = sqlx::query_as::<_, Contact>(&query)
            .bind(org_id)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(contacts)
    }

    #[instrument(skip(self))]
    pub async fn count(&self, org_id: Uuid) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contacts WHERE org_id = $1")
            .bind(org_id)
            .fetch_one(self.pool.pool())
            .await?;
        Ok(count)
    }

    /// Lowercased addresses of every contact with an email
    #[instrument(skip(self))]
    pub async fn list_emails(&self, org_id: Uuid) -> Result<Vec<String>, DatabaseError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT LOWER(email) FROM contacts WHERE org_id = $1 AND email IS NOT NULL",
        )
        .bind(org_id)
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows.into_iter().map(|(e,)| e).collect())
    }

    #[instrument(skip(self, contact), fields(contact_id = %contact.id))]
    pub async fn update(&self, contact: &Contact) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE contacts
            SET first_name = $3, last_name = $4, email = $5, phone = $6, company = $7,
                job_title = $8, status = $9, tags = $10, notes = $11, owner_id = $12,
                updated_at = NOW()
            WHERE org_id = $1 AND id = $2
            "#,
        )
        .bind(contact.org_id)
        .bind(contact.id)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.company)
        .bind(&contact.job_title)
        .bind(contact.status.as_str())
        .bind(&contact.tags)
        .bind(&contact.notes)
        .bind(contact.owner_id)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Contact not found: {}", contact.id)));
        }
        tracing::info!(contact_id = %contact.id, "Contact updated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, org_id: Uuid, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM contacts WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Contact not found: {}", id)));
        }
        tracing::info!(contact_id = %id, "Contact deleted");
        Ok(())
    }
}
