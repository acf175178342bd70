//! Competency repository for database operations

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{Competency, CreateCompetency, UpdateCompetency};

/// Competency repository error types
#[derive(Debug, thiserror::Error)]
pub enum CompetencyRepositoryError {
    #[error("Competency not found")]
    NotFound,

    #[error("Competency name already exists")]
    NameAlreadyExists,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Competency repository for database operations
#[derive(Clone)]
pub struct CompetencyRepository {
    pool: PgPool,
}

impl CompetencyRepository {
    /// Create a new competency repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new competency
    pub async fn create(
        &self,
        dto: &CreateCompetency,
    ) -> Result<Competency, CompetencyRepositoryError> {
        if self.find_by_name(&dto.name).await?.is_some() {
            return Err(CompetencyRepositoryError::NameAlreadyExists);
        }

        let competency = sqlx::query_as::<_, Competency>(
            r#"
            INSERT INTO competencies (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(&dto.name)
        .bind(&dto.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(competency)
    }

    /// Find a competency by ID
    pub async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<Competency>, CompetencyRepositoryError> {
        let competency = sqlx::query_as::<_, Competency>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM competencies
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(competency)
    }

    /// Find a competency by its unique name
    pub async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Competency>, CompetencyRepositoryError> {
        let competency = sqlx::query_as::<_, Competency>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM competencies
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(competency)
    }

    /// List all competencies ordered by name
    pub async fn list(&self) -> Result<Vec<Competency>, CompetencyRepositoryError> {
        let competencies = sqlx::query_as::<_, Competency>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM competencies
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(competencies)
    }

    /// Update a competency
    pub async fn update(
        &self,
        id: Uuid,
        updates: &UpdateCompetency,
    ) -> Result<Competency, CompetencyRepositoryError> {
        if updates.name.is_none() && updates.description.is_none() {
            // No updates, just return the existing competency
            return self
                .find_by_id(id)
                .await?
                .ok_or(CompetencyRepositoryError::NotFound);
        }

        // Check name uniqueness if being updated
        if let Some(ref name) = updates.name
            && let Some(existing) = self.find_by_name(name).await?
            && existing.id != id
        {
            return Err(CompetencyRepositoryError::NameAlreadyExists);
        }

        let competency = sqlx::query_as::<_, Competency>(
            r#"
            UPDATE competencies
            SET
                name = COALESCE($2, name),
                description = CASE WHEN $3::boolean THEN $4 ELSE description END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&updates.name)
        .bind(updates.description.is_some())
        .bind(updates.description.as_ref().and_then(|d| d.as_ref()))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CompetencyRepositoryError::NotFound)?;

        Ok(competency)
    }

    /// Delete a competency by ID
    pub async fn delete(&self, id: Uuid) -> Result<bool, CompetencyRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM competencies
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
