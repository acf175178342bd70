//! Certification repository for database operations
//!
//! CRUD for certifications plus management of the competency association
//! set. Replacing the association set is transactional: existing links are
//! dropped and the requested ones recreated, unknown competency ids are
//! skipped silently.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::core::db::models::{
    Certification, CertificationWithCompetencies, Competency, CreateCertification,
    UpdateCertification,
};

/// Certification repository error types
#[derive(Debug, thiserror::Error)]
pub enum CertificationRepositoryError {
    #[error("Certification not found")]
    NotFound,

    #[error("Certification name already exists")]
    NameAlreadyExists,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Competency row joined with the certification it is linked to
#[derive(Debug, FromRow)]
struct LinkedCompetencyRow {
    certification_id: Uuid,
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LinkedCompetencyRow> for (Uuid, Competency) {
    fn from(row: LinkedCompetencyRow) -> Self {
        (
            row.certification_id,
            Competency {
                id: row.id,
                name: row.name,
                description: row.description,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        )
    }
}

/// Certification repository for database operations
#[derive(Clone)]
pub struct CertificationRepository {
    pool: PgPool,
}

impl CertificationRepository {
    /// Create a new certification repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new certification
    pub async fn create(
        &self,
        dto: &CreateCertification,
    ) -> Result<Certification, CertificationRepositoryError> {
        if self.find_by_name(&dto.name).await?.is_some() {
            return Err(CertificationRepositoryError::NameAlreadyExists);
        }

        let certification = sqlx::query_as::<_, Certification>(
            r#"
            INSERT INTO certifications (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(&dto.name)
        .bind(&dto.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(certification)
    }

    /// Find a certification by ID
    pub async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<Certification>, CertificationRepositoryError> {
        let certification = sqlx::query_as::<_, Certification>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM certifications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(certification)
    }

    /// Find a certification by its unique name
    pub async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Certification>, CertificationRepositoryError> {
        let certification = sqlx::query_as::<_, Certification>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM certifications
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(certification)
    }

    /// List all certifications ordered by name
    pub async fn list(&self) -> Result<Vec<Certification>, CertificationRepositoryError> {
        let certifications = sqlx::query_as::<_, Certification>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM certifications
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(certifications)
    }

    /// Update a certification
    pub async fn update(
        &self,
        id: Uuid,
        updates: &UpdateCertification,
    ) -> Result<Certification, CertificationRepositoryError> {
        if updates.name.is_none() && updates.description.is_none() {
            // No updates, just return the existing certification
            return self
                .find_by_id(id)
                .await?
                .ok_or(CertificationRepositoryError::NotFound);
        }

        // Check name uniqueness if being updated
        if let Some(ref name) = updates.name
            && let Some(existing) = self.find_by_name(name).await?
            && existing.id != id
        {
            return Err(CertificationRepositoryError::NameAlreadyExists);
        }

        let certification = sqlx::query_as::<_, Certification>(
            r#"
            UPDATE certifications
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
        .bind(updates.description.is_some()) // Flag for description update
        .bind(updates.description.as_ref().and_then(|d| d.as_ref())) // Actual description value
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CertificationRepositoryError::NotFound)?;

        Ok(certification)
    }

    /// Delete a certification by ID
    pub async fn delete(&self, id: Uuid) -> Result<bool, CertificationRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM certifications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the competency association set of a certification.
    ///
    /// Unknown competency ids are skipped without error; passing an empty
    /// slice clears the set.
    pub async fn set_competencies(
        &self,
        certification_id: Uuid,
        competency_ids: &[Uuid],
    ) -> Result<(), CertificationRepositoryError> {
        if self.find_by_id(certification_id).await?.is_none() {
            return Err(CertificationRepositoryError::NotFound);
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM certification_competencies
            WHERE certification_id = $1
            "#,
        )
        .bind(certification_id)
        .execute(&mut *tx)
        .await?;

        // SELECT against competencies drops ids that don't exist
        sqlx::query(
            r#"
            INSERT INTO certification_competencies (certification_id, competency_id)
            SELECT $1, id
            FROM competencies
            WHERE id = ANY($2)
            "#,
        )
        .bind(certification_id)
        .bind(competency_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Competencies linked to one certification, ordered by name
    pub async fn competencies_for(
        &self,
        certification_id: Uuid,
    ) -> Result<Vec<Competency>, CertificationRepositoryError> {
        let competencies = sqlx::query_as::<_, Competency>(
            r#"
            SELECT c.id, c.name, c.description, c.created_at, c.updated_at
            FROM competencies c
            INNER JOIN certification_competencies cc ON cc.competency_id = c.id
            WHERE cc.certification_id = $1
            ORDER BY c.name
            "#,
        )
        .bind(certification_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(competencies)
    }

    /// Find a certification with its competencies embedded
    pub async fn find_with_competencies(
        &self,
        id: Uuid,
    ) -> Result<Option<CertificationWithCompetencies>, CertificationRepositoryError> {
        let certification = match self.find_by_id(id).await? {
            Some(c) => c,
            None => return Ok(None),
        };

        let competencies = self.competencies_for(id).await?;

        Ok(Some(CertificationWithCompetencies::new(
            certification,
            competencies,
        )))
    }

    /// List all certifications with their competencies embedded
    pub async fn list_with_competencies(
        &self,
    ) -> Result<Vec<CertificationWithCompetencies>, CertificationRepositoryError> {
        let certifications = self.list().await?;

        let rows = sqlx::query_as::<_, LinkedCompetencyRow>(
            r#"
            SELECT cc.certification_id, c.id, c.name, c.description, c.created_at, c.updated_at
            FROM competencies c
            INNER JOIN certification_competencies cc ON cc.competency_id = c.id
            ORDER BY c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_certification: HashMap<Uuid, Vec<Competency>> = HashMap::new();
        for row in rows {
            let (certification_id, competency) = row.into();
            by_certification
                .entry(certification_id)
                .or_default()
                .push(competency);
        }

        let result = certifications
            .into_iter()
            .map(|certification| {
                let competencies = by_certification
                    .remove(&certification.id)
                    .unwrap_or_default();
                CertificationWithCompetencies::new(certification, competencies)
            })
            .collect();

        Ok(result)
    }
}
