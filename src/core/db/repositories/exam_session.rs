//! Exam session repository for database operations
//!
//! Sessions are created in progress and completed exactly once; the
//! completion update is guarded so a session can never be scored twice.

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::ExamSession;

/// Exam session repository error types
#[derive(Debug, thiserror::Error)]
pub enum ExamSessionRepositoryError {
    #[error("Exam session not found")]
    NotFound,

    #[error("Certification not found")]
    CertificationNotFound,

    #[error("Exam session already completed")]
    AlreadyCompleted,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Exam session repository for database operations
#[derive(Clone)]
pub struct ExamSessionRepository {
    pool: PgPool,
}

impl ExamSessionRepository {
    /// Create a new exam session repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Start a new in-progress session for a user and certification
    pub async fn create(
        &self,
        user_id: Uuid,
        certification_id: Uuid,
    ) -> Result<ExamSession, ExamSessionRepositoryError> {
        let certification_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM certifications WHERE id = $1)",
        )
        .bind(certification_id)
        .fetch_one(&self.pool)
        .await?;

        if !certification_exists {
            return Err(ExamSessionRepositoryError::CertificationNotFound);
        }

        let session = sqlx::query_as::<_, ExamSession>(
            r#"
            INSERT INTO exam_sessions (user_id, certification_id)
            VALUES ($1, $2)
            RETURNING id, user_id, certification_id, started_at, completed_at, score
            "#,
        )
        .bind(user_id)
        .bind(certification_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    /// Find a session by ID
    pub async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<ExamSession>, ExamSessionRepositoryError> {
        let session = sqlx::query_as::<_, ExamSession>(
            r#"
            SELECT id, user_id, certification_id, started_at, completed_at, score
            FROM exam_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// List sessions belonging to one user, newest first
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ExamSession>, ExamSessionRepositoryError> {
        let sessions = sqlx::query_as::<_, ExamSession>(
            r#"
            SELECT id, user_id, certification_id, started_at, completed_at, score
            FROM exam_sessions
            WHERE user_id = $1
            ORDER BY started_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    /// List every session, newest first
    pub async fn list_all(&self) -> Result<Vec<ExamSession>, ExamSessionRepositoryError> {
        let sessions = sqlx::query_as::<_, ExamSession>(
            r#"
            SELECT id, user_id, certification_id, started_at, completed_at, score
            FROM exam_sessions
            ORDER BY started_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    /// Complete a session with a final score.
    ///
    /// The update only matches sessions still in progress; if two callers
    /// race, the loser gets `AlreadyCompleted`.
    pub async fn complete(
        &self,
        id: Uuid,
        score: f64,
    ) -> Result<ExamSession, ExamSessionRepositoryError> {
        let session = sqlx::query_as::<_, ExamSession>(
            r#"
            UPDATE exam_sessions
            SET completed_at = NOW(), score = $2
            WHERE id = $1 AND completed_at IS NULL
            RETURNING id, user_id, certification_id, started_at, completed_at, score
            "#,
        )
        .bind(id)
        .bind(score)
        .fetch_optional(&self.pool)
        .await?;

        match session {
            Some(s) => Ok(s),
            None => {
                // Either the session never existed or it was already scored
                if self.find_by_id(id).await?.is_some() {
                    Err(ExamSessionRepositoryError::AlreadyCompleted)
                } else {
                    Err(ExamSessionRepositoryError::NotFound)
                }
            }
        }
    }

    /// Delete a session by ID
    pub async fn delete(&self, id: Uuid) -> Result<bool, ExamSessionRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM exam_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
