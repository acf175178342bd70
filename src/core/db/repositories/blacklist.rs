//! Refresh-token blacklist repository
//!
//! Stores the jti of every refresh token revoked at logout. Revocation must
//! be idempotent: blacklisting the same jti twice is a no-op, and lookup is
//! a single indexed probe on the jti column. user_id is recorded without a
//! foreign key so revocations outlive account deletion.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::BlacklistEntry;

/// Blacklist repository error types
#[derive(Debug, thiserror::Error)]
pub enum BlacklistRepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Repository for revoked refresh tokens
#[derive(Clone)]
pub struct BlacklistRepository {
    pool: PgPool,
}

impl BlacklistRepository {
    /// Create a new blacklist repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a revoked refresh token.
    ///
    /// Returns `true` if the jti was newly inserted, `false` if it was
    /// already blacklisted. Either way the token ends up revoked.
    pub async fn blacklist(
        &self,
        jti: Uuid,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, BlacklistRepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO token_blacklist (jti, user_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(jti)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check whether a jti has been revoked
    pub async fn is_blacklisted(&self, jti: Uuid) -> Result<bool, BlacklistRepositoryError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(SELECT 1 FROM token_blacklist WHERE jti = $1)
            "#,
        )
        .bind(jti)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Fetch the full blacklist entry for a jti, if present
    pub async fn find_by_jti(
        &self,
        jti: Uuid,
    ) -> Result<Option<BlacklistEntry>, BlacklistRepositoryError> {
        let entry = sqlx::query_as::<_, BlacklistEntry>(
            r#"
            SELECT id, jti, user_id, expires_at, blacklisted_at
            FROM token_blacklist
            WHERE jti = $1
            "#,
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Number of revoked tokens recorded for one user
    pub async fn count_for_user(&self, user_id: Uuid) -> Result<i64, BlacklistRepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM token_blacklist WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Delete entries whose underlying token has expired anyway.
    ///
    /// An expired refresh token fails signature validation before the
    /// blacklist is ever consulted, so these rows only take up space.
    pub async fn flush_expired(&self) -> Result<u64, BlacklistRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM token_blacklist
            WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
