//! User repository for database operations
//!
//! Provides CRUD operations for users with secure password hashing using bcrypt.

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::DbError;
use crate::core::db::models::{CreateUser, UpdateUser, User, UserListItem};

/// Cost factor for bcrypt hashing (12 is recommended for production)
const BCRYPT_COST: u32 = 12;

/// User repository error types
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("User not found")]
    NotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Username already exists")]
    UsernameAlreadyExists,

    #[error("Password hashing failed: {0}")]
    HashingError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<DbError> for UserRepositoryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConnectionError(e) => UserRepositoryError::DatabaseError(e),
            _ => UserRepositoryError::DatabaseError(sqlx::Error::Protocol(err.to_string())),
        }
    }
}

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Hash a password using bcrypt with automatic salt generation
    pub fn hash_password(password: &str) -> Result<String, UserRepositoryError> {
        bcrypt::hash(password, BCRYPT_COST)
            .map_err(|e| UserRepositoryError::HashingError(e.to_string()))
    }

    /// Verify a password against a bcrypt hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, UserRepositoryError> {
        bcrypt::verify(password, hash).map_err(|e| UserRepositoryError::HashingError(e.to_string()))
    }

    /// Hash a password on the blocking pool; bcrypt at cost 12 takes
    /// long enough to stall an async worker otherwise.
    pub async fn hash_password_blocking(password: String) -> Result<String, UserRepositoryError> {
        tokio::task::spawn_blocking(move || Self::hash_password(&password))
            .await
            .map_err(|e| UserRepositoryError::HashingError(e.to_string()))?
    }

    /// Verify a password on the blocking pool
    pub async fn verify_password_blocking(
        password: String,
        hash: String,
    ) -> Result<bool, UserRepositoryError> {
        tokio::task::spawn_blocking(move || Self::verify_password(&password, &hash))
            .await
            .map_err(|e| UserRepositoryError::HashingError(e.to_string()))?
    }

    /// Create a new user with a plain text password (will be hashed)
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, UserRepositoryError> {
        // Check if username already exists
        if self.find_by_username(username).await?.is_some() {
            return Err(UserRepositoryError::UsernameAlreadyExists);
        }

        // Check if email already exists
        if self.find_by_email(email).await?.is_some() {
            return Err(UserRepositoryError::EmailAlreadyExists);
        }

        let password_hash = Self::hash_password_blocking(password.to_string()).await?;

        self.create_from_dto(&CreateUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
        })
        .await
    }

    /// Create a user from a CreateUser struct (password_hash should already be hashed)
    pub async fn create_from_dto(&self, dto: &CreateUser) -> Result<User, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, is_staff, is_superuser,
                      last_login, created_at, updated_at
            "#,
        )
        .bind(&dto.username)
        .bind(&dto.email)
        .bind(&dto.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, is_staff, is_superuser,
                   last_login, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, is_staff, is_superuser,
                   last_login, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by username
    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, is_staff, is_superuser,
                   last_login, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Authenticate a user by username and password.
    /// Returns the user if credentials are valid, None otherwise.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        let user = match self.find_by_username(username).await? {
            Some(u) => u,
            None => return Ok(None),
        };

        let is_valid =
            Self::verify_password_blocking(password.to_string(), user.password_hash.clone())
                .await?;

        if is_valid { Ok(Some(user)) } else { Ok(None) }
    }

    /// Stamp last_login with the current time
    pub async fn touch_last_login(&self, id: Uuid) -> Result<(), UserRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserRepositoryError::NotFound);
        }

        Ok(())
    }

    /// Update a user; password_hash in the DTO must already be hashed
    pub async fn update(
        &self,
        id: Uuid,
        updates: &UpdateUser,
    ) -> Result<User, UserRepositoryError> {
        // First check if user exists
        if self.find_by_id(id).await?.is_none() {
            return Err(UserRepositoryError::NotFound);
        }

        // Check username uniqueness if being updated
        if let Some(ref username) = updates.username
            && let Some(existing) = self.find_by_username(username).await?
            && existing.id != id
        {
            return Err(UserRepositoryError::UsernameAlreadyExists);
        }

        // Check email uniqueness if being updated
        if let Some(ref email) = updates.email
            && let Some(existing) = self.find_by_email(email).await?
            && existing.id != id
        {
            return Err(UserRepositoryError::EmailAlreadyExists);
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, username, email, password_hash, is_staff, is_superuser,
                      last_login, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&updates.username)
        .bind(&updates.email)
        .bind(&updates.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Update user's password (takes plain text, hashes it)
    pub async fn update_password(
        &self,
        id: Uuid,
        new_password: &str,
    ) -> Result<(), UserRepositoryError> {
        let password_hash = Self::hash_password_blocking(new_password.to_string()).await?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserRepositoryError::NotFound);
        }

        Ok(())
    }

    /// Delete a user by ID
    pub async fn delete(&self, id: Uuid) -> Result<bool, UserRepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all users ordered by username, as compact projections
    pub async fn list_ordered(&self) -> Result<Vec<UserListItem>, UserRepositoryError> {
        let users = sqlx::query_as::<_, UserListItem>(
            r#"
            SELECT id, username
            FROM users
            ORDER BY username
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Password Hashing Tests (don't require database)
    // ========================================================================

    #[test]
    fn test_hash_password_produces_valid_bcrypt_hash() {
        let password = "my_secure_password123!";
        let hash = UserRepository::hash_password(password).unwrap();

        // Bcrypt hashes start with $2b$ (or $2a$, $2y$)
        assert!(hash.starts_with("$2b$") || hash.starts_with("$2a$") || hash.starts_with("$2y$"));

        // Bcrypt hash should be 60 characters
        assert_eq!(hash.len(), 60);
    }

    #[test]
    fn test_hash_password_produces_different_hashes_for_same_password() {
        let password = "same_password";
        let hash1 = UserRepository::hash_password(password).unwrap();
        let hash2 = UserRepository::hash_password(password).unwrap();

        // Due to random salt, hashes should be different
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password_correct() {
        let password = "correct_password";
        let hash = UserRepository::hash_password(password).unwrap();

        let is_valid = UserRepository::verify_password(password, &hash).unwrap();
        assert!(is_valid);
    }

    #[test]
    fn test_verify_password_incorrect() {
        let password = "correct_password";
        let wrong_password = "wrong_password";
        let hash = UserRepository::hash_password(password).unwrap();

        let is_valid = UserRepository::verify_password(wrong_password, &hash).unwrap();
        assert!(!is_valid);
    }

    #[test]
    fn test_verify_password_unicode() {
        let password = "пароль_密码_🔐";
        let hash = UserRepository::hash_password(password).unwrap();

        let is_valid = UserRepository::verify_password(password, &hash).unwrap();
        assert!(is_valid);
    }

    #[test]
    fn test_verify_password_long_password() {
        // Bcrypt has a max input length of 72 bytes
        let password = "a".repeat(72);
        let hash = UserRepository::hash_password(&password).unwrap();

        let is_valid = UserRepository::verify_password(&password, &hash).unwrap();
        assert!(is_valid);
    }

    #[test]
    fn test_verify_password_invalid_hash_format() {
        let result = UserRepository::verify_password("password", "not_a_valid_hash");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_hash_and_verify_on_blocking_pool() {
        let hash = UserRepository::hash_password_blocking("async_password".to_string())
            .await
            .unwrap();

        let is_valid =
            UserRepository::verify_password_blocking("async_password".to_string(), hash.clone())
                .await
                .unwrap();
        assert!(is_valid);

        let is_invalid =
            UserRepository::verify_password_blocking("other_password".to_string(), hash)
                .await
                .unwrap();
        assert!(!is_invalid);
    }

    // ========================================================================
    // Error Type Tests
    // ========================================================================

    #[test]
    fn test_user_repository_error_display() {
        let err = UserRepositoryError::NotFound;
        assert_eq!(format!("{}", err), "User not found");

        let err = UserRepositoryError::EmailAlreadyExists;
        assert_eq!(format!("{}", err), "Email already exists");

        let err = UserRepositoryError::UsernameAlreadyExists;
        assert_eq!(format!("{}", err), "Username already exists");

        let err = UserRepositoryError::HashingError("test error".to_string());
        assert!(format!("{}", err).contains("test error"));
    }

    // ========================================================================
    // Integration Tests (require database)
    // ========================================================================

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_user() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let user = repo
            .create("test_create_user", "test_create@example.com", "secure_password123")
            .await
            .unwrap();

        assert_eq!(user.username, "test_create_user");
        assert_eq!(user.email, "test_create@example.com");
        assert!(!user.is_staff);
        assert!(!user.is_superuser);
        assert!(user.last_login.is_none());
        // Password should be hashed, not plain text
        assert_ne!(user.password_hash, "secure_password123");
        assert!(user.password_hash.starts_with("$2"));

        // Cleanup
        repo.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_user_duplicate_email() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let user = repo
            .create("unique_user1", "duplicate@example.com", "password")
            .await
            .unwrap();

        let result = repo
            .create("unique_user2", "duplicate@example.com", "password")
            .await;

        assert!(matches!(
            result,
            Err(UserRepositoryError::EmailAlreadyExists)
        ));

        // Cleanup
        repo.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_user_duplicate_username() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let user = repo
            .create("duplicate_username", "unique1@example.com", "password")
            .await
            .unwrap();

        let result = repo
            .create("duplicate_username", "unique2@example.com", "password")
            .await;

        assert!(matches!(
            result,
            Err(UserRepositoryError::UsernameAlreadyExists)
        ));

        // Cleanup
        repo.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_authenticate_success() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let created = repo
            .create("auth_user", "auth@example.com", "correct_password")
            .await
            .unwrap();

        let result = repo
            .authenticate("auth_user", "correct_password")
            .await
            .unwrap();

        assert!(result.is_some());
        assert_eq!(result.unwrap().id, created.id);

        // Cleanup
        repo.delete(created.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_authenticate_wrong_password() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let created = repo
            .create("auth_fail_user", "auth_fail@example.com", "correct_password")
            .await
            .unwrap();

        let result = repo
            .authenticate("auth_fail_user", "wrong_password")
            .await
            .unwrap();

        assert!(result.is_none());

        // Cleanup
        repo.delete(created.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_authenticate_nonexistent_user() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let result = repo
            .authenticate("nonexistent_user", "password")
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_touch_last_login() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let created = repo
            .create("login_stamp_user", "login_stamp@example.com", "password")
            .await
            .unwrap();
        assert!(created.last_login.is_none());

        repo.touch_last_login(created.id).await.unwrap();

        let reloaded = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert!(reloaded.last_login.is_some());

        // Cleanup
        repo.delete(created.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_update_user() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let created = repo
            .create("update_user", "update@example.com", "password")
            .await
            .unwrap();

        let updates = UpdateUser {
            username: Some("updated_username".to_string()),
            email: Some("updated@example.com".to_string()),
            password_hash: None,
        };

        let updated = repo.update(created.id, &updates).await.unwrap();

        assert_eq!(updated.username, "updated_username");
        assert_eq!(updated.email, "updated@example.com");
        // Untouched fields survive the COALESCE update
        assert_eq!(updated.password_hash, created.password_hash);

        // Cleanup
        repo.delete(created.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_update_user_not_found() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let updates = UpdateUser {
            username: Some("ghost".to_string()),
            ..Default::default()
        };

        let result = repo.update(Uuid::new_v4(), &updates).await;
        assert!(matches!(result, Err(UserRepositoryError::NotFound)));
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_update_password() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let created = repo
            .create("update_pass_user", "update_pass@example.com", "old_password")
            .await
            .unwrap();

        repo.update_password(created.id, "new_password")
            .await
            .unwrap();

        // Old password should fail
        let result = repo
            .authenticate("update_pass_user", "old_password")
            .await
            .unwrap();
        assert!(result.is_none());

        // New password should work
        let result = repo
            .authenticate("update_pass_user", "new_password")
            .await
            .unwrap();
        assert!(result.is_some());

        // Cleanup
        repo.delete(created.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_delete_user() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let created = repo
            .create("delete_user", "delete@example.com", "password")
            .await
            .unwrap();

        let deleted = repo.delete(created.id).await.unwrap();
        assert!(deleted);

        let found = repo.find_by_id(created.id).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_delete_nonexistent_user() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let deleted = repo.delete(Uuid::new_v4()).await.unwrap();
        assert!(!deleted);
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_list_ordered_by_username() {
        let pool = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let unique_id = Uuid::new_v4().to_string();
        let username1 = format!("zz_list_{}", &unique_id[..8]);
        let username2 = format!("aa_list_{}", &unique_id[..8]);

        let user1 = repo
            .create(&username1, &format!("z_{}@example.com", &unique_id[..8]), "Password123")
            .await
            .unwrap();
        let user2 = repo
            .create(&username2, &format!("a_{}@example.com", &unique_id[..8]), "Password123")
            .await
            .unwrap();

        let users = repo.list_ordered().await.unwrap();
        let usernames: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();

        let mut sorted = usernames.clone();
        sorted.sort();
        assert_eq!(usernames, sorted, "listing should be ordered by username");

        let pos1 = usernames.iter().position(|u| *u == username1).unwrap();
        let pos2 = usernames.iter().position(|u| *u == username2).unwrap();
        assert!(pos2 < pos1);

        // Cleanup
        repo.delete(user1.id).await.unwrap();
        repo.delete(user2.id).await.unwrap();
    }

    // Helper function to create test pool
    async fn create_test_pool() -> PgPool {
        use crate::core::db::pool::{DbConfig, create_pool};

        let config = DbConfig::from_env().expect("DATABASE_URL must be set for tests");
        create_pool(&config)
            .await
            .expect("Failed to create test pool")
    }
}
