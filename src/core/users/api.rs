//! User management API endpoints
//!
//! Provides REST API endpoints for account administration:
//! - GET /users/ - List all users, ordered by username (admin)
//! - GET /users/{user_id}/ - Get user detail (admin)
//! - PUT /users/update/ - Update the caller's own profile
//! - PUT /users/{user_id}/ - Update any user (admin)
//! - DELETE /users/{user_id}/delete/ - Delete a user (admin)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, put},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::extract::{AuthFailure, Authenticator};
use crate::core::auth::service::AuthService;
use crate::core::authz::{Action, authorize};
use crate::core::db::models::{UpdateUser, User, UserDetail, UserListItem, UserResponse};
use crate::core::db::repositories::{UserRepository, UserRepositoryError};

/// User API state
#[derive(Clone)]
pub struct UserApiState {
    pub user_repo: UserRepository,
    pub authenticator: Authenticator,
}

/// User API error types
#[derive(Debug, thiserror::Error)]
pub enum UserApiError {
    #[error(transparent)]
    Auth(#[from] AuthFailure),

    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("User not found")]
    NotFound,

    #[error("Cannot delete a superuser.")]
    SuperuserDelete,

    #[error("{0} is required.")]
    MissingField(&'static str),

    #[error("Enter a valid email address.")]
    InvalidEmail,

    #[error("This password is too short. It must contain at least 8 characters.")]
    PasswordTooShort,

    #[error("Username already exists")]
    UsernameAlreadyExists,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("An internal error has occurred.")]
    InternalError(String),
}

impl From<UserRepositoryError> for UserApiError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => UserApiError::NotFound,
            UserRepositoryError::UsernameAlreadyExists => UserApiError::UsernameAlreadyExists,
            UserRepositoryError::EmailAlreadyExists => UserApiError::EmailAlreadyExists,
            other => UserApiError::InternalError(other.to_string()),
        }
    }
}

impl IntoResponse for UserApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            UserApiError::Auth(failure) => return failure.clone().into_response(),
            UserApiError::PermissionDenied | UserApiError::SuperuserDelete => {
                StatusCode::FORBIDDEN
            }
            UserApiError::NotFound => StatusCode::NOT_FOUND,
            UserApiError::MissingField(_)
            | UserApiError::InvalidEmail
            | UserApiError::PasswordTooShort
            | UserApiError::UsernameAlreadyExists
            | UserApiError::EmailAlreadyExists => StatusCode::BAD_REQUEST,
            UserApiError::InternalError(detail) => {
                tracing::error!("User API internal error: {}", detail);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = json!({ "error": self.to_string() });

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Request for updating a user, self-service or by an admin
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

// ============================================================================
// Router
// ============================================================================

/// Create the user API router
pub fn user_api_router(state: UserApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/users/", get(list_users_handler))
        .route("/users/update/", put(self_update_handler))
        .route(
            "/users/{user_id}/",
            get(get_user_handler).put(admin_update_handler),
        )
        .route("/users/{user_id}/delete/", delete(delete_user_handler))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /users/
/// List all users ordered by username (admin only)
async fn list_users_handler(
    State(state): State<Arc<UserApiState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserListItem>>, UserApiError> {
    require_admin(&state, &headers).await?;

    tracing::debug!("Listing users");

    let users = state.user_repo.list_ordered().await?;

    Ok(Json(users))
}

/// GET /users/{user_id}/
/// Get a user's detail (admin only)
async fn get_user_handler(
    State(state): State<Arc<UserApiState>>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserDetail>, UserApiError> {
    require_admin(&state, &headers).await?;

    tracing::debug!("Getting user {}", user_id);

    let user = state
        .user_repo
        .find_by_id(user_id)
        .await?
        .ok_or(UserApiError::NotFound)?;

    Ok(Json(user.into()))
}

/// PUT /users/update/
/// Update the caller's own profile
async fn self_update_handler(
    State(state): State<Arc<UserApiState>>,
    headers: HeaderMap,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, UserApiError> {
    let user = state.authenticator.authenticate(&headers).await?;

    tracing::info!("User {} updating own profile", user.username);

    let updates = build_update(request).await?;
    let updated = state.user_repo.update(user.id, &updates).await?;

    Ok(Json(updated.into()))
}

/// PUT /users/{user_id}/
/// Update any user (admin only)
async fn admin_update_handler(
    State(state): State<Arc<UserApiState>>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, UserApiError> {
    let admin = require_admin(&state, &headers).await?;

    tracing::info!("Admin {} updating user {}", admin.username, user_id);

    let updates = build_update(request).await?;
    let updated = state.user_repo.update(user_id, &updates).await?;

    Ok(Json(updated.into()))
}

/// DELETE /users/{user_id}/delete/
/// Delete a user (admin only); superusers cannot be deleted
async fn delete_user_handler(
    State(state): State<Arc<UserApiState>>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, UserApiError> {
    let admin = require_admin(&state, &headers).await?;

    tracing::info!("Admin {} deleting user {}", admin.username, user_id);

    let target = state
        .user_repo
        .find_by_id(user_id)
        .await?
        .ok_or(UserApiError::NotFound)?;

    if target.is_superuser {
        return Err(UserApiError::SuperuserDelete);
    }

    state.user_repo.delete(user_id).await?;

    tracing::info!("User deleted: {}", user_id);

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Authenticate the caller and require staff privileges
async fn require_admin(
    state: &UserApiState,
    headers: &HeaderMap,
) -> Result<User, UserApiError> {
    let user = state.authenticator.authenticate(headers).await?;

    if !authorize(&user, Action::ManageUsers) {
        return Err(UserApiError::PermissionDenied);
    }

    Ok(user)
}

/// Validate an update request and hash its password if present.
///
/// Username and email are mandatory on update; the password only has to
/// clear the minimum length check here, the full policy applies at
/// registration.
async fn build_update(request: UpdateUserRequest) -> Result<UpdateUser, UserApiError> {
    let username = request
        .username
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(UserApiError::MissingField("Username"))?;

    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(UserApiError::MissingField("Email"))?;

    AuthService::validate_email(email).map_err(|_| UserApiError::InvalidEmail)?;

    let password_hash = match request.password {
        Some(password) => {
            if password.chars().count() < 8 {
                return Err(UserApiError::PasswordTooShort);
            }
            Some(UserRepository::hash_password_blocking(password).await?)
        }
        None => None,
    };

    Ok(UpdateUser {
        username: Some(username.to_string()),
        email: Some(email.to_string()),
        password_hash,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_update_requires_username() {
        let request = UpdateUserRequest {
            username: None,
            email: Some("alice@example.com".to_string()),
            password: None,
        };

        let result = build_update(request).await;
        assert!(matches!(result, Err(UserApiError::MissingField("Username"))));
    }

    #[tokio::test]
    async fn test_build_update_requires_email() {
        let request = UpdateUserRequest {
            username: Some("alice".to_string()),
            email: Some("   ".to_string()),
            password: None,
        };

        let result = build_update(request).await;
        assert!(matches!(result, Err(UserApiError::MissingField("Email"))));
    }

    #[tokio::test]
    async fn test_build_update_rejects_invalid_email() {
        let request = UpdateUserRequest {
            username: Some("alice".to_string()),
            email: Some("not-an-email".to_string()),
            password: None,
        };

        let result = build_update(request).await;
        assert!(matches!(result, Err(UserApiError::InvalidEmail)));
    }

    #[tokio::test]
    async fn test_build_update_rejects_short_password() {
        let request = UpdateUserRequest {
            username: Some("alice".to_string()),
            email: Some("alice@example.com".to_string()),
            password: Some("short".to_string()),
        };

        let result = build_update(request).await;
        assert!(matches!(result, Err(UserApiError::PasswordTooShort)));
    }

    #[tokio::test]
    async fn test_build_update_without_password() {
        let request = UpdateUserRequest {
            username: Some("  alice  ".to_string()),
            email: Some("alice@example.com".to_string()),
            password: None,
        };

        let updates = build_update(request).await.unwrap();
        assert_eq!(updates.username.as_deref(), Some("alice"));
        assert_eq!(updates.email.as_deref(), Some("alice@example.com"));
        assert!(updates.password_hash.is_none());
    }

    #[tokio::test]
    async fn test_build_update_hashes_password() {
        let request = UpdateUserRequest {
            username: Some("alice".to_string()),
            email: Some("alice@example.com".to_string()),
            password: Some("correct-horse-battery".to_string()),
        };

        let updates = build_update(request).await.unwrap();
        let hash = updates.password_hash.unwrap();
        assert_ne!(hash, "correct-horse-battery");
        assert!(UserRepository::verify_password("correct-horse-battery", &hash).unwrap());
    }

    #[test]
    fn test_update_user_request_deserialization() {
        let json = r#"{
            "username": "alice",
            "email": "alice@example.com",
            "password": "new-password-1"
        }"#;

        let request: UpdateUserRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.username.as_deref(), Some("alice"));
        assert_eq!(request.email.as_deref(), Some("alice@example.com"));
        assert_eq!(request.password.as_deref(), Some("new-password-1"));
    }

    #[test]
    fn test_update_user_request_without_password() {
        let json = r#"{"username": "alice", "email": "alice@example.com"}"#;

        let request: UpdateUserRequest = serde_json::from_str(json).unwrap();

        assert!(request.password.is_none());
    }

    #[test]
    fn test_user_api_error_status_codes() {
        assert_eq!(
            UserApiError::Auth(AuthFailure::MissingCredentials)
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            UserApiError::PermissionDenied.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            UserApiError::SuperuserDelete.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            UserApiError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            UserApiError::MissingField("Username").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UserApiError::PasswordTooShort.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UserApiError::InternalError("db".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_user_api_error_display() {
        assert_eq!(
            UserApiError::PermissionDenied.to_string(),
            "You do not have permission to perform this action."
        );
        assert_eq!(
            UserApiError::SuperuserDelete.to_string(),
            "Cannot delete a superuser."
        );
        assert_eq!(
            UserApiError::MissingField("Username").to_string(),
            "Username is required."
        );
    }

    #[test]
    fn test_user_repository_error_conversion() {
        let err: UserApiError = UserRepositoryError::NotFound.into();
        assert!(matches!(err, UserApiError::NotFound));

        let err: UserApiError = UserRepositoryError::UsernameAlreadyExists.into();
        assert!(matches!(err, UserApiError::UsernameAlreadyExists));

        let err: UserApiError = UserRepositoryError::EmailAlreadyExists.into();
        assert!(matches!(err, UserApiError::EmailAlreadyExists));
    }
}
