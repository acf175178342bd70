//! Auth API endpoints
//!
//! Session lifecycle endpoints:
//! - POST /token/ - Login and get an access/refresh pair
//! - POST /token/refresh/ - Mint a new access token
//! - POST /logout/ - Revoke a refresh token
//! - POST /register/ - Register a new user
//! - POST /reset-password/ - Replace a forgotten password
//! - GET / and GET /dashboard/ - Authenticated landing messages

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::core::auth::extract::{AuthFailure, Authenticator};
use crate::core::auth::jwt::TokenPair;
use crate::core::auth::service::{
    AuthError, AuthService, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest,
    ResetPasswordRequest, ResetPasswordResponse,
};
use crate::core::db::models::UserResponse;

/// Auth API state
#[derive(Clone)]
pub struct AuthApiState {
    pub auth_service: AuthService,
    pub authenticator: Authenticator,
}

/// Convert AuthError to its wire response
///
/// Credential and token failures are 401 with a `detail` key (the shape
/// token-refresh clients expect); everything else uses an `error` key.
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::TokenBlacklisted => StatusCode::UNAUTHORIZED,
            AuthError::MissingField(_)
            | AuthError::LogoutTokenInvalid
            | AuthError::InvalidEmail
            | AuthError::PasswordTooShort
            | AuthError::PasswordEntirelyNumeric
            | AuthError::PasswordTooSimilar
            | AuthError::UsernameAlreadyExists
            | AuthError::EmailAlreadyExists => StatusCode::BAD_REQUEST,
            AuthError::EmailNotFound => StatusCode::NOT_FOUND,
            AuthError::InternalError(detail) => {
                tracing::error!("Auth internal error: {}", detail);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = if status == StatusCode::UNAUTHORIZED {
            json!({ "detail": self.to_string() })
        } else {
            json!({ "error": self.to_string() })
        };

        (status, Json(body)).into_response()
    }
}

/// Error type for auth handlers, merging authentication and service failures
#[derive(Debug, thiserror::Error)]
pub enum AuthApiError {
    #[error(transparent)]
    Auth(#[from] AuthFailure),

    #[error(transparent)]
    Service(#[from] AuthError),
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        match self {
            AuthApiError::Auth(failure) => failure.into_response(),
            AuthApiError::Service(error) => error.into_response(),
        }
    }
}

/// Home response
#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub message: String,
    pub user: String,
}

/// Single-message response for dashboard and logout
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Create the auth API router
pub fn auth_api_router(state: AuthApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/", get(home_handler))
        .route("/dashboard/", get(dashboard_handler))
        .route("/token/", post(login_handler))
        .route("/token/refresh/", post(refresh_handler))
        .route("/logout/", post(logout_handler))
        .route("/register/", post(register_handler))
        .route("/reset-password/", post(reset_password_handler))
        .with_state(state)
}

/// GET /
/// Welcome message naming the authenticated caller
async fn home_handler(
    State(state): State<Arc<AuthApiState>>,
    headers: HeaderMap,
) -> Result<Json<HomeResponse>, AuthFailure> {
    let user = state.authenticator.authenticate(&headers).await?;

    Ok(Json(HomeResponse {
        message: "Welcome to the API!".to_string(),
        user: user.username,
    }))
}

/// GET /dashboard/
async fn dashboard_handler(
    State(state): State<Arc<AuthApiState>>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AuthFailure> {
    state.authenticator.authenticate(&headers).await?;

    Ok(Json(MessageResponse {
        message: "Welcome to the Dashboard".to_string(),
    }))
}

/// POST /token/
/// Login with username and password
async fn login_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    tracing::info!("Login attempt for username: {:?}", request.username);

    let tokens = state.auth_service.login(request).await?;

    Ok(Json(tokens))
}

/// POST /token/refresh/
/// Mint a new access token from a refresh token
async fn refresh_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AuthError> {
    tracing::debug!("Token refresh request");

    let response = state.auth_service.refresh(request).await?;

    Ok(Json(response))
}

/// POST /logout/
/// Revoke the submitted refresh token; requires a valid access token
async fn logout_handler(
    State(state): State<Arc<AuthApiState>>,
    headers: HeaderMap,
    Json(request): Json<RefreshRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthApiError> {
    let user = state.authenticator.authenticate(&headers).await?;

    state.auth_service.logout(request).await?;

    tracing::info!("User logged out: {}", user.username);

    Ok((
        StatusCode::RESET_CONTENT,
        Json(MessageResponse {
            message: "Logout successful.".to_string(),
        }),
    ))
}

/// POST /register/
/// Register a new user
async fn register_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthError> {
    tracing::info!("Registration attempt for username: {:?}", request.username);

    let user = state.auth_service.register(request).await?;

    tracing::info!("User registered: {}", user.username);

    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /reset-password/
/// Replace a forgotten password with a generated one, sent by mail
async fn reset_password_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>, AuthError> {
    tracing::info!("Password reset attempt for email: {:?}", request.email);

    let response = state.auth_service.reset_password(request).await?;

    tracing::info!("Password reset for user: {}", response.username);

    Ok(Json(response))
}
