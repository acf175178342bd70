//! Bearer token authentication for protected endpoints
//!
//! Every protected handler resolves the caller through [`Authenticator`]:
//! the access token is pulled from the Authorization header, validated, then
//! the user is loaded so deleted accounts are rejected even while their
//! tokens are still unexpired.

use axum::{
    Json,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::core::auth::jwt::{JwtError, JwtService};
use crate::core::db::models::User;
use crate::core::db::repositories::user::{UserRepository, UserRepositoryError};

/// Why a request failed authentication
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthFailure {
    #[error("Authentication credentials were not provided.")]
    MissingCredentials,

    #[error("Token is invalid or expired")]
    InvalidToken,

    #[error("User not found")]
    UserGone,

    #[error("An internal error has occurred.")]
    Internal(String),
}

impl From<JwtError> for AuthFailure {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired
            | JwtError::InvalidSignature
            | JwtError::Malformed
            | JwtError::WrongTokenType => AuthFailure::InvalidToken,
            JwtError::MissingSecret | JwtError::EncodingError(_) => {
                AuthFailure::Internal(err.to_string())
            }
        }
    }
}

impl From<UserRepositoryError> for AuthFailure {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => AuthFailure::UserGone,
            other => AuthFailure::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        match &self {
            AuthFailure::Internal(detail) => {
                tracing::error!("Authentication internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": self.to_string() })),
                )
                    .into_response()
            }
            _ => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": self.to_string() })),
            )
                .into_response(),
        }
    }
}

/// Resolves the calling user from a bearer access token
#[derive(Clone)]
pub struct Authenticator {
    jwt: JwtService,
    users: UserRepository,
}

impl Authenticator {
    /// Create a new authenticator
    pub fn new(jwt: JwtService, users: UserRepository) -> Self {
        Self { jwt, users }
    }

    /// Authenticate a request from its headers
    ///
    /// Decodes the bearer token as an access token and loads the user it
    /// names. A token for a since-deleted user fails with [`AuthFailure::UserGone`].
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<User, AuthFailure> {
        let token = extract_bearer_token(headers).ok_or(AuthFailure::MissingCredentials)?;

        let claims = self.jwt.validate_access_token(token)?;
        let user_id = claims.user_id()?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthFailure::UserGone)?;

        Ok(user)
    }
}

/// Extract a Bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth_header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = auth_header.strip_prefix("Bearer ")?;

    if token.is_empty() { None } else { Some(token) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token_valid() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer my_token_123"),
        );

        assert_eq!(extract_bearer_token(&headers), Some("my_token_123"));
    }

    #[test]
    fn test_extract_bearer_token_missing_header() {
        let headers = HeaderMap::new();

        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic base64credentials"),
        );

        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_extract_bearer_token_empty_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));

        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_auth_failure_display() {
        assert_eq!(
            AuthFailure::MissingCredentials.to_string(),
            "Authentication credentials were not provided."
        );
        assert_eq!(
            AuthFailure::InvalidToken.to_string(),
            "Token is invalid or expired"
        );
        assert_eq!(AuthFailure::UserGone.to_string(), "User not found");
        assert_eq!(
            AuthFailure::Internal("db down".to_string()).to_string(),
            "An internal error has occurred."
        );
    }

    #[test]
    fn test_auth_failure_status_codes() {
        assert_eq!(
            AuthFailure::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthFailure::InvalidToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthFailure::UserGone.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthFailure::Internal("boom".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_jwt_error_maps_to_invalid_token() {
        assert!(matches!(
            AuthFailure::from(JwtError::Expired),
            AuthFailure::InvalidToken
        ));
        assert!(matches!(
            AuthFailure::from(JwtError::InvalidSignature),
            AuthFailure::InvalidToken
        ));
        assert!(matches!(
            AuthFailure::from(JwtError::Malformed),
            AuthFailure::InvalidToken
        ));
        assert!(matches!(
            AuthFailure::from(JwtError::WrongTokenType),
            AuthFailure::InvalidToken
        ));
    }

    #[test]
    fn test_jwt_config_error_maps_to_internal() {
        assert!(matches!(
            AuthFailure::from(JwtError::MissingSecret),
            AuthFailure::Internal(_)
        ));
    }

    #[test]
    fn test_repository_error_mapping() {
        assert!(matches!(
            AuthFailure::from(UserRepositoryError::NotFound),
            AuthFailure::UserGone
        ));
        assert!(matches!(
            AuthFailure::from(UserRepositoryError::HashingError("x".to_string())),
            AuthFailure::Internal(_)
        ));
    }
}
