//! Exam session API endpoints
//!
//! Provides REST API endpoints for exam attempts:
//! - POST /exam-sessions/ - Start a session for a certification (auth)
//! - GET /exam-sessions/ - List own sessions; admins see all
//! - GET /exam-sessions/{id}/ - Get one session (owner or admin)
//! - PUT /exam-sessions/{id}/complete/ - Score and close a session (owner)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::auth::extract::{AuthFailure, Authenticator};
use crate::core::authz::{Action, authorize};
use crate::core::db::models::ExamSession;
use crate::core::db::repositories::{ExamSessionRepository, ExamSessionRepositoryError};

/// Exam API state
#[derive(Clone)]
pub struct ExamApiState {
    pub exam_session_repo: ExamSessionRepository,
    pub authenticator: Authenticator,
}

/// Exam API error types
#[derive(Debug, thiserror::Error)]
pub enum ExamApiError {
    #[error(transparent)]
    Auth(#[from] AuthFailure),

    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("Exam session not found.")]
    NotFound,

    #[error("Certification not found.")]
    CertificationNotFound,

    #[error("Exam session is already completed.")]
    AlreadyCompleted,

    #[error("Score must be between 0 and 100.")]
    InvalidScore,

    #[error("{0} is required.")]
    MissingField(&'static str),

    #[error("An internal error has occurred.")]
    InternalError(String),
}

impl From<ExamSessionRepositoryError> for ExamApiError {
    fn from(err: ExamSessionRepositoryError) -> Self {
        match err {
            ExamSessionRepositoryError::NotFound => ExamApiError::NotFound,
            ExamSessionRepositoryError::CertificationNotFound => {
                ExamApiError::CertificationNotFound
            }
            ExamSessionRepositoryError::AlreadyCompleted => ExamApiError::AlreadyCompleted,
            ExamSessionRepositoryError::DatabaseError(e) => {
                ExamApiError::InternalError(e.to_string())
            }
        }
    }
}

impl IntoResponse for ExamApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ExamApiError::Auth(failure) => return failure.clone().into_response(),
            ExamApiError::PermissionDenied => StatusCode::FORBIDDEN,
            ExamApiError::NotFound | ExamApiError::CertificationNotFound => StatusCode::NOT_FOUND,
            ExamApiError::AlreadyCompleted
            | ExamApiError::InvalidScore
            | ExamApiError::MissingField(_) => StatusCode::BAD_REQUEST,
            ExamApiError::InternalError(detail) => {
                tracing::error!("Exam API internal error: {}", detail);
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

/// Request for starting an exam session
#[derive(Debug, Deserialize)]
pub struct StartExamRequest {
    pub certification_id: Option<Uuid>,
}

/// Request for completing an exam session
#[derive(Debug, Deserialize)]
pub struct CompleteExamRequest {
    pub score: Option<f64>,
}

// ============================================================================
// Router
// ============================================================================

/// Create the exam API router
pub fn exam_api_router(state: ExamApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route(
            "/exam-sessions/",
            get(list_sessions_handler).post(start_session_handler),
        )
        .route("/exam-sessions/{id}/", get(get_session_handler))
        .route("/exam-sessions/{id}/complete/", put(complete_session_handler))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /exam-sessions/
/// Start a new in-progress session for a certification
async fn start_session_handler(
    State(state): State<Arc<ExamApiState>>,
    headers: HeaderMap,
    Json(request): Json<StartExamRequest>,
) -> Result<(StatusCode, Json<ExamSession>), ExamApiError> {
    let user = state.authenticator.authenticate(&headers).await?;

    let certification_id = request
        .certification_id
        .ok_or(ExamApiError::MissingField("certification_id"))?;

    tracing::info!(
        "User {} starting exam session for certification {}",
        user.username,
        certification_id
    );

    let session = state
        .exam_session_repo
        .create(user.id, certification_id)
        .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /exam-sessions/
/// List the caller's sessions; admins see every session
async fn list_sessions_handler(
    State(state): State<Arc<ExamApiState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ExamSession>>, ExamApiError> {
    let user = state.authenticator.authenticate(&headers).await?;

    tracing::debug!("Listing exam sessions for {}", user.username);

    let sessions = if authorize(&user, Action::ViewAllSessions) {
        state.exam_session_repo.list_all().await?
    } else {
        state.exam_session_repo.list_for_user(user.id).await?
    };

    Ok(Json(sessions))
}

/// GET /exam-sessions/{id}/
/// Get one session; only its owner or an admin may read it
async fn get_session_handler(
    State(state): State<Arc<ExamApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ExamSession>, ExamApiError> {
    let user = state.authenticator.authenticate(&headers).await?;

    tracing::debug!("Getting exam session {}", id);

    let session = state
        .exam_session_repo
        .find_by_id(id)
        .await?
        .ok_or(ExamApiError::NotFound)?;

    if session.user_id != user.id && !authorize(&user, Action::ViewAllSessions) {
        return Err(ExamApiError::PermissionDenied);
    }

    Ok(Json(session))
}

/// PUT /exam-sessions/{id}/complete/
/// Score and close a session; only its owner may complete it
async fn complete_session_handler(
    State(state): State<Arc<ExamApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<CompleteExamRequest>,
) -> Result<Json<ExamSession>, ExamApiError> {
    let user = state.authenticator.authenticate(&headers).await?;

    let score = request.score.ok_or(ExamApiError::MissingField("score"))?;
    validate_score(score)?;

    let session = state
        .exam_session_repo
        .find_by_id(id)
        .await?
        .ok_or(ExamApiError::NotFound)?;

    if session.user_id != user.id {
        return Err(ExamApiError::PermissionDenied);
    }

    tracing::info!(
        "User {} completing exam session {} with score {}",
        user.username,
        id,
        score
    );

    let completed = state.exam_session_repo.complete(id, score).await?;

    Ok(Json(completed))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Check that a score lies in the 0 to 100 range
fn validate_score(score: f64) -> Result<(), ExamApiError> {
    if !(0.0..=100.0).contains(&score) {
        return Err(ExamApiError::InvalidScore);
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_score_in_range() {
        assert!(validate_score(0.0).is_ok());
        assert!(validate_score(72.5).is_ok());
        assert!(validate_score(100.0).is_ok());
    }

    #[test]
    fn test_validate_score_out_of_range() {
        assert!(matches!(
            validate_score(-0.5),
            Err(ExamApiError::InvalidScore)
        ));
        assert!(matches!(
            validate_score(100.5),
            Err(ExamApiError::InvalidScore)
        ));
        assert!(matches!(
            validate_score(f64::NAN),
            Err(ExamApiError::InvalidScore)
        ));
    }

    #[test]
    fn test_start_exam_request_deserialization() {
        let json = r#"{"certification_id": "550e8400-e29b-41d4-a716-446655440000"}"#;

        let request: StartExamRequest = serde_json::from_str(json).unwrap();

        assert!(request.certification_id.is_some());
    }

    #[test]
    fn test_start_exam_request_missing_field() {
        let request: StartExamRequest = serde_json::from_str("{}").unwrap();

        assert!(request.certification_id.is_none());
    }

    #[test]
    fn test_complete_exam_request_deserialization() {
        let json = r#"{"score": 85.5}"#;

        let request: CompleteExamRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.score, Some(85.5));
    }

    #[test]
    fn test_exam_api_error_status_codes() {
        assert_eq!(
            ExamApiError::Auth(AuthFailure::MissingCredentials)
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ExamApiError::PermissionDenied.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ExamApiError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ExamApiError::CertificationNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ExamApiError::AlreadyCompleted.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ExamApiError::InvalidScore.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ExamApiError::MissingField("score").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ExamApiError::InternalError("db".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_error_conversion() {
        let err: ExamApiError = ExamSessionRepositoryError::NotFound.into();
        assert!(matches!(err, ExamApiError::NotFound));

        let err: ExamApiError = ExamSessionRepositoryError::CertificationNotFound.into();
        assert!(matches!(err, ExamApiError::CertificationNotFound));

        let err: ExamApiError = ExamSessionRepositoryError::AlreadyCompleted.into();
        assert!(matches!(err, ExamApiError::AlreadyCompleted));
    }
}
