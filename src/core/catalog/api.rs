//! Certification catalog API endpoints
//!
//! Provides REST API endpoints for certifications and competencies:
//! - GET /certifications/ - List certifications with competencies (auth)
//! - POST /certifications/ - Create a certification (admin)
//! - GET /certifications/{id}/ - Get one certification (auth)
//! - PUT /certifications/{id}/ - Update a certification (admin)
//! - DELETE /certifications/{id}/ - Delete a certification (admin)
//! - PUT /certifications/{id}/competencies/ - Replace the competency set (admin)
//! - GET /certifications/competencies/ - List competencies (auth)
//! - POST /certifications/competencies/ - Create a competency (admin)
//! - GET/PUT/DELETE /certifications/competencies/{id}/ - Competency detail (admin for writes)

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
use crate::core::db::models::{
    CertificationWithCompetencies, Competency, CreateCertification, CreateCompetency,
    UpdateCertification, UpdateCompetency, double_option,
};
use crate::core::db::repositories::{
    CertificationRepository, CertificationRepositoryError, CompetencyRepository,
    CompetencyRepositoryError,
};

/// Catalog API state
#[derive(Clone)]
pub struct CatalogApiState {
    pub certification_repo: CertificationRepository,
    pub competency_repo: CompetencyRepository,
    pub authenticator: Authenticator,
}

/// Catalog API error types
#[derive(Debug, thiserror::Error)]
pub enum CatalogApiError {
    #[error(transparent)]
    Auth(#[from] AuthFailure),

    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("Certification not found.")]
    CertificationNotFound,

    #[error("Competency not found.")]
    CompetencyNotFound,

    #[error("Certification name already exists")]
    CertificationNameExists,

    #[error("Competency name already exists")]
    CompetencyNameExists,

    #[error("{0} is required.")]
    MissingField(&'static str),

    #[error("An internal error has occurred.")]
    InternalError(String),
}

impl From<CertificationRepositoryError> for CatalogApiError {
    fn from(err: CertificationRepositoryError) -> Self {
        match err {
            CertificationRepositoryError::NotFound => CatalogApiError::CertificationNotFound,
            CertificationRepositoryError::NameAlreadyExists => {
                CatalogApiError::CertificationNameExists
            }
            CertificationRepositoryError::DatabaseError(e) => {
                CatalogApiError::InternalError(e.to_string())
            }
        }
    }
}

impl From<CompetencyRepositoryError> for CatalogApiError {
    fn from(err: CompetencyRepositoryError) -> Self {
        match err {
            CompetencyRepositoryError::NotFound => CatalogApiError::CompetencyNotFound,
            CompetencyRepositoryError::NameAlreadyExists => CatalogApiError::CompetencyNameExists,
            CompetencyRepositoryError::DatabaseError(e) => {
                CatalogApiError::InternalError(e.to_string())
            }
        }
    }
}

impl IntoResponse for CatalogApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            CatalogApiError::Auth(failure) => return failure.clone().into_response(),
            CatalogApiError::PermissionDenied => StatusCode::FORBIDDEN,
            CatalogApiError::CertificationNotFound | CatalogApiError::CompetencyNotFound => {
                StatusCode::NOT_FOUND
            }
            CatalogApiError::CertificationNameExists
            | CatalogApiError::CompetencyNameExists
            | CatalogApiError::MissingField(_) => StatusCode::BAD_REQUEST,
            CatalogApiError::InternalError(detail) => {
                tracing::error!("Catalog API internal error: {}", detail);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = json!({ "error": self.to_string() });

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request for creating a certification or competency
#[derive(Debug, Deserialize)]
pub struct CreateCatalogEntryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Request for updating a certification or competency.
///
/// A missing description leaves the stored value untouched; an explicit
/// null clears it.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateCatalogEntryRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub description: Option<Option<String>>,
}

/// Request for replacing a certification's competency set
#[derive(Debug, Deserialize)]
pub struct CompetencySetRequest {
    pub competency_ids: Option<Vec<Uuid>>,
}

/// Message response for the competency set update
#[derive(Debug, serde::Serialize)]
pub struct CatalogMessageResponse {
    pub message: String,
}

// ============================================================================
// Router
// ============================================================================

/// Create the catalog API router
pub fn catalog_api_router(state: CatalogApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route(
            "/certifications/",
            get(list_certifications_handler).post(create_certification_handler),
        )
        .route(
            "/certifications/competencies/",
            get(list_competencies_handler).post(create_competency_handler),
        )
        .route(
            "/certifications/competencies/{id}/",
            get(get_competency_handler)
                .put(update_competency_handler)
                .delete(delete_competency_handler),
        )
        .route(
            "/certifications/{id}/",
            get(get_certification_handler)
                .put(update_certification_handler)
                .delete(delete_certification_handler),
        )
        .route(
            "/certifications/{id}/competencies/",
            put(set_competencies_handler),
        )
        .with_state(state)
}

// ============================================================================
// Certification Handlers
// ============================================================================

/// GET /certifications/
/// List all certifications with their competencies
async fn list_certifications_handler(
    State(state): State<Arc<CatalogApiState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<CertificationWithCompetencies>>, CatalogApiError> {
    state.authenticator.authenticate(&headers).await?;

    tracing::debug!("Listing certifications");

    let certifications = state.certification_repo.list_with_competencies().await?;

    Ok(Json(certifications))
}

/// POST /certifications/
/// Create a certification (admin only)
async fn create_certification_handler(
    State(state): State<Arc<CatalogApiState>>,
    headers: HeaderMap,
    Json(request): Json<CreateCatalogEntryRequest>,
) -> Result<(StatusCode, Json<CertificationWithCompetencies>), CatalogApiError> {
    require_admin(&state, &headers).await?;

    let name = require_name(request.name.as_deref())?;

    tracing::info!("Creating certification '{}'", name);

    let certification = state
        .certification_repo
        .create(&CreateCertification {
            name: name.to_string(),
            description: request.description,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CertificationWithCompetencies::new(certification, vec![])),
    ))
}

/// GET /certifications/{id}/
/// Get one certification with its competencies
async fn get_certification_handler(
    State(state): State<Arc<CatalogApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<CertificationWithCompetencies>, CatalogApiError> {
    state.authenticator.authenticate(&headers).await?;

    tracing::debug!("Getting certification {}", id);

    let certification = state
        .certification_repo
        .find_with_competencies(id)
        .await?
        .ok_or(CatalogApiError::CertificationNotFound)?;

    Ok(Json(certification))
}

/// PUT /certifications/{id}/
/// Update a certification (admin only)
async fn update_certification_handler(
    State(state): State<Arc<CatalogApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCatalogEntryRequest>,
) -> Result<Json<CertificationWithCompetencies>, CatalogApiError> {
    require_admin(&state, &headers).await?;

    let name = require_name(request.name.as_deref())?;

    tracing::info!("Updating certification {}", id);

    let certification = state
        .certification_repo
        .update(
            id,
            &UpdateCertification {
                name: Some(name.to_string()),
                description: request.description,
            },
        )
        .await?;

    let competencies = state.certification_repo.competencies_for(id).await?;

    Ok(Json(CertificationWithCompetencies::new(
        certification,
        competencies,
    )))
}

/// DELETE /certifications/{id}/
/// Delete a certification (admin only)
async fn delete_certification_handler(
    State(state): State<Arc<CatalogApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, CatalogApiError> {
    require_admin(&state, &headers).await?;

    tracing::info!("Deleting certification {}", id);

    let deleted = state.certification_repo.delete(id).await?;
    if !deleted {
        return Err(CatalogApiError::CertificationNotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /certifications/{id}/competencies/
/// Replace a certification's competency set (admin only).
/// Unknown competency ids are skipped without error.
async fn set_competencies_handler(
    State(state): State<Arc<CatalogApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<CompetencySetRequest>,
) -> Result<Json<CatalogMessageResponse>, CatalogApiError> {
    require_admin(&state, &headers).await?;

    let competency_ids = request
        .competency_ids
        .ok_or(CatalogApiError::MissingField("competency_ids"))?;

    tracing::info!(
        "Setting {} competencies on certification {}",
        competency_ids.len(),
        id
    );

    state
        .certification_repo
        .set_competencies(id, &competency_ids)
        .await?;

    Ok(Json(CatalogMessageResponse {
        message: "Competencies updated.".to_string(),
    }))
}

// ============================================================================
// Competency Handlers
// ============================================================================

/// GET /certifications/competencies/
/// List all competencies
async fn list_competencies_handler(
    State(state): State<Arc<CatalogApiState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Competency>>, CatalogApiError> {
    state.authenticator.authenticate(&headers).await?;

    tracing::debug!("Listing competencies");

    let competencies = state.competency_repo.list().await?;

    Ok(Json(competencies))
}

/// POST /certifications/competencies/
/// Create a competency (admin only)
async fn create_competency_handler(
    State(state): State<Arc<CatalogApiState>>,
    headers: HeaderMap,
    Json(request): Json<CreateCatalogEntryRequest>,
) -> Result<(StatusCode, Json<Competency>), CatalogApiError> {
    require_admin(&state, &headers).await?;

    let name = require_name(request.name.as_deref())?;

    tracing::info!("Creating competency '{}'", name);

    let competency = state
        .competency_repo
        .create(&CreateCompetency {
            name: name.to_string(),
            description: request.description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(competency)))
}

/// GET /certifications/competencies/{id}/
/// Get one competency
async fn get_competency_handler(
    State(state): State<Arc<CatalogApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Competency>, CatalogApiError> {
    state.authenticator.authenticate(&headers).await?;

    tracing::debug!("Getting competency {}", id);

    let competency = state
        .competency_repo
        .find_by_id(id)
        .await?
        .ok_or(CatalogApiError::CompetencyNotFound)?;

    Ok(Json(competency))
}

/// PUT /certifications/competencies/{id}/
/// Update a competency (admin only)
async fn update_competency_handler(
    State(state): State<Arc<CatalogApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCatalogEntryRequest>,
) -> Result<Json<Competency>, CatalogApiError> {
    require_admin(&state, &headers).await?;

    let name = require_name(request.name.as_deref())?;

    tracing::info!("Updating competency {}", id);

    let competency = state
        .competency_repo
        .update(
            id,
            &UpdateCompetency {
                name: Some(name.to_string()),
                description: request.description,
            },
        )
        .await?;

    Ok(Json(competency))
}

/// DELETE /certifications/competencies/{id}/
/// Delete a competency (admin only)
async fn delete_competency_handler(
    State(state): State<Arc<CatalogApiState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, CatalogApiError> {
    require_admin(&state, &headers).await?;

    tracing::info!("Deleting competency {}", id);

    let deleted = state.competency_repo.delete(id).await?;
    if !deleted {
        return Err(CatalogApiError::CompetencyNotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Authenticate the caller and require staff privileges
async fn require_admin(
    state: &CatalogApiState,
    headers: &HeaderMap,
) -> Result<(), CatalogApiError> {
    let user = state.authenticator.authenticate(headers).await?;

    if !authorize(&user, Action::ManageCatalog) {
        return Err(CatalogApiError::PermissionDenied);
    }

    Ok(())
}

/// Unwrap a required name field, treating blank values as absent
fn require_name(name: Option<&str>) -> Result<&str, CatalogApiError> {
    name.map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(CatalogApiError::MissingField("Name"))
}

// ============================================================================
// Tests
// ============================================================================
