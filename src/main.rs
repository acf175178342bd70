use std::time::Duration;

use axum::{Json, Router, http::HeaderValue, http::StatusCode, response::IntoResponse};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use certforge::core::auth::{
    AuthApiState, AuthService, Authenticator, JwtService, auth_api_router,
};
use certforge::core::catalog::{CatalogApiState, catalog_api_router};
use certforge::core::config::AppConfig;
use certforge::core::db::pool::{DbConfig, create_pool_with_migrations};
use certforge::core::db::repositories::{
    BlacklistRepository, CertificationRepository, CompetencyRepository, ExamSessionRepository,
    UserRepository,
};
use certforge::core::exams::{ExamApiState, exam_api_router};
use certforge::core::mail::Mailer;
use certforge::core::users::{UserApiState, user_api_router};

#[tokio::main]
async fn main() {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load application config from environment variables
    let config = AppConfig::from_env();
    let db_config = DbConfig::from_env().expect("DATABASE_URL must be set");

    let pool = create_pool_with_migrations(&db_config)
        .await
        .expect("Failed to initialize database");

    tracing::info!("Database pool ready, migrations applied");

    let jwt_service = JwtService::from_env().expect("JWT_SECRET must be set");
    let mailer = Mailer::from_env();

    let user_repo = UserRepository::new(pool.clone());
    let blacklist_repo = BlacklistRepository::new(pool.clone());
    let certification_repo = CertificationRepository::new(pool.clone());
    let competency_repo = CompetencyRepository::new(pool.clone());
    let exam_session_repo = ExamSessionRepository::new(pool.clone());

    let authenticator = Authenticator::new(jwt_service.clone(), user_repo.clone());
    let auth_service = AuthService::new(
        user_repo.clone(),
        blacklist_repo,
        jwt_service,
        mailer,
        config.debug,
    );

    if config.debug {
        tracing::warn!("Debug mode enabled: password resets echo the new password");
    }

    // Build the main application router
    let app = Router::new()
        .merge(auth_api_router(AuthApiState {
            auth_service,
            authenticator: authenticator.clone(),
        }))
        .merge(user_api_router(UserApiState {
            user_repo,
            authenticator: authenticator.clone(),
        }))
        .merge(catalog_api_router(CatalogApiState {
            certification_repo,
            competency_repo,
            authenticator: authenticator.clone(),
        }))
        .merge(exam_api_router(ExamApiState {
            exam_session_repo,
            authenticator,
        }))
        .fallback(not_found_handler)
        .layer(cors_layer(&config))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )));

    tracing::info!("Listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind address");
    axum::serve(listener, app).await.expect("Server error");
}

/// Fallback for unmatched routes
async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Resource not found." })),
    )
}

/// CORS layer: restricted to the configured origin, permissive otherwise
fn cors_layer(config: &AppConfig) -> CorsLayer {
    match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>().expect("Invalid CORS origin"))
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::permissive(),
    }
}
