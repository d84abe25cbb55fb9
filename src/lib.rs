pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use handlers::AppState;

/// Builds the HTTP router over fully wired state.
pub fn create_app(state: AppState) -> Router {
    let max_upload_size = state.config.max_upload_size;

    let quota_routes = Router::new()
        .route("/tiers", get(handlers::quota::list_tiers))
        .route("/quota/check", post(handlers::quota::check_upload))
        .route("/quota/commit", post(handlers::quota::commit_upload))
        .route("/quota/release", post(handlers::quota::release))
        .route("/quota/:subject_id/status", get(handlers::quota::quota_status));

    let compress_routes = Router::new()
        .route("/compress", post(handlers::compress::compress_upload))
        .layer(DefaultBodyLimit::max(max_upload_size));

    Router::new()
        .route("/health", get(handlers::health::liveness))
        .route("/ready", get(handlers::health::readiness))
        .route("/metrics", get(handlers::metrics::metrics_handler))
        .nest("/v1", quota_routes.merge(compress_routes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
