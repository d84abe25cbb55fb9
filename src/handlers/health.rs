use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

use crate::{errors::Result, handlers::AppState};

pub async fn liveness() -> Result<Json<serde_json::Value>> {
    Ok(Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let catalog_status = match state.catalog.list_active().await {
        Ok(levels) if !levels.is_empty() => "healthy",
        Ok(_) => "empty",
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            "unhealthy"
        }
    };

    let video_status = if state.engine.video_available() {
        "available"
    } else {
        "unavailable"
    };

    let (status, overall) = if catalog_status == "healthy" {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status,
        Json(json!({
            "status": overall,
            "checks": {
                "catalog": catalog_status,
                "video_encoder": video_status
            },
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}
