use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;

use crate::{
    errors::Result,
    handlers::AppState,
    models::{Decision, MediaKind, QuotaLevel, StudentQuotaRecord},
    services::quota_checker::QuotaStatus,
};

#[derive(Debug, Deserialize)]
pub struct QuotaRequest {
    pub subject_id: String,
    /// Used only when the subject has no quota record yet.
    #[serde(default)]
    pub plan_type: String,
    pub media_kind: MediaKind,
    pub size_bytes: i64,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub plan_type: Option<String>,
}

pub async fn check_upload(
    State(state): State<AppState>,
    Json(request): Json<QuotaRequest>,
) -> Result<Json<Decision>> {
    let decision = state
        .checker
        .check_upload(
            &request.subject_id,
            &request.plan_type,
            request.media_kind,
            request.size_bytes,
        )
        .await?;

    state.metrics.record_decision(&decision);
    Ok(Json(decision))
}

pub async fn commit_upload(
    State(state): State<AppState>,
    Json(request): Json<QuotaRequest>,
) -> Result<Json<StudentQuotaRecord>> {
    let record = state
        .checker
        .commit_upload(
            &request.subject_id,
            &request.plan_type,
            request.media_kind,
            request.size_bytes,
        )
        .await?;

    Ok(Json(record))
}

pub async fn release(
    State(state): State<AppState>,
    Json(request): Json<QuotaRequest>,
) -> Result<Json<StudentQuotaRecord>> {
    let record = state
        .checker
        .release(&request.subject_id, request.media_kind, request.size_bytes)
        .await?;

    Ok(Json(record))
}

pub async fn quota_status(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<QuotaStatus>> {
    let plan_type = query.plan_type.unwrap_or_default();
    let status = state.checker.quota_status(&subject_id, &plan_type).await?;
    Ok(Json(status))
}

pub async fn list_tiers(State(state): State<AppState>) -> Result<Json<Vec<QuotaLevel>>> {
    let levels = state.catalog.list_active().await?;
    Ok(Json(levels))
}
