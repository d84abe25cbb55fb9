use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::DenialReason;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageProcessing(#[from] image::ImageError),

    /// The catalog has no active tier for a resolved tier name.
    #[error("No active quota level configured for tier '{0}'")]
    TierNotConfigured(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Upload rejected at commit: {}", .0.as_str())]
    CommitRejected(DenialReason),

    #[error("Not found")]
    NotFound,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Migration(ref e) => {
                tracing::error!("Migration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "IO error".to_string())
            }
            AppError::ImageProcessing(ref e) => {
                (StatusCode::UNPROCESSABLE_ENTITY, format!("Image processing failed: {}", e))
            }
            AppError::TierNotConfigured(ref tier) => {
                tracing::error!(tier = %tier, "Quota catalog is missing an active tier");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Quota configuration error".to_string(),
                )
            }
            AppError::Validation(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Compression(ref msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "Operation cancelled".to_string()),
            AppError::CommitRejected(reason) => {
                let body = Json(json!({
                    "error": "Quota exceeded",
                    "reason": reason,
                    "status": StatusCode::CONFLICT.as_u16()
                }));
                return (StatusCode::CONFLICT, body).into_response();
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
