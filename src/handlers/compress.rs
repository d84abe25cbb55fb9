use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    models::MediaKind,
    services::compression::MediaSource,
};

const STATUS_HEADER: HeaderName = HeaderName::from_static("x-compression-status");
const ORIGINAL_SIZE_HEADER: HeaderName = HeaderName::from_static("x-original-size");
const COMPRESSED_SIZE_HEADER: HeaderName = HeaderName::from_static("x-compressed-size");

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| AppError::Validation(format!("Invalid value for {}: {}", name, value)))
}

/// Compresses one uploaded file toward `target_size_mb` and returns the
/// resulting bytes. Abandoning the request cancels the encode.
pub async fn compress_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut content_type: Option<String> = None;
    let mut media_kind: Option<MediaKind> = None;
    let mut target_size_mb: Option<f64> = None;
    let mut duration_secs: Option<f64> = None;
    let mut width: Option<u32> = None;
    let mut height: Option<u32> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::Validation(format!("Failed to parse multipart data: {}", e))
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        if field_name == "file" {
            content_type = field.content_type().map(|s| s.to_string());
            let data = field.bytes().await.map_err(|e| {
                AppError::Validation(format!("Failed to read file data: {}", e))
            })?;
            file_data = Some(data.to_vec());
            continue;
        }

        let text = field.text().await.map_err(|e| {
            AppError::Validation(format!("Failed to read field {}: {}", field_name, e))
        })?;

        match field_name.as_str() {
            "media_kind" => {
                media_kind = Some(text.parse().map_err(AppError::Validation)?);
            }
            "target_size_mb" => target_size_mb = Some(parse_field(&field_name, &text)?),
            "duration_secs" => duration_secs = Some(parse_field(&field_name, &text)?),
            "width" => width = Some(parse_field(&field_name, &text)?),
            "height" => height = Some(parse_field(&field_name, &text)?),
            _ => {} // Ignore unknown fields
        }
    }

    let file_data = file_data
        .ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
    let target_size_mb = target_size_mb
        .ok_or_else(|| AppError::Validation("Missing 'target_size_mb' field".to_string()))?;
    let media_kind = match media_kind {
        Some(kind) => kind,
        None if content_type.as_deref().map_or(false, |ct| ct.starts_with("video/")) => {
            MediaKind::Video
        }
        None => MediaKind::Photo,
    };

    let source = match media_kind {
        MediaKind::Photo => MediaSource::photo(file_data),
        MediaKind::Video => MediaSource::video(file_data, width.zip(height), duration_secs),
    };

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let engine = state.engine.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        engine.smart_compress(&source, target_size_mb, &cancel)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Compression task failed: {}", e)))??;
    guard.disarm();

    state.metrics.record_compression(media_kind, &outcome);
    tracing::info!(
        media_kind = %media_kind,
        status = outcome.status.as_str(),
        original_size = outcome.original_size_bytes,
        compressed_size = outcome.size_bytes,
        "Compression finished"
    );

    let output_type = if outcome.status.is_passthrough() {
        content_type.unwrap_or_else(|| "application/octet-stream".to_string())
    } else {
        match media_kind {
            MediaKind::Photo => state.engine.settings().image_format.mime_type().to_string(),
            MediaKind::Video => "video/mp4".to_string(),
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&output_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(STATUS_HEADER, HeaderValue::from_static(outcome.status.as_str()));
    headers.insert(ORIGINAL_SIZE_HEADER, HeaderValue::from(outcome.original_size_bytes));
    headers.insert(COMPRESSED_SIZE_HEADER, HeaderValue::from(outcome.size_bytes));

    Ok((headers, outcome.bytes).into_response())
}
