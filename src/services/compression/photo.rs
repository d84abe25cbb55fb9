use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageOutputFormat};
use std::io::Cursor;
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{AppError, Result},
    models::{fit_within, CompressionConfig, MediaKind, TargetFormat},
    services::compression::{CompressionOutcome, CompressionStatus},
};

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    Ok(())
}

/// Maps a (0, 1] quality onto the JPEG encoder's 1..=100 scale.
fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

fn encode(img: &DynamicImage, format: TargetFormat, quality: f32) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());

    match format {
        TargetFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_to(&mut out, ImageOutputFormat::Jpeg(jpeg_quality(quality)))?;
        }
        TargetFormat::Png => img.write_to(&mut out, ImageOutputFormat::Png)?,
        TargetFormat::Webp => img.write_to(&mut out, ImageOutputFormat::WebP)?,
        TargetFormat::H264 => {
            return Err(AppError::Validation(
                "H.264 is not an image format".to_string(),
            ))
        }
    }

    Ok(out.into_inner())
}

fn transcode(bytes: &[u8], config: &CompressionConfig, cancel: &CancellationToken) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    check_cancelled(cancel)?;

    let (width, height) = img.dimensions();
    let (new_width, new_height) = fit_within(width, height, config.max_width, config.max_height);

    let img = if (new_width, new_height) != (width, height) {
        tracing::debug!(
            "Scaling image from {}x{} to {}x{}",
            width,
            height,
            new_width,
            new_height
        );
        img.resize_exact(new_width, new_height, FilterType::Lanczos3)
    } else {
        img
    };
    check_cancelled(cancel)?;

    encode(&img, config.target_format, config.quality)
}

/// Downscales to fit the configured bounds and re-encodes at the configured
/// quality. Undecodable input or an encoder error is not fatal: the original
/// bytes come back with a `Failed` status.
pub fn compress_image(
    bytes: &[u8],
    config: &CompressionConfig,
    cancel: &CancellationToken,
) -> Result<CompressionOutcome> {
    config.validate_for(MediaKind::Photo)?;
    check_cancelled(cancel)?;

    match transcode(bytes, config, cancel) {
        Ok(encoded) => Ok(CompressionOutcome::new(
            bytes.len(),
            encoded,
            CompressionStatus::Compressed,
        )),
        Err(AppError::Cancelled) => Err(AppError::Cancelled),
        Err(e) => {
            tracing::warn!("Image compression failed, keeping original: {}", e);
            Ok(CompressionOutcome::unchanged(
                bytes.to_vec(),
                CompressionStatus::Failed(e.to_string()),
            ))
        }
    }
}
