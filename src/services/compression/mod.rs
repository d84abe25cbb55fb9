use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    config::CompressionSettings,
    errors::{AppError, Result},
    models::{bytes_to_mb, CompressionConfig, MediaKind},
};

pub mod batch;
pub mod photo;
pub mod video;

pub use batch::*;
pub use photo::compress_image;
pub use video::*;

/// Upper bound on a derived video bitrate. Durations come from clients, and a
/// near-zero one would otherwise imply an absurd source bitrate.
pub const MAX_VIDEO_BITRATE_BPS: u64 = 100_000_000;

/// A file to compress, with whatever metadata the caller already knows.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    pub kind: MediaKind,
    pub bytes: Vec<u8>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_secs: Option<f64>,
}

impl MediaSource {
    pub fn photo(bytes: Vec<u8>) -> Self {
        Self {
            kind: MediaKind::Photo,
            bytes,
            width: None,
            height: None,
            duration_secs: None,
        }
    }

    pub fn video(bytes: Vec<u8>, dimensions: Option<(u32, u32)>, duration_secs: Option<f64>) -> Self {
        Self {
            kind: MediaKind::Video,
            bytes,
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
            duration_secs,
        }
    }

    pub fn size_mb(&self) -> f64 {
        bytes_to_mb(self.bytes.len() as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum CompressionStatus {
    /// Re-encoded output.
    Compressed,
    /// Already within budget; nothing was done.
    Skipped,
    /// Re-encoding did not make the file smaller; original kept.
    Ineffective,
    /// No encoder for this media kind; original kept.
    Unavailable,
    /// Encoding failed; original kept.
    Failed(String),
}

impl CompressionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionStatus::Compressed => "compressed",
            CompressionStatus::Skipped => "skipped",
            CompressionStatus::Ineffective => "ineffective",
            CompressionStatus::Unavailable => "unavailable",
            CompressionStatus::Failed(_) => "failed",
        }
    }

    /// True when the returned bytes are the untouched input.
    pub fn is_passthrough(&self) -> bool {
        !matches!(self, CompressionStatus::Compressed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOutcome {
    pub bytes: Vec<u8>,
    pub original_size_bytes: u64,
    pub size_bytes: u64,
    pub status: CompressionStatus,
}

impl CompressionOutcome {
    pub fn new(original_size: usize, bytes: Vec<u8>, status: CompressionStatus) -> Self {
        Self {
            original_size_bytes: original_size as u64,
            size_bytes: bytes.len() as u64,
            bytes,
            status,
        }
    }

    pub fn unchanged(bytes: Vec<u8>, status: CompressionStatus) -> Self {
        Self::new(bytes.len(), bytes, status)
    }

    pub fn ratio(&self) -> f64 {
        if self.original_size_bytes == 0 {
            1.0
        } else {
            self.size_bytes as f64 / self.original_size_bytes as f64
        }
    }
}

/// Shrinks photos and videos toward a byte budget.
#[derive(Clone)]
pub struct CompressionEngine {
    settings: CompressionSettings,
    video_encoder: Arc<dyn VideoEncoder>,
}

impl CompressionEngine {
    pub fn new(settings: CompressionSettings, video_encoder: Arc<dyn VideoEncoder>) -> Self {
        Self {
            settings,
            video_encoder,
        }
    }

    /// Picks the ffmpeg encoder when enabled and present on the host.
    pub fn from_settings(settings: CompressionSettings) -> Self {
        let encoder: Arc<dyn VideoEncoder> = if settings.video_encoder_enabled {
            Arc::new(FfmpegVideoEncoder::detect(settings.ffmpeg_path.clone()))
        } else {
            tracing::info!("Video encoding disabled by configuration");
            Arc::new(UnavailableVideoEncoder)
        };
        Self::new(settings, encoder)
    }

    pub fn settings(&self) -> &CompressionSettings {
        &self.settings
    }

    pub fn video_available(&self) -> bool {
        self.video_encoder.is_available()
    }

    pub fn compress_image(
        &self,
        bytes: &[u8],
        config: &CompressionConfig,
        cancel: &CancellationToken,
    ) -> Result<CompressionOutcome> {
        photo::compress_image(bytes, config, cancel)
    }

    pub fn compress_video(
        &self,
        source: &MediaSource,
        config: &CompressionConfig,
        cancel: &CancellationToken,
    ) -> Result<CompressionOutcome> {
        video::compress_video(self.video_encoder.as_ref(), source, config, cancel)
    }

    /// One-pass compression config scaled by `ratio = target / current`.
    fn derive_config(&self, source: &MediaSource, ratio: f64) -> CompressionConfig {
        let s = &self.settings;
        match source.kind {
            MediaKind::Photo => {
                let quality = (s.image_quality as f64 * ratio)
                    .max(s.quality_floor as f64)
                    .min(1.0) as f32;
                CompressionConfig::image(s.image_max_width, s.image_max_height, quality, s.image_format)
            }
            MediaKind::Video => {
                let source_bitrate = match source.duration_secs {
                    Some(duration) if duration > 0.0 => {
                        (source.bytes.len() as f64 * 8.0 / duration) as u64
                    }
                    _ => s.video_bitrate_bps,
                };
                let bitrate = ((source_bitrate as f64 * ratio) as u64)
                    .min(MAX_VIDEO_BITRATE_BPS)
                    .max(s.video_bitrate_floor_bps);
                CompressionConfig::video(s.video_max_width, s.video_max_height, bitrate, s.video_framerate)
            }
        }
    }

    /// Single-pass heuristic toward `target_size_mb`. Files already within
    /// budget are returned untouched, and the result is never larger than the
    /// input. Landing under the target is not guaranteed; callers that need it
    /// must re-check the size.
    pub fn smart_compress(
        &self,
        source: &MediaSource,
        target_size_mb: f64,
        cancel: &CancellationToken,
    ) -> Result<CompressionOutcome> {
        if !(target_size_mb > 0.0 && target_size_mb.is_finite()) {
            return Err(AppError::Validation(format!(
                "Target size must be a positive number of MB, got {}",
                target_size_mb
            )));
        }

        let current_mb = source.size_mb();
        if current_mb <= target_size_mb {
            return Ok(CompressionOutcome::unchanged(
                source.bytes.clone(),
                CompressionStatus::Skipped,
            ));
        }

        let ratio = target_size_mb / current_mb;
        let config = self.derive_config(source, ratio);
        tracing::debug!(
            media_kind = %source.kind,
            current_mb,
            target_size_mb,
            ratio,
            "Compressing toward target"
        );

        let outcome = match source.kind {
            MediaKind::Photo => self.compress_image(&source.bytes, &config, cancel)?,
            MediaKind::Video => self.compress_video(source, &config, cancel)?,
        };

        if outcome.status == CompressionStatus::Compressed
            && outcome.size_bytes >= source.bytes.len() as u64
        {
            tracing::debug!(
                "Compression produced {} bytes from {}, keeping original",
                outcome.size_bytes,
                source.bytes.len()
            );
            return Ok(CompressionOutcome::unchanged(
                source.bytes.clone(),
                CompressionStatus::Ineffective,
            ));
        }

        Ok(outcome)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// Pseudo-random pixels: PNG cannot compress them, JPEG re-encoding can.
    pub(crate) fn noisy_png(width: u32, height: u32) -> Vec<u8> {
        let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
            let h = (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663))
                .wrapping_mul(2_654_435_761);
            let [r, g, b, _] = h.to_le_bytes();
            Rgb([r, g, b])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }
}
