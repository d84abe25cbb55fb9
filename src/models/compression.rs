use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{AppError, Result};
use crate::models::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Jpeg,
    Png,
    Webp,
    /// H.264 in an MP4 container.
    H264,
}

impl TargetFormat {
    pub fn media_kind(&self) -> MediaKind {
        match self {
            TargetFormat::H264 => MediaKind::Video,
            _ => MediaKind::Photo,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "image/jpeg",
            TargetFormat::Png => "image/png",
            TargetFormat::Webp => "image/webp",
            TargetFormat::H264 => "video/mp4",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpg",
            TargetFormat::Png => "png",
            TargetFormat::Webp => "webp",
            TargetFormat::H264 => "mp4",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::Png => "png",
            TargetFormat::Webp => "webp",
            TargetFormat::H264 => "h264",
        };
        f.write_str(name)
    }
}

impl FromStr for TargetFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(TargetFormat::Jpeg),
            "png" => Ok(TargetFormat::Png),
            "webp" => Ok(TargetFormat::Webp),
            "h264" | "mp4" => Ok(TargetFormat::H264),
            other => Err(format!("Unsupported target format: {}", other)),
        }
    }
}

/// Parameters for a single compression pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// In (0, 1].
    pub quality: f32,
    pub target_format: TargetFormat,
    pub video_bitrate_bps: Option<u64>,
    pub video_framerate: Option<f32>,
}

impl CompressionConfig {
    pub fn image(max_width: u32, max_height: u32, quality: f32, format: TargetFormat) -> Self {
        Self {
            max_width: Some(max_width),
            max_height: Some(max_height),
            quality,
            target_format: format,
            video_bitrate_bps: None,
            video_framerate: None,
        }
    }

    pub fn video(max_width: u32, max_height: u32, bitrate_bps: u64, framerate: f32) -> Self {
        Self {
            max_width: Some(max_width),
            max_height: Some(max_height),
            quality: 1.0,
            target_format: TargetFormat::H264,
            video_bitrate_bps: Some(bitrate_bps),
            video_framerate: Some(framerate),
        }
    }

    pub fn validate_for(&self, kind: MediaKind) -> Result<()> {
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(AppError::Validation(format!(
                "Quality must be in (0, 1], got {}",
                self.quality
            )));
        }

        if self.max_width == Some(0) || self.max_height == Some(0) {
            return Err(AppError::Validation(
                "Maximum dimensions must be positive".to_string(),
            ));
        }

        if self.video_bitrate_bps == Some(0) {
            return Err(AppError::Validation("Video bitrate must be positive".to_string()));
        }

        if let Some(fps) = self.video_framerate {
            if !(fps > 0.0 && fps.is_finite()) {
                return Err(AppError::Validation(format!(
                    "Video framerate must be positive, got {}",
                    fps
                )));
            }
        }

        if self.target_format.media_kind() != kind {
            return Err(AppError::Validation(format!(
                "Target format {} cannot be used for {} compression",
                self.target_format, kind
            )));
        }

        Ok(())
    }
}

/// Largest size that fits inside the optional bounds while keeping the
/// aspect ratio. Never upscales.
pub fn fit_within(
    width: u32,
    height: u32,
    max_width: Option<u32>,
    max_height: Option<u32>,
) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }

    let ratio_w = max_width.map_or(f64::INFINITY, |m| m as f64 / width as f64);
    let ratio_h = max_height.map_or(f64::INFINITY, |m| m as f64 / height as f64);
    let scale = ratio_w.min(ratio_h).min(1.0);

    if scale >= 1.0 {
        return (width, height);
    }

    let mut new_width = ((width as f64 * scale).round() as u32).max(1);
    let mut new_height = ((height as f64 * scale).round() as u32).max(1);
    if let Some(m) = max_width {
        new_width = new_width.min(m);
    }
    if let Some(m) = max_height {
        new_height = new_height.min(m);
    }

    (new_width, new_height)
}
