use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::models::TargetFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow!("Unsupported store backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub store_backend: StoreBackend,
    pub port: u16,
    pub max_upload_size: usize,
    pub default_tier: String,
    pub compression: CompressionSettings,
}

/// Defaults used by `smart_compress` when deriving a one-off config.
#[derive(Debug, Clone, Deserialize)]
pub struct CompressionSettings {
    pub image_max_width: u32,
    pub image_max_height: u32,
    pub image_quality: f32,
    pub image_format: TargetFormat,
    pub quality_floor: f32,
    pub video_max_width: u32,
    pub video_max_height: u32,
    pub video_bitrate_bps: u64,
    pub video_bitrate_floor_bps: u64,
    pub video_framerate: f32,
    pub ffmpeg_path: String,
    pub video_encoder_enabled: bool,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            image_max_width: 1920,
            image_max_height: 1080,
            image_quality: 0.8,
            image_format: TargetFormat::Jpeg,
            quality_floor: 0.3,
            video_max_width: 1280,
            video_max_height: 720,
            video_bitrate_bps: 2_500_000,
            video_bitrate_floor_bps: 250_000,
            video_framerate: 30.0,
            ffmpeg_path: "ffmpeg".to_string(),
            video_encoder_enabled: true,
        }
    }
}

fn var_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow!("Invalid value for {}: {} ({})", key, raw, e))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = CompressionSettings::default();
        let compression = CompressionSettings {
            image_max_width: var_or("IMAGE_MAX_WIDTH", "1920")?,
            image_max_height: var_or("IMAGE_MAX_HEIGHT", "1080")?,
            image_quality: var_or("IMAGE_QUALITY", "0.8")?,
            image_format: var_or("IMAGE_FORMAT", "jpeg")?,
            quality_floor: var_or("QUALITY_FLOOR", "0.3")?,
            video_max_width: var_or("VIDEO_MAX_WIDTH", "1280")?,
            video_max_height: var_or("VIDEO_MAX_HEIGHT", "720")?,
            video_bitrate_bps: var_or("VIDEO_BITRATE_BPS", "2500000")?,
            video_bitrate_floor_bps: var_or("VIDEO_BITRATE_FLOOR_BPS", "250000")?,
            video_framerate: var_or("VIDEO_FRAMERATE", "30")?,
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            video_encoder_enabled: var_or("VIDEO_ENCODER_ENABLED", "true")?,
        };

        if !(compression.quality_floor > 0.0 && compression.quality_floor <= compression.image_quality) {
            return Err(anyhow!(
                "QUALITY_FLOOR must be in (0, IMAGE_QUALITY], got {}",
                compression.quality_floor
            ));
        }

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/media_quota".to_string()),
            store_backend: var_or("STORE_BACKEND", "postgres")?,
            port: var_or("PORT", "3000")?,
            max_upload_size: var_or("MAX_UPLOAD_SIZE", "200000000")?, // 200MB
            default_tier: env::var("DEFAULT_TIER").unwrap_or_else(|_| "basic".to_string()),
            compression,
        })
    }

    /// In-memory configuration, used by tests and local runs.
    pub fn in_memory() -> Self {
        Config {
            database_url: String::new(),
            store_backend: StoreBackend::Memory,
            port: 0,
            max_upload_size: 200_000_000,
            default_tier: "basic".to_string(),
            compression: CompressionSettings::default(),
        }
    }
}
