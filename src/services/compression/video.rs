use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{AppError, Result},
    models::{fit_within, CompressionConfig, MediaKind},
    services::compression::{CompressionOutcome, CompressionStatus, MediaSource},
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Bytes of ffmpeg's log kept in a failure message.
const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleFilter {
    Keep,
    Exact(u32, u32),
    /// Used when the source dimensions are unknown; the encoder works them out.
    FitWithin {
        max_width: Option<u32>,
        max_height: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoEncodeParams {
    pub scale: ScaleFilter,
    pub bitrate_bps: Option<u64>,
    pub framerate: Option<f32>,
}

/// A video encoding capability. Implementations may be absent at runtime;
/// callers check `is_available` before encoding.
#[cfg_attr(test, mockall::automock)]
pub trait VideoEncoder: Send + Sync {
    fn is_available(&self) -> bool;

    fn encode(
        &self,
        input: &[u8],
        params: &VideoEncodeParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>>;
}

/// Stand-in for runtimes without any video encoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableVideoEncoder;

impl VideoEncoder for UnavailableVideoEncoder {
    fn is_available(&self) -> bool {
        false
    }

    fn encode(
        &self,
        _input: &[u8],
        _params: &VideoEncodeParams,
        _cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        Err(AppError::Compression("No video encoder available".to_string()))
    }
}

/// Encodes to H.264/MP4 by running an `ffmpeg` binary on temp files.
#[derive(Debug, Clone)]
pub struct FfmpegVideoEncoder {
    ffmpeg_path: String,
    available: bool,
}

impl FfmpegVideoEncoder {
    /// Probes `<path> -version` once; the result is cached for the lifetime
    /// of the encoder.
    pub fn detect(ffmpeg_path: impl Into<String>) -> Self {
        let ffmpeg_path = ffmpeg_path.into();
        let available = Command::new(&ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);

        if available {
            tracing::info!("Video encoder available: {}", ffmpeg_path);
        } else {
            tracing::warn!(
                "Video encoder not found at {}; video compression will pass files through",
                ffmpeg_path
            );
        }

        Self {
            ffmpeg_path,
            available,
        }
    }

    fn scale_arg(scale: ScaleFilter) -> String {
        match scale {
            ScaleFilter::Keep => "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
            ScaleFilter::Exact(width, height) => format!("scale={}:{}", width, height),
            ScaleFilter::FitWithin {
                max_width,
                max_height,
            } => {
                let width = max_width.map_or("iw".to_string(), |w| format!("min({},iw)", w));
                let height = max_height.map_or("ih".to_string(), |h| format!("min({},ih)", h));
                format!(
                    "scale='{}':'{}':force_original_aspect_ratio=decrease:force_divisible_by=2",
                    width, height
                )
            }
        }
    }

    fn build_args(input: &Path, output: &Path, params: &VideoEncodeParams) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-vf".into(),
            Self::scale_arg(params.scale),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "veryfast".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ];

        if let Some(bitrate) = params.bitrate_bps {
            args.extend([
                "-b:v".to_string(),
                bitrate.to_string(),
                "-maxrate".to_string(),
                bitrate.to_string(),
                "-bufsize".to_string(),
                bitrate.saturating_mul(2).to_string(),
            ]);
        }

        if let Some(fps) = params.framerate {
            args.extend(["-r".to_string(), format!("{}", fps)]);
        }

        args.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.to_string_lossy().into_owned(),
        ]);

        args
    }
}

impl VideoEncoder for FfmpegVideoEncoder {
    fn is_available(&self) -> bool {
        self.available
    }

    fn encode(
        &self,
        input: &[u8],
        params: &VideoEncodeParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let workdir = tempfile::tempdir()?;
        let input_path = workdir.path().join("input");
        let output_path = workdir.path().join("output.mp4");
        let log_path = workdir.path().join("ffmpeg.log");
        std::fs::write(&input_path, input)?;

        // Undrained pipes fill up and block the child, so stderr goes to a file.
        let log = File::create(&log_path)?;
        let mut child = Command::new(&self.ffmpeg_path)
            .args(Self::build_args(&input_path, &output_path, params))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .spawn()?;

        let status = loop {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(AppError::Cancelled);
            }
            if let Some(status) = child.try_wait()? {
                break status;
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            let log = std::fs::read(&log_path).unwrap_or_default();
            let tail = &log[log.len().saturating_sub(STDERR_TAIL_BYTES)..];
            return Err(AppError::Compression(format!(
                "ffmpeg exited with {}: {}",
                status,
                String::from_utf8_lossy(tail).trim()
            )));
        }

        Ok(std::fs::read(&output_path)?)
    }
}

/// libx264 with yuv420p needs even dimensions.
fn even(n: u32) -> u32 {
    (n & !1).max(2)
}

/// Scales and re-encodes a video. A missing encoder, an encoder failure or
/// an output no smaller than the input returns the original bytes, with an
/// `Unavailable`, `Failed` or `Ineffective` status respectively.
pub fn compress_video(
    encoder: &dyn VideoEncoder,
    source: &MediaSource,
    config: &CompressionConfig,
    cancel: &CancellationToken,
) -> Result<CompressionOutcome> {
    config.validate_for(MediaKind::Video)?;
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }

    if !encoder.is_available() {
        tracing::warn!(
            size_bytes = source.bytes.len(),
            "Video encoder unavailable, keeping original"
        );
        return Ok(CompressionOutcome::unchanged(
            source.bytes.clone(),
            CompressionStatus::Unavailable,
        ));
    }

    let scale = match (source.width, source.height) {
        (Some(width), Some(height)) => {
            let (w, h) = fit_within(width, height, config.max_width, config.max_height);
            ScaleFilter::Exact(even(w), even(h))
        }
        _ if config.max_width.is_none() && config.max_height.is_none() => ScaleFilter::Keep,
        _ => ScaleFilter::FitWithin {
            max_width: config.max_width,
            max_height: config.max_height,
        },
    };

    let params = VideoEncodeParams {
        scale,
        bitrate_bps: config.video_bitrate_bps,
        framerate: config.video_framerate,
    };

    match encoder.encode(&source.bytes, &params, cancel) {
        Ok(encoded) if encoded.len() >= source.bytes.len() => {
            tracing::debug!(
                "Video encode produced {} bytes from {}, keeping original",
                encoded.len(),
                source.bytes.len()
            );
            Ok(CompressionOutcome::unchanged(
                source.bytes.clone(),
                CompressionStatus::Ineffective,
            ))
        }
        Ok(encoded) => Ok(CompressionOutcome::new(
            source.bytes.len(),
            encoded,
            CompressionStatus::Compressed,
        )),
        Err(AppError::Cancelled) => Err(AppError::Cancelled),
        Err(e) => {
            tracing::warn!("Video compression failed, keeping original: {}", e);
            Ok(CompressionOutcome::unchanged(
                source.bytes.clone(),
                CompressionStatus::Failed(e.to_string()),
            ))
        }
    }
}
