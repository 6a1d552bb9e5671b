//! Container probing and single-frame rendering
//!
//! [`VideoDecoder`] is the seam between the pipeline and whatever actually
//! decodes video. [`FfmpegDecoder`] shells out to the system `ffprobe` and
//! `ffmpeg` binaries (LGPL-safe, no linking). Each invocation is its own child
//! process and is killed if the calling future is dropped.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::ffmpeg::{FfmpegCommand, FfmpegError};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Ffmpeg(#[from] FfmpegError),

    #[error("no video stream found")]
    NoVideoStream,

    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("malformed probe output: {0}")]
    Malformed(String),

    #[error("frame render failed: {0}")]
    Render(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Raw stream facts as reported by the decoder, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub duration_secs: Option<f64>,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait VideoDecoder: Send + Sync {
    /// Read container/stream headers for the first video stream.
    async fn probe(&self, path: &Path) -> Result<StreamInfo, ProbeError>;

    /// Decode the frame shown at `at_ms`.
    async fn render_frame(&self, path: &Path, at_ms: f64) -> Result<DynamicImage, ProbeError>;
}

pub struct FfmpegDecoder {
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl FfmpegDecoder {
    pub fn new(ffmpeg_bin: impl Into<String>, ffprobe_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    /// Input goes through `-i` so a file name starting with `-` is never
    /// read as an option.
    fn probe_command(&self, path: &Path) -> FfmpegCommand {
        FfmpegCommand::new(&self.ffprobe_bin)
            .args(&[
                "-v", "error",
                "-select_streams", "v:0",
                "-show_entries", "stream=codec_type,width,height,duration:format=duration",
                "-of", "json",
            ])
            .input(path)
    }

    fn frame_command(&self, path: &Path, seek: &[&str]) -> FfmpegCommand {
        FfmpegCommand::new(&self.ffmpeg_bin)
            .args(&["-v", "error"])
            .args(seek)
            .input(path)
            .args(&["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
    }

    async fn grab_frame(&self, path: &Path, seek: &[&str]) -> Result<Vec<u8>, ProbeError> {
        let output = self.frame_command(path, seek).execute().await?;
        Ok(output.stdout)
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[async_trait]
impl VideoDecoder for FfmpegDecoder {
    async fn probe(&self, path: &Path) -> Result<StreamInfo, ProbeError> {
        let output = self.probe_command(path).execute().await?;
        parse_probe_output(&output.stdout)
    }

    async fn render_frame(&self, path: &Path, at_ms: f64) -> Result<DynamicImage, ProbeError> {
        let seek = format!("{:.3}", at_ms.max(0.0) / 1000.0);
        let mut png = self.grab_frame(path, &["-ss", &seek]).await?;

        // Seeking exactly to the end of the stream yields no frame
        if png.is_empty() && at_ms > 0.0 {
            debug!("No frame at {}s in {}, retrying from end", seek, path.display());
            png = self.grab_frame(path, &["-sseof", "-0.5"]).await?;
        }

        if png.is_empty() {
            return Err(ProbeError::Render(format!("no frame decoded at {}s", seek)));
        }

        Ok(image::load_from_memory_with_format(&png, ImageFormat::Png)?)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse `ffprobe -of json` output into [`StreamInfo`].
///
/// Container duration wins over stream duration; either may be absent
/// (validation of the final value happens in the extractor).
pub(crate) fn parse_probe_output(stdout: &[u8]) -> Result<StreamInfo, ProbeError> {
    let parsed: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| ProbeError::Malformed(e.to_string()))?;

    let stream = parsed
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref().map_or(true, |t| t == "video"))
        .ok_or(ProbeError::NoVideoStream)?;

    let parse_secs = |s: &str| s.trim().parse::<f64>().ok();
    let duration_secs = parsed
        .format
        .and_then(|f| f.duration)
        .as_deref()
        .and_then(parse_secs)
        .or_else(|| stream.duration.as_deref().and_then(parse_secs));

    Ok(StreamInfo {
        duration_secs,
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
    })
}
