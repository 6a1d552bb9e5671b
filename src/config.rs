//! Pipeline configuration
//!
//! Every field has a default, so a config file only needs the values it
//! overrides:
//!
//! ```json
//! { "ffmpeg_bin": "/opt/ffmpeg/bin/ffmpeg", "thumbnail": { "jpeg_quality": 70 } }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::canvas::CanvasSize;
use crate::timeline::PlacementOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub thumbnail: ThumbnailConfig,
    pub canvas: CanvasPolicy,
    pub placement: PlacementOptions,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            thumbnail: ThumbnailConfig::default(),
            canvas: CanvasPolicy::default(),
            placement: PlacementOptions::default(),
        }
    }
}

impl IngestConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Preferred frame offset, clamped to the video's duration
    pub seek_ms: f64,
    pub jpeg_quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            seek_ms: 1000.0,
            jpeg_quality: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasPolicy {
    pub max_width: u32,
    pub max_height: u32,
    /// Per-axis pixel drift that triggers a resize once the timeline has items
    pub adapt_threshold: u32,
    pub initial: CanvasSize,
}

impl Default for CanvasPolicy {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
            adapt_threshold: 100,
            initial: CanvasSize { width: 1080, height: 1920 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::ScaleMode;

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.ffprobe_bin, "ffprobe");
        assert_eq!(config.thumbnail.seek_ms, 1000.0);
        assert_eq!(config.thumbnail.jpeg_quality, 80);
        assert_eq!(config.canvas.max_width, 1920);
        assert_eq!(config.canvas.initial, CanvasSize { width: 1080, height: 1920 });
        assert_eq!(config.placement.target_track, "main");
        assert_eq!(config.placement.scale_mode, ScaleMode::Fit);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intake.json");
        std::fs::write(
            &path,
            r#"{ "ffmpeg_bin": "/opt/ff/ffmpeg", "canvas": { "adapt_threshold": 50 } }"#,
        )
        .unwrap();

        let config = IngestConfig::from_file(&path).unwrap();
        assert_eq!(config.ffmpeg_bin, "/opt/ff/ffmpeg");
        assert_eq!(config.ffprobe_bin, "ffprobe");
        assert_eq!(config.canvas.adapt_threshold, 50);
        assert_eq!(config.canvas.max_height, 1080);
        assert_eq!(config.thumbnail.jpeg_quality, 80);
    }

    #[test]
    fn test_bad_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ nope").unwrap();

        let err = IngestConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));

        let missing = IngestConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
