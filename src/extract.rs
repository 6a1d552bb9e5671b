//! Metadata and thumbnail extraction for a single file

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::config::ThumbnailConfig;
use crate::media::MediaFile;
use crate::probe::{ProbeError, StreamInfo, VideoDecoder};
use crate::resource::{ResourceHandle, ResourceRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub duration_ms: f64,
    pub width: u32,
    pub height: u32,
}

impl VideoMetadata {
    /// Validate raw stream facts. Zero dimensions or a missing, zero, or
    /// non-finite duration mean the file is not playable.
    pub fn from_stream(info: &StreamInfo) -> Result<Self, ProbeError> {
        if info.width == 0 || info.height == 0 {
            return Err(ProbeError::InvalidDimensions {
                width: info.width,
                height: info.height,
            });
        }

        let secs = info
            .duration_secs
            .ok_or_else(|| ProbeError::InvalidDuration("missing".to_string()))?;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(ProbeError::InvalidDuration(secs.to_string()));
        }

        Ok(Self {
            duration_ms: secs * 1000.0,
            width: info.width,
            height: info.height,
        })
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

pub struct Extractor {
    decoder: Arc<dyn VideoDecoder>,
    registry: Arc<ResourceRegistry>,
    config: ThumbnailConfig,
}

impl Extractor {
    pub fn new(
        decoder: Arc<dyn VideoDecoder>,
        registry: Arc<ResourceRegistry>,
        config: ThumbnailConfig,
    ) -> Self {
        Self { decoder, registry, config }
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    pub async fn extract(&self, file: &MediaFile) -> Result<VideoMetadata, ProbeError> {
        let info = self.decoder.probe(&file.path).await?;
        let metadata = VideoMetadata::from_stream(&info)?;
        debug!(
            "Extracted metadata for {}: {:.0}ms {}x{}",
            file.name, metadata.duration_ms, metadata.width, metadata.height
        );
        Ok(metadata)
    }

    /// Render the frame at `min(seek_ms, duration)` as a JPEG resource.
    ///
    /// Reads the duration itself, so it can run concurrently with
    /// [`Extractor::extract`].
    pub async fn thumbnail(&self, file: &MediaFile, seek_ms: f64) -> Result<ResourceHandle, ProbeError> {
        let info = self.decoder.probe(&file.path).await?;
        let metadata = VideoMetadata::from_stream(&info)?;
        let at_ms = seek_ms.min(metadata.duration_ms).max(0.0);

        let frame = self.decoder.render_frame(&file.path, at_ms).await?;
        let quality = self.config.jpeg_quality;
        let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(&frame, quality))
            .await
            .map_err(|e| ProbeError::Render(e.to_string()))??;

        debug!("Rendered {} byte thumbnail for {} at {:.0}ms", jpeg.len(), file.name, at_ms);
        Ok(self.registry.acquire_bytes(jpeg, "image/jpeg"))
    }
}

fn encode_jpeg(frame: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProbeError> {
    let rgb = frame.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::RgbImage;
    use parking_lot::Mutex;
    use std::path::Path;

    struct FixedDecoder {
        info: StreamInfo,
        seeks: Mutex<Vec<f64>>,
    }

    #[async_trait]
    impl VideoDecoder for FixedDecoder {
        async fn probe(&self, _path: &Path) -> Result<StreamInfo, ProbeError> {
            Ok(self.info.clone())
        }

        async fn render_frame(&self, _path: &Path, at_ms: f64) -> Result<DynamicImage, ProbeError> {
            self.seeks.lock().push(at_ms);
            Ok(DynamicImage::ImageRgb8(RgbImage::new(
                self.info.width,
                self.info.height,
            )))
        }
    }

    fn extractor(info: StreamInfo) -> (Extractor, Arc<FixedDecoder>, Arc<ResourceRegistry>) {
        let decoder = Arc::new(FixedDecoder { info, seeks: Mutex::new(Vec::new()) });
        let registry = ResourceRegistry::new();
        let extractor = Extractor::new(decoder.clone(), registry.clone(), ThumbnailConfig::default());
        (extractor, decoder, registry)
    }

    fn clip() -> MediaFile {
        MediaFile::new("/media/clip.mp4", "clip.mp4", 1, "video/mp4")
    }

    #[test]
    fn test_metadata_converts_seconds() {
        let meta = VideoMetadata::from_stream(&StreamInfo {
            duration_secs: Some(12.345),
            width: 1280,
            height: 720,
        })
        .unwrap();
        assert!((meta.duration_ms - 12345.0).abs() < 1e-6);
    }

    #[test]
    fn test_metadata_rejects_zero_dimensions() {
        let err = VideoMetadata::from_stream(&StreamInfo {
            duration_secs: Some(1.0),
            width: 0,
            height: 720,
        })
        .unwrap_err();
        assert!(matches!(err, ProbeError::InvalidDimensions { width: 0, height: 720 }));
    }

    #[test]
    fn test_metadata_rejects_bad_duration() {
        for duration in [None, Some(0.0), Some(-1.0), Some(f64::NAN), Some(f64::INFINITY)] {
            let result = VideoMetadata::from_stream(&StreamInfo {
                duration_secs: duration,
                width: 16,
                height: 9,
            });
            assert!(matches!(result, Err(ProbeError::InvalidDuration(_))), "{:?}", duration);
        }
    }

    #[tokio::test]
    async fn test_thumbnail_is_jpeg_resource() {
        let (extractor, decoder, registry) = extractor(StreamInfo {
            duration_secs: Some(5.0),
            width: 32,
            height: 18,
        });

        let handle = extractor.thumbnail(&clip(), 1000.0).await.unwrap();
        assert_eq!(*decoder.seeks.lock(), vec![1000.0]);

        match registry.resolve(&handle) {
            Some(crate::resource::Resource::Bytes { data, content_type }) => {
                assert_eq!(content_type, "image/jpeg");
                assert_eq!(&data[..2], &[0xff, 0xd8]);
            }
            other => panic!("unexpected resource: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_thumbnail_seek_clamped_to_duration() {
        let (extractor, decoder, _registry) = extractor(StreamInfo {
            duration_secs: Some(0.4),
            width: 16,
            height: 16,
        });

        extractor.thumbnail(&clip(), 1000.0).await.unwrap();
        assert_eq!(*decoder.seeks.lock(), vec![400.0]);
    }

    #[tokio::test]
    async fn test_thumbnail_of_undecodable_file_acquires_nothing() {
        let (extractor, decoder, registry) = extractor(StreamInfo {
            duration_secs: None,
            width: 0,
            height: 0,
        });

        assert!(extractor.thumbnail(&clip(), 1000.0).await.is_err());
        assert!(decoder.seeks.lock().is_empty());
        assert_eq!(registry.live_count(), 0);
    }
}
