//! Single-file and batch ingestion
//!
//! [`Ingestor::ingest_one`] turns one [`MediaFile`] into an [`IngestedVideo`]:
//!
//! 1. reject non-video files before touching any resource
//! 2. map the source file to a handle, then extract metadata and render the
//!    thumbnail concurrently
//! 3. validate the aspect ratio (advisory)
//! 4. let the canvas negotiator adapt to the new dimensions
//! 5. build the descriptor and file both handles under its id
//!
//! Handles acquired in step 2 are held by guards until step 5, so any failure
//! releases them before the error reaches the caller.
//!
//! [`Ingestor::ingest_many`] runs every recognised video in a batch at once on
//! the caller's task. One file failing never affects another; the batch only
//! fails when nothing succeeded.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::aspect;
use crate::canvas::SharedCanvas;
use crate::config::IngestConfig;
use crate::descriptor::{BatchResult, IngestedVideo, ProcessedVideo, VideoDescriptor};
use crate::error::{IngestError, Result};
use crate::extract::Extractor;
use crate::media::MediaFile;
use crate::metrics::Metrics;
use crate::probe::{FfmpegDecoder, VideoDecoder};
use crate::resource::ResourceRegistry;

pub struct Ingestor {
    extractor: Extractor,
    registry: Arc<ResourceRegistry>,
    canvas: SharedCanvas,
    metrics: Option<Arc<Metrics>>,
}

impl Ingestor {
    pub fn new(
        decoder: Arc<dyn VideoDecoder>,
        registry: Arc<ResourceRegistry>,
        canvas: SharedCanvas,
        config: &IngestConfig,
    ) -> Self {
        let extractor = Extractor::new(decoder, Arc::clone(&registry), config.thumbnail.clone());
        Self { extractor, registry, canvas, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Ingestor backed by the system ffmpeg/ffprobe binaries named in `config`.
    pub fn with_ffmpeg(
        config: &IngestConfig,
        registry: Arc<ResourceRegistry>,
        canvas: SharedCanvas,
    ) -> Self {
        let decoder = Arc::new(FfmpegDecoder::new(&config.ffmpeg_bin, &config.ffprobe_bin));
        Self::new(decoder, registry, canvas, config)
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn canvas(&self) -> &SharedCanvas {
        &self.canvas
    }

    pub async fn ingest_one(&self, file: &MediaFile) -> Result<IngestedVideo> {
        let outcome = self.process_one(file).await;
        if let Some(metrics) = &self.metrics {
            match &outcome {
                Ok(_) => metrics.record_files(1, 0),
                Err(_) => metrics.record_files(0, 1),
            }
        }
        outcome
    }

    async fn process_one(&self, file: &MediaFile) -> Result<IngestedVideo> {
        if !file.is_supported_video() {
            debug!("Rejecting {} ({}): not a video", file.name, file.content_type);
            return Err(IngestError::UnsupportedFormat { file: file.name.clone() });
        }

        let source_guard = self.registry.guard(self.registry.acquire_file(file));
        let seek_ms = self.extractor.config().seek_ms;
        let (metadata, thumbnail) = tokio::join!(
            self.extractor.extract(file),
            self.extractor.thumbnail(file, seek_ms),
        );

        // Guard the thumbnail first so a metadata failure still releases it
        let thumbnail = thumbnail.map(|handle| self.registry.guard(handle));
        let metadata = metadata.map_err(|source| IngestError::Decode {
            file: file.name.clone(),
            source,
        })?;
        let thumbnail_guard = thumbnail.map_err(|source| IngestError::Thumbnail {
            file: file.name.clone(),
            source,
        })?;

        let validation = aspect::validate(metadata.width, metadata.height);
        let adapted = self.canvas.lock().adapt(metadata.width, metadata.height);
        if let (Some(_), Some(metrics)) = (adapted, &self.metrics) {
            metrics.record_canvas_adaptation();
        }

        let processed = ProcessedVideo {
            source: source_guard.keep(),
            thumbnail: thumbnail_guard.keep(),
            metadata,
            aspect_ratio_validation: validation,
        };
        let warning = processed.aspect_ratio_validation.warning.clone();
        let video = VideoDescriptor::from_processed(file, processed);
        self.registry.adopt(&video.id, video.handles());

        if let Some(warning) = &warning {
            warn!("{}: {}", file.name, warning);
        }
        debug!("Ingested {} as {}", file.name, video.id);

        Ok(IngestedVideo { video, warning })
    }

    pub async fn ingest_many(&self, files: &[MediaFile]) -> Result<BatchResult> {
        let videos: Vec<&MediaFile> = files.iter().filter(|f| f.is_supported_video()).collect();
        if videos.len() < files.len() {
            debug!("Skipping {} non-video file(s)", files.len() - videos.len());
        }
        if videos.is_empty() {
            return Err(IngestError::EmptyBatch);
        }

        let outcomes = join_all(videos.iter().map(|file| self.ingest_one(file))).await;

        let mut batch = BatchResult::default();
        for (file, outcome) in videos.iter().zip(outcomes) {
            match outcome {
                Ok(video) => batch.videos.push(video),
                Err(e) => {
                    warn!("{}", e);
                    batch.failures.push(e.to_failure(&file.name));
                }
            }
        }

        if batch.videos.is_empty() {
            return Err(IngestError::AllFailed(batch.failures));
        }

        info!(
            "Ingested {}/{} video(s), {} failed",
            batch.videos.len(),
            videos.len(),
            batch.failures.len()
        );
        Ok(batch)
    }

    /// Release everything backing a descriptor the caller no longer needs.
    pub fn discard(&self, video: &VideoDescriptor) -> usize {
        self.registry.release_owner(&video.id)
    }
}
