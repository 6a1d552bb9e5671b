//! media_intake - local video ingestion for an editor timeline
//!
//! Turns user-supplied video files into editor-ready descriptors: duration,
//! dimensions, a thumbnail, an aspect-ratio advisory, and a working canvas
//! that follows the footage. Decoding shells out to the system `ffprobe` /
//! `ffmpeg` binaries (LGPL-safe, no linking).

pub mod aspect;
pub mod canvas;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod extract;
pub mod ffmpeg;
pub mod ingest;
pub mod media;
pub mod metrics;
pub mod probe;
pub mod resource;
pub mod service;
pub mod timeline;

pub use aspect::{validate as validate_aspect_ratio, AspectRatioValidation};
pub use canvas::{compute_optimal_size, CanvasNegotiator, CanvasSize, SharedCanvas};
pub use config::IngestConfig;
pub use descriptor::{BatchResult, FileFailure, IngestedVideo, ProcessedVideo, VideoDescriptor};
pub use error::{IngestError, Result};
pub use extract::{Extractor, VideoMetadata};
pub use ffmpeg::{FfmpegCommand, FfmpegError};
pub use ingest::Ingestor;
pub use media::{is_supported_video, MediaFile};
pub use probe::{FfmpegDecoder, ProbeError, StreamInfo, VideoDecoder};
pub use resource::{HandleGuard, Resource, ResourceHandle, ResourceRegistry};
pub use timeline::{EditorTimeline, PlacementOptions, ScaleMode, Timeline};
