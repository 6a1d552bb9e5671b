//! Request/response interface for media_intake
//!
//! Exposes the ingestion pipeline as named JSON operations so the daemon (or
//! an embedding host) can drive it without linking against the Rust types.
//!
//! ## Available Operations
//!
//! 1. `video.ingest` - Ingest one file into an editor-ready descriptor
//! 2. `video.ingest_batch` - Ingest many files with partial-failure semantics
//! 3. `video.is_supported` - Classify a file name / content type
//! 4. `resource.release` - Release one resource handle
//! 5. `resource.release_owner` - Release every handle backing a descriptor
//! 6. `canvas.size` - Current working canvas
//! 7. `timeline.items` - Placements handed to the timeline
//! 8. `capabilities` - Capability card query
//! 9. `metrics` - Counters snapshot
//!
//! ## Example
//!
//! ```rust,no_run
//! use media_intake::config::IngestConfig;
//! use media_intake::service::{Handler, IngestService, Request};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = IngestService::new(&IngestConfig::default());
//!
//! let response = service.handle(Request {
//!     op: "video.ingest".to_string(),
//!     input: json!({"path": "/footage/beach.mp4", "place": true}),
//! }).await?;
//! println!("{}", response.output);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::canvas::CanvasNegotiator;
use crate::config::IngestConfig;
use crate::descriptor::{FileFailure, IngestedVideo};
use crate::error::IngestError;
use crate::ingest::Ingestor;
use crate::media::{self, MediaFile};
use crate::metrics::{Metrics, Timer};
use crate::probe::{FfmpegDecoder, VideoDecoder};
use crate::resource::{ResourceHandle, ResourceRegistry};
use crate::timeline::{EditorTimeline, PlacementOptions, Timeline};

const OPERATIONS: &[&str] = &[
    "video.ingest",
    "video.ingest_batch",
    "video.is_supported",
    "resource.release",
    "resource.release_owner",
    "canvas.size",
    "timeline.items",
    "capabilities",
    "metrics",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub op: String,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    pub output: Value,
    pub latency_ms: u64,
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: Request) -> Result<Response, ServiceError>;
    fn describe(&self) -> ServiceCard;
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::UnsupportedOperation(_) => "UnsupportedOperation",
            ServiceError::InvalidInput(_) => "InvalidInput",
            ServiceError::Serialization(_) => "Serialization",
            ServiceError::Ingest(e) => match e {
                IngestError::UnsupportedFormat { .. } => "UnsupportedFormat",
                IngestError::Decode { .. } => "DecodeError",
                IngestError::Thumbnail { .. } => "ThumbnailError",
                IngestError::EmptyBatch => "EmptyBatch",
                IngestError::AllFailed(_) => "AllFailed",
            },
        }
    }

    fn to_output(&self) -> Value {
        let mut output = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        match self {
            ServiceError::Ingest(IngestError::AllFailed(failures)) => {
                output["failures"] = json!(failures);
            }
            ServiceError::Ingest(e) => {
                if let Some(file) = e.file_name() {
                    output["file_name"] = json!(file);
                }
            }
            ServiceError::UnsupportedOperation(_) => {
                output["available_operations"] = json!(OPERATIONS);
            }
            _ => {}
        }
        output
    }
}

/// Service capability card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCard {
    pub name: String,
    pub version: String,
    pub description: String,
    pub operations: Vec<OperationCard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationCard {
    pub name: String,
    pub description: String,
    pub idempotent: bool,
    pub side_effects: Vec<String>,
    pub input_schema: Option<Value>,
}

/// One file in an ingest request. A declared name or content type overrides
/// what is read from disk.
#[derive(Debug, Clone, Deserialize)]
struct FileSpec {
    path: String,
    name: Option<String>,
    content_type: Option<String>,
}

impl FileSpec {
    /// Name reported for this entry before the file is opened
    fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            Path::new(&self.path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| self.path.clone())
        })
    }
}

pub struct IngestService {
    ingestor: Ingestor,
    timeline: Arc<EditorTimeline>,
    placement: PlacementOptions,
    metrics: Arc<Metrics>,
}

impl IngestService {
    /// Service backed by the system ffmpeg/ffprobe named in `config`.
    pub fn new(config: &IngestConfig) -> Self {
        let decoder = Arc::new(FfmpegDecoder::new(&config.ffmpeg_bin, &config.ffprobe_bin));
        Self::with_decoder(decoder, config)
    }

    pub fn with_decoder(decoder: Arc<dyn VideoDecoder>, config: &IngestConfig) -> Self {
        let metrics = Metrics::new();
        let canvas = CanvasNegotiator::shared(config.canvas.clone());
        let registry = ResourceRegistry::new();
        let ingestor = Ingestor::new(decoder, registry, Arc::clone(&canvas), config)
            .with_metrics(Arc::clone(&metrics));

        Self {
            ingestor,
            timeline: Arc::new(EditorTimeline::new(canvas)),
            placement: config.placement.clone(),
            metrics,
        }
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    pub fn timeline(&self) -> Arc<EditorTimeline> {
        Arc::clone(&self.timeline)
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    async fn open_file(spec: FileSpec) -> std::io::Result<MediaFile> {
        let mut file = MediaFile::open(&spec.path).await?;
        if let Some(name) = spec.name {
            file.name = name;
        }
        if let Some(content_type) = spec.content_type {
            file.content_type = content_type;
        }
        Ok(file)
    }

    fn place(&self, video: &IngestedVideo) {
        self.timeline.add_video(video.video.clone(), &self.placement);
    }

    /// Handle video.ingest operation
    async fn handle_ingest(&self, input: Value) -> Result<Value, ServiceError> {
        let place = input["place"].as_bool().unwrap_or(false);
        let spec: FileSpec = serde_json::from_value(input)
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
        let path = spec.path.clone();
        let file = Self::open_file(spec)
            .await
            .map_err(|e| ServiceError::InvalidInput(format!("cannot open {}: {}", path, e)))?;

        let result = self.ingestor.ingest_one(&file).await?;
        if place {
            self.place(&result);
        }

        Ok(json!({
            "video": result.video,
            "warning": result.warning,
            "placed": place,
        }))
    }

    /// Handle video.ingest_batch operation
    async fn handle_ingest_batch(&self, input: Value) -> Result<Value, ServiceError> {
        let place = input["place"].as_bool().unwrap_or(false);
        let specs: Vec<FileSpec> = serde_json::from_value(input["files"].clone())
            .map_err(|e| ServiceError::InvalidInput(format!("files: {}", e)))?;

        // An unreadable entry is that entry's failure, not the batch's
        let mut files = Vec::with_capacity(specs.len());
        let mut unreadable = Vec::new();
        for spec in specs {
            let file_name = spec.display_name();
            match Self::open_file(spec).await {
                Ok(file) => files.push(file),
                Err(e) => {
                    warn!("{}: cannot open file: {}", file_name, e);
                    unreadable.push(FileFailure {
                        file_name,
                        reason: format!("cannot open file: {}", e),
                    });
                }
            }
        }
        if !unreadable.is_empty() {
            self.metrics.record_files(0, unreadable.len());
        }

        let mut batch = match self.ingestor.ingest_many(&files).await {
            Ok(batch) => batch,
            Err(IngestError::EmptyBatch) if !unreadable.is_empty() => {
                return Err(IngestError::AllFailed(unreadable).into());
            }
            Err(IngestError::AllFailed(mut failures)) => {
                unreadable.append(&mut failures);
                return Err(IngestError::AllFailed(unreadable).into());
            }
            Err(e) => return Err(e.into()),
        };
        unreadable.append(&mut batch.failures);
        batch.failures = unreadable;
        let mut placed = 0;
        if place {
            batch.videos.iter().for_each(|v| self.place(v));
            placed = batch.videos.len();
        }

        Ok(json!({
            "videos": batch.videos,
            "failures": batch.failures,
            "placed": placed,
        }))
    }

    fn handle_is_supported(&self, input: Value) -> Result<Value, ServiceError> {
        let name = input["name"]
            .as_str()
            .ok_or_else(|| ServiceError::InvalidInput("Missing name".to_string()))?;
        let content_type = input["content_type"].as_str().unwrap_or("");

        Ok(json!({ "supported": media::is_supported_video(name, content_type) }))
    }

    fn handle_release(&self, input: Value) -> Result<Value, ServiceError> {
        let handle = input["handle"]
            .as_str()
            .ok_or_else(|| ServiceError::InvalidInput("Missing handle".to_string()))?;

        let released = self.ingestor.registry().release(&ResourceHandle::from(handle));
        Ok(json!({ "released": released }))
    }

    fn handle_release_owner(&self, input: Value) -> Result<Value, ServiceError> {
        let owner = input["owner"]
            .as_str()
            .ok_or_else(|| ServiceError::InvalidInput("Missing owner".to_string()))?;

        let released = self.ingestor.registry().release_owner(owner);
        Ok(json!({ "released": released }))
    }

    fn handle_canvas_size(&self) -> Value {
        let canvas = self.ingestor.canvas().lock();
        json!({
            "width": canvas.size().width,
            "height": canvas.size().height,
            "timeline_items": canvas.timeline_items(),
        })
    }

    async fn dispatch(&self, request: Request) -> Result<Value, ServiceError> {
        match request.op.as_str() {
            "video.ingest" => self.handle_ingest(request.input).await,
            "video.ingest_batch" => self.handle_ingest_batch(request.input).await,
            "video.is_supported" => self.handle_is_supported(request.input),
            "resource.release" => self.handle_release(request.input),
            "resource.release_owner" => self.handle_release_owner(request.input),
            "canvas.size" => Ok(self.handle_canvas_size()),
            "timeline.items" => Ok(json!({ "items": self.timeline.placements() })),
            "capabilities" => Ok(serde_json::to_value(self.describe())?),
            "metrics" => Ok(json!(self.metrics.snapshot())),
            other => Err(ServiceError::UnsupportedOperation(other.to_string())),
        }
    }
}

#[async_trait]
impl Handler for IngestService {
    async fn handle(&self, request: Request) -> Result<Response, ServiceError> {
        let timer = Timer::new();
        let op = request.op.clone();

        let result = self.dispatch(request).await;
        let latency_ms = timer.elapsed_ms();
        self.metrics.record_request(&op, result.is_ok(), latency_ms);

        let response = match result {
            Ok(output) => Response { ok: true, output, latency_ms },
            Err(e) => {
                debug!("{} failed: {}", op, e);
                Response { ok: false, output: e.to_output(), latency_ms }
            }
        };
        Ok(response)
    }

    fn describe(&self) -> ServiceCard {
        let op = |name: &str, description: &str, idempotent: bool, side_effects: &[&str], schema: Option<Value>| {
            OperationCard {
                name: name.to_string(),
                description: description.to_string(),
                idempotent,
                side_effects: side_effects.iter().map(|s| s.to_string()).collect(),
                input_schema: schema,
            }
        };
        let file_schema = json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path to the media file" },
                "name": { "type": "string", "description": "Display name (default: file name)" },
                "content_type": { "type": "string", "description": "Declared MIME type (default: sniffed)" }
            },
            "required": ["path"]
        });

        ServiceCard {
            name: "media_intake".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Local video ingestion: metadata, thumbnails, aspect checks and canvas negotiation".to_string(),
            operations: vec![
                op(
                    "video.ingest",
                    "Ingest one video file into an editor-ready descriptor",
                    false,
                    &["acquires resource handles", "may resize canvas", "invokes ffmpeg"],
                    Some(json!({
                        "allOf": [file_schema.clone()],
                        "properties": { "place": { "type": "boolean" } }
                    })),
                ),
                op(
                    "video.ingest_batch",
                    "Ingest several files concurrently; fails only when every video fails",
                    false,
                    &["acquires resource handles", "may resize canvas", "invokes ffmpeg"],
                    Some(json!({
                        "type": "object",
                        "properties": {
                            "files": { "type": "array", "items": file_schema },
                            "place": { "type": "boolean" }
                        },
                        "required": ["files"]
                    })),
                ),
                op(
                    "video.is_supported",
                    "Classify a file as video from its name and declared content type",
                    true,
                    &[],
                    Some(json!({
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "content_type": { "type": "string" }
                        },
                        "required": ["name"]
                    })),
                ),
                op(
                    "resource.release",
                    "Release one resource handle (no-op if unknown or already released)",
                    true,
                    &["releases resource mapping"],
                    Some(json!({
                        "type": "object",
                        "properties": { "handle": { "type": "string" } },
                        "required": ["handle"]
                    })),
                ),
                op(
                    "resource.release_owner",
                    "Release every handle backing a descriptor id",
                    true,
                    &["releases resource mappings"],
                    Some(json!({
                        "type": "object",
                        "properties": { "owner": { "type": "string" } },
                        "required": ["owner"]
                    })),
                ),
                op("canvas.size", "Current working canvas size", true, &[], None),
                op("timeline.items", "Videos handed to the timeline", true, &[], None),
                op("capabilities", "This capability card", true, &[], None),
                op("metrics", "Request and pipeline counters", true, &[], None),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(op: &str, input: Value) -> Request {
        Request { op: op.to_string(), input }
    }

    #[tokio::test]
    async fn test_capabilities() {
        let service = IngestService::new(&IngestConfig::default());
        let response = service.handle(request("capabilities", json!({}))).await.unwrap();

        assert!(response.ok);
        assert_eq!(response.output["name"], "media_intake");
        assert_eq!(response.output["operations"].as_array().unwrap().len(), OPERATIONS.len());
    }

    #[tokio::test]
    async fn test_unsupported_operation() {
        let service = IngestService::new(&IngestConfig::default());
        let response = service.handle(request("video.render", json!({}))).await.unwrap();

        assert!(!response.ok);
        assert_eq!(response.output["error"], "UnsupportedOperation");
        assert!(response.output["available_operations"].is_array());
    }

    #[tokio::test]
    async fn test_is_supported() {
        let service = IngestService::new(&IngestConfig::default());

        let yes = service
            .handle(request("video.is_supported", json!({"name": "a.MKV"})))
            .await
            .unwrap();
        assert_eq!(yes.output["supported"], true);

        let no = service
            .handle(request("video.is_supported", json!({"name": "a.txt", "content_type": "text/plain"})))
            .await
            .unwrap();
        assert_eq!(no.output["supported"], false);

        let missing = service.handle(request("video.is_supported", json!({}))).await.unwrap();
        assert!(!missing.ok);
        assert_eq!(missing.output["error"], "InvalidInput");
    }

    #[tokio::test]
    async fn test_release_unknown_handle_is_ok() {
        let service = IngestService::new(&IngestConfig::default());
        let response = service
            .handle(request("resource.release", json!({"handle": "blob:unknown"})))
            .await
            .unwrap();

        assert!(response.ok);
        assert_eq!(response.output["released"], false);
    }

    #[tokio::test]
    async fn test_canvas_starts_portrait() {
        let service = IngestService::new(&IngestConfig::default());
        let response = service.handle(request("canvas.size", json!({}))).await.unwrap();

        assert_eq!(response.output["width"], 1080);
        assert_eq!(response.output["height"], 1920);
        assert_eq!(response.output["timeline_items"], 0);
    }

    #[tokio::test]
    async fn test_metrics_count_requests() {
        let service = IngestService::new(&IngestConfig::default());
        service.handle(request("canvas.size", json!({}))).await.unwrap();
        service.handle(request("nope", json!({}))).await.unwrap();

        let snap = service.metrics().snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.failed_requests, 1);
    }
}
