//! Media file handles and the video classifier
//!
//! A [`MediaFile`] is the pipeline's read-only view of a user-supplied file:
//! where it lives, what it is called, how big it is, and what content type
//! the caller (or content sniffing) declared for it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extensions accepted as video regardless of declared type
pub const SUPPORTED_VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".avi", ".mov", ".mkv", ".webm", ".flv", ".wmv", ".m4v",
];

/// Substrings of a declared content type that mark a video container
const VIDEO_MIME_MARKERS: &[&str] = &["mp4", "webm", "quicktime", "x-msvideo"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub content_type: String,
}

impl MediaFile {
    /// Describe a file with an explicitly declared content type.
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        size: u64,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size,
            content_type: content_type.into(),
        }
    }

    /// Describe a file on disk, declaring its type by content sniffing.
    ///
    /// Falls back to the extension table when sniffing yields nothing
    /// more specific than `application/octet-stream`.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let meta = tokio::fs::metadata(&path).await?;

        let sniff_path = path.clone();
        let sniffed = tokio::task::spawn_blocking(move || {
            tree_magic_mini::from_filepath(&sniff_path).map(str::to_string)
        })
        .await
        .ok()
        .flatten();

        let content_type = match sniffed {
            Some(mime) if mime != "application/octet-stream" => mime,
            _ => mime_from_extension(&path).to_string(),
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            path,
            name,
            size: meta.len(),
            content_type,
        })
    }

    pub fn is_supported_video(&self) -> bool {
        is_supported_video(&self.name, &self.content_type)
    }
}

/// Decide whether a file is a video from its declared name and content type.
///
/// Either signal is sufficient: an allowlisted extension, or a content type
/// in the `video/` family or naming a known video container.
pub fn is_supported_video(name: &str, content_type: &str) -> bool {
    let content_type = content_type.trim().to_ascii_lowercase();
    if content_type.starts_with("video/") {
        return true;
    }
    if VIDEO_MIME_MARKERS.iter().any(|m| content_type.contains(m)) {
        return true;
    }

    let name = name.to_ascii_lowercase();
    SUPPORTED_VIDEO_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// MIME type for a path based on its extension alone
pub fn mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
