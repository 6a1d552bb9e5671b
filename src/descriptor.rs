//! Editor-facing records produced by ingestion

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aspect::AspectRatioValidation;
use crate::extract::VideoMetadata;
use crate::media::MediaFile;
use crate::resource::ResourceHandle;

/// Everything learned about one file before it is shaped into a descriptor
#[derive(Debug, Clone)]
pub struct ProcessedVideo {
    pub source: ResourceHandle,
    pub thumbnail: ResourceHandle,
    pub metadata: VideoMetadata,
    pub aspect_ratio_validation: AspectRatioValidation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: f64,
    pub to: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetails {
    /// Playback source
    pub src: ResourceHandle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorMetadata {
    pub file_name: String,
    pub file_size: u64,
    pub aspect_ratio: f64,
    pub is_local: bool,
    pub preview: ResourceHandle,
    pub original_width: u32,
    pub original_height: u32,
}

/// One ingested video, as handed to the editor.
///
/// Owns its two resource handles; release them with
/// [`ResourceRegistry::release_owner`](crate::resource::ResourceRegistry::release_owner)
/// using [`VideoDescriptor::id`] once the descriptor is discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub preview: ResourceHandle,
    pub duration_ms: f64,
    pub width: u32,
    pub height: u32,
    pub trim: TimeWindow,
    pub display: TimeWindow,
    pub details: VideoDetails,
    pub metadata: DescriptorMetadata,
}

impl VideoDescriptor {
    pub fn from_processed(file: &MediaFile, processed: ProcessedVideo) -> Self {
        let ProcessedVideo { source, thumbnail, metadata, .. } = processed;
        let full = TimeWindow { from: 0.0, to: metadata.duration_ms };

        Self {
            id: Uuid::new_v4().simple().to_string(),
            kind: "video".to_string(),
            name: file.name.clone(),
            preview: thumbnail.clone(),
            duration_ms: metadata.duration_ms,
            width: metadata.width,
            height: metadata.height,
            trim: full,
            display: full,
            details: VideoDetails { src: source },
            metadata: DescriptorMetadata {
                file_name: file.name.clone(),
                file_size: file.size,
                aspect_ratio: metadata.aspect_ratio(),
                is_local: true,
                preview: thumbnail,
                original_width: metadata.width,
                original_height: metadata.height,
            },
        }
    }

    /// Both handles backing this descriptor
    pub fn handles(&self) -> [ResourceHandle; 2] {
        [self.details.src.clone(), self.preview.clone()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedVideo {
    pub video: VideoDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub file_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub videos: Vec<IngestedVideo>,
    pub failures: Vec<FileFailure>,
}

#[cfg(test)]
pub(crate) fn test_descriptor(name: &str) -> VideoDescriptor {
    let file = MediaFile::new(format!("/media/{}", name), name, 2048, "video/mp4");
    VideoDescriptor::from_processed(
        &file,
        ProcessedVideo {
            source: ResourceHandle::from("blob:src"),
            thumbnail: ResourceHandle::from("blob:thumb"),
            metadata: VideoMetadata { duration_ms: 4000.0, width: 1920, height: 1080 },
            aspect_ratio_validation: AspectRatioValidation { is_valid: true, warning: None },
        },
    )
}
