use thiserror::Error;

use crate::descriptor::FileFailure;
use crate::probe::ProbeError;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{file}: unsupported video format")]
    UnsupportedFormat { file: String },

    #[error("{file}: failed to read video metadata: {source}")]
    Decode { file: String, source: ProbeError },

    #[error("{file}: failed to generate thumbnail: {source}")]
    Thumbnail { file: String, source: ProbeError },

    #[error("No video files found in selection")]
    EmptyBatch,

    #[error("Failed to process videos:\n{}", list_failures(.0))]
    AllFailed(Vec<FileFailure>),
}

impl IngestError {
    /// The file a per-file error refers to
    pub fn file_name(&self) -> Option<&str> {
        match self {
            IngestError::UnsupportedFormat { file }
            | IngestError::Decode { file, .. }
            | IngestError::Thumbnail { file, .. } => Some(file),
            IngestError::EmptyBatch | IngestError::AllFailed(_) => None,
        }
    }

    /// Failure cause without the file name prefix
    pub fn reason(&self) -> String {
        match self {
            IngestError::UnsupportedFormat { .. } => "unsupported video format".to_string(),
            IngestError::Decode { source, .. } => format!("failed to read video metadata: {}", source),
            IngestError::Thumbnail { source, .. } => format!("failed to generate thumbnail: {}", source),
            other => other.to_string(),
        }
    }

    pub fn to_failure(&self, file_name: &str) -> FileFailure {
        FileFailure {
            file_name: file_name.to_string(),
            reason: self.reason(),
        }
    }
}

fn list_failures(failures: &[FileFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.file_name, f.reason))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_file_messages_name_the_file() {
        let err = IngestError::Decode {
            file: "broken.mp4".to_string(),
            source: ProbeError::NoVideoStream,
        };
        assert_eq!(err.to_string(), "broken.mp4: failed to read video metadata: no video stream found");
        assert_eq!(err.file_name(), Some("broken.mp4"));
        assert_eq!(err.reason(), "failed to read video metadata: no video stream found");
    }

    #[test]
    fn test_all_failed_lists_one_per_line() {
        let err = IngestError::AllFailed(vec![
            FileFailure { file_name: "a.mp4".to_string(), reason: "bad".to_string() },
            FileFailure { file_name: "b.mov".to_string(), reason: "worse".to_string() },
        ]);
        assert_eq!(err.to_string(), "Failed to process videos:\na.mp4: bad\nb.mov: worse");
        assert_eq!(err.file_name(), None);
    }
}
