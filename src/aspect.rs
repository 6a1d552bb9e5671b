//! Aspect-ratio check against 16:9
//!
//! Advisory only: a mismatch attaches a warning to the ingested video and
//! never blocks ingestion.

use serde::{Deserialize, Serialize};

pub const REFERENCE_RATIO: f64 = 16.0 / 9.0;
pub const TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectRatioValidation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Classify `width`x`height` against 16:9. Caller guarantees both are positive.
pub fn validate(width: u32, height: u32) -> AspectRatioValidation {
    let ratio = width as f64 / height as f64;

    if (ratio - REFERENCE_RATIO).abs() <= TOLERANCE {
        return AspectRatioValidation { is_valid: true, warning: None };
    }

    AspectRatioValidation {
        is_valid: false,
        warning: Some(format!(
            "Video aspect ratio is {:.2}:1. Recommended: 16:9 ({:.2}:1) for optimal display.",
            ratio, REFERENCE_RATIO
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widescreen_is_valid() {
        for (w, h) in [(1920, 1080), (1280, 720), (3840, 2160), (854, 480)] {
            let v = validate(w, h);
            assert!(v.is_valid, "{}x{}", w, h);
            assert!(v.warning.is_none());
        }
    }

    #[test]
    fn test_band_edges() {
        // 1.85:1 is within 0.1 of 1.777..
        assert!(validate(1850, 1000).is_valid);
        // 1.90:1 is not
        assert!(!validate(1900, 1000).is_valid);
        // 1.68:1 is within, 1.67:1 is not
        assert!(validate(1680, 1000).is_valid);
        assert!(!validate(1670, 1000).is_valid);
    }

    #[test]
    fn test_portrait_warns_with_ratio() {
        let v = validate(1080, 1920);
        assert!(!v.is_valid);
        let warning = v.warning.unwrap();
        assert!(warning.contains("0.56:1"), "{}", warning);
        assert!(warning.contains("16:9 (1.78:1)"), "{}", warning);
    }

    #[test]
    fn test_four_three_warns() {
        let v = validate(640, 480);
        assert!(!v.is_valid);
        assert_eq!(
            v.warning.as_deref(),
            Some("Video aspect ratio is 1.33:1. Recommended: 16:9 (1.78:1) for optimal display.")
        );
    }
}
