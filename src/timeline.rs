//! Hand-off of ingested videos to the editor timeline
//!
//! Placement is one-way: the pipeline passes a finished descriptor along with
//! where and how to place it, and never reads placement results back.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::canvas::SharedCanvas;
use crate::descriptor::VideoDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMode {
    Fit,
    Fill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementOptions {
    pub target_track: String,
    pub scale_mode: ScaleMode,
}

impl Default for PlacementOptions {
    fn default() -> Self {
        Self {
            target_track: "main".to_string(),
            scale_mode: ScaleMode::Fit,
        }
    }
}

pub trait Timeline: Send + Sync {
    fn add_video(&self, video: VideoDescriptor, options: &PlacementOptions);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    pub video: VideoDescriptor,
    pub options: PlacementOptions,
}

/// In-process timeline that records placements and keeps the canvas
/// negotiator's item count in step.
pub struct EditorTimeline {
    canvas: SharedCanvas,
    placements: Mutex<Vec<Placement>>,
}

impl EditorTimeline {
    pub fn new(canvas: SharedCanvas) -> Self {
        Self {
            canvas,
            placements: Mutex::new(Vec::new()),
        }
    }

    pub fn placements(&self) -> Vec<Placement> {
        self.placements.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.placements.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Timeline for EditorTimeline {
    fn add_video(&self, video: VideoDescriptor, options: &PlacementOptions) {
        debug!(
            "Placing {} ({}) on track {} [{:?}]",
            video.name, video.id, options.target_track, options.scale_mode
        );
        self.placements.lock().push(Placement {
            video,
            options: options.clone(),
        });
        self.canvas.lock().record_placement();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CanvasNegotiator;
    use crate::config::CanvasPolicy;
    use crate::descriptor::test_descriptor;

    #[test]
    fn test_placement_counts_toward_canvas() {
        let canvas = CanvasNegotiator::shared(CanvasPolicy::default());
        let timeline = EditorTimeline::new(canvas.clone());
        assert!(timeline.is_empty());

        timeline.add_video(test_descriptor("a.mp4"), &PlacementOptions::default());
        timeline.add_video(
            test_descriptor("b.mp4"),
            &PlacementOptions { target_track: "overlay".to_string(), scale_mode: ScaleMode::Fill },
        );

        assert_eq!(timeline.len(), 2);
        assert_eq!(canvas.lock().timeline_items(), 2);

        let placements = timeline.placements();
        assert_eq!(placements[0].options.target_track, "main");
        assert_eq!(placements[1].video.name, "b.mp4");
        assert_eq!(placements[1].options.scale_mode, ScaleMode::Fill);
    }

    #[test]
    fn test_scale_mode_serde() {
        let json = serde_json::to_string(&PlacementOptions::default()).unwrap();
        assert_eq!(json, r#"{"target_track":"main","scale_mode":"fit"}"#);
    }
}
