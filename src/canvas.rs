//! Working-canvas negotiation
//!
//! The editor has one working resolution shared by everything placed on the
//! timeline. The first video ever ingested defines it; later videos only move
//! it when their dimensions drift past the policy threshold on either axis.
//!
//! State is injected rather than global: callers share one
//! [`SharedCanvas`] between the ingestor and the timeline. Concurrent
//! ingestions each read the size current at the moment they adapt, so the
//! last eligible adaptation wins.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::CanvasPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

pub type SharedCanvas = Arc<Mutex<CanvasNegotiator>>;

/// Fit `width`x`height` inside the policy bounds, preserving aspect ratio.
///
/// Sizes already within bounds come back unchanged. Otherwise the limiting
/// axis lands exactly on its bound and the other axis is rounded.
pub fn compute_optimal_size(policy: &CanvasPolicy, width: u32, height: u32) -> CanvasSize {
    if width <= policy.max_width && height <= policy.max_height {
        return CanvasSize { width, height };
    }

    let ratio = width as f64 / height as f64;
    let width_scale = policy.max_width as f64 / width as f64;
    let height_scale = policy.max_height as f64 / height as f64;

    if width_scale <= height_scale {
        CanvasSize {
            width: policy.max_width,
            height: (policy.max_width as f64 / ratio).round().max(1.0) as u32,
        }
    } else {
        CanvasSize {
            width: (policy.max_height as f64 * ratio).round().max(1.0) as u32,
            height: policy.max_height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CanvasNegotiator {
    size: CanvasSize,
    timeline_items: usize,
    policy: CanvasPolicy,
}

impl CanvasNegotiator {
    pub fn new(policy: CanvasPolicy) -> Self {
        Self {
            size: policy.initial,
            timeline_items: 0,
            policy,
        }
    }

    pub fn shared(policy: CanvasPolicy) -> SharedCanvas {
        Arc::new(Mutex::new(Self::new(policy)))
    }

    pub fn size(&self) -> CanvasSize {
        self.size
    }

    pub fn timeline_items(&self) -> usize {
        self.timeline_items
    }

    pub fn policy(&self) -> &CanvasPolicy {
        &self.policy
    }

    /// Count one more item placed on the timeline.
    pub fn record_placement(&mut self) {
        self.timeline_items += 1;
    }

    pub fn should_adapt(&self, width: u32, height: u32) -> bool {
        let threshold = self.policy.adapt_threshold as i64;
        self.timeline_items == 0
            || (self.size.width as i64 - width as i64).abs() > threshold
            || (self.size.height as i64 - height as i64).abs() > threshold
    }

    pub fn compute_optimal_size(&self, width: u32, height: u32) -> CanvasSize {
        compute_optimal_size(&self.policy, width, height)
    }

    /// Resize the canvas for a newly ingested video if warranted.
    ///
    /// Returns the new size when the canvas was replaced.
    pub fn adapt(&mut self, width: u32, height: u32) -> Option<CanvasSize> {
        if !self.should_adapt(width, height) {
            debug!("Canvas {} kept for {}x{} video", self.size, width, height);
            return None;
        }

        let optimal = self.compute_optimal_size(width, height);
        info!(
            "Adapting canvas {} -> {} for {}x{} video ({})",
            self.size,
            optimal,
            width,
            height,
            if self.timeline_items == 0 { "first video" } else { "dimension change" }
        );
        self.update(optimal);
        Some(optimal)
    }

    /// Replace the working canvas size.
    pub fn update(&mut self, size: CanvasSize) {
        self.size = size;
    }
}

impl Default for CanvasNegotiator {
    fn default() -> Self {
        Self::new(CanvasPolicy::default())
    }
}
