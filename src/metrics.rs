//! Metrics and observability for media_intake

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use serde::{Deserialize, Serialize};

/// Global metrics collector
#[derive(Default)]
pub struct Metrics {
    pub total_requests: AtomicU64,
    pub successful_requests: AtomicU64,
    pub failed_requests: AtomicU64,
    pub total_latency_ms: AtomicU64,

    // Per-operation counters
    pub ingest_count: AtomicU64,
    pub ingest_batch_count: AtomicU64,
    pub classify_count: AtomicU64,
    pub release_count: AtomicU64,

    // Pipeline outcomes
    pub files_ingested: AtomicU64,
    pub files_failed: AtomicU64,
    pub canvas_adaptations: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self, op: &str, success: bool, latency_ms: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);

        // Increment operation-specific counter
        match op {
            "video.ingest" => self.ingest_count.fetch_add(1, Ordering::Relaxed),
            "video.ingest_batch" => self.ingest_batch_count.fetch_add(1, Ordering::Relaxed),
            "video.is_supported" => self.classify_count.fetch_add(1, Ordering::Relaxed),
            "resource.release" | "resource.release_owner" => {
                self.release_count.fetch_add(1, Ordering::Relaxed)
            }
            _ => 0,
        };
    }

    pub fn record_files(&self, ingested: usize, failed: usize) {
        self.files_ingested.fetch_add(ingested as u64, Ordering::Relaxed);
        self.files_failed.fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub fn record_canvas_adaptation(&self) {
        self.canvas_adaptations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            error_rate: if total > 0 { failed as f64 / total as f64 } else { 0.0 },
            avg_latency_ms: if total > 0 { total_latency / total } else { 0 },
            operations: OperationMetrics {
                ingest: self.ingest_count.load(Ordering::Relaxed),
                ingest_batch: self.ingest_batch_count.load(Ordering::Relaxed),
                is_supported: self.classify_count.load(Ordering::Relaxed),
                release: self.release_count.load(Ordering::Relaxed),
            },
            pipeline: PipelineMetrics {
                files_ingested: self.files_ingested.load(Ordering::Relaxed),
                files_failed: self.files_failed.load(Ordering::Relaxed),
                canvas_adaptations: self.canvas_adaptations.load(Ordering::Relaxed),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub error_rate: f64,
    pub avg_latency_ms: u64,
    pub operations: OperationMetrics,
    pub pipeline: PipelineMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetrics {
    pub ingest: u64,
    pub ingest_batch: u64,
    pub is_supported: u64,
    pub release: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub files_ingested: u64,
    pub files_failed: u64,
    pub canvas_adaptations: u64,
}

/// Timer for tracking operation latency
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_rates() {
        let metrics = Metrics::new();
        metrics.record_request("video.ingest", true, 30);
        metrics.record_request("video.ingest_batch", false, 10);
        metrics.record_request("resource.release_owner", true, 2);
        metrics.record_files(3, 1);
        metrics.record_canvas_adaptation();

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.failed_requests, 1);
        assert_eq!(snap.avg_latency_ms, 14);
        assert!((snap.error_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(snap.operations.ingest, 1);
        assert_eq!(snap.operations.release, 1);
        assert_eq!(snap.pipeline.files_ingested, 3);
        assert_eq!(snap.pipeline.canvas_adaptations, 1);
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = Metrics::default().snapshot();
        assert_eq!(snap.error_rate, 0.0);
        assert_eq!(snap.avg_latency_ms, 0);
    }
}
