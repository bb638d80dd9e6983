//! Core telemetry event types describing diagnostics data exposed to
//! CLI/HTTP surfaces.

use serde::{Deserialize, Serialize};

use crate::analysis::QualityClass;

/// Model provider lifecycle stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelPhase {
    LoadStarted,
    Ready,
    Failed,
    Unloaded,
}

/// Diagnostic error codes surfaced via telemetry metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticError {
    ModelLoad,
    Inference,
    IngestOverflow,
    Unknown,
}

/// Metric events covering inference latency, resource occupancy, and lifecycle details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    InferenceLatency {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    TensorOccupancy {
        outstanding: usize,
        retained: usize,
    },
    QueueOccupancy {
        channel: String,
        percent: f32,
    },
    Quality {
        label: QualityClass,
        confidence: f64,
    },
    ModelLifecycle {
        phase: ModelPhase,
        timestamp_ms: u64,
    },
    Error {
        code: DiagnosticError,
        context: String,
    },
}
