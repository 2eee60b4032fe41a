///! Data models for visual perception
use accessaudit_core_types::{BoundingBox, Confidence, DetectionClass, Frame};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Screenshot captured for one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screenshot {
    /// Unique identifier for the screenshot
    pub id: String,

    /// PNG bytes of the viewport; may be empty for replayed captures
    pub data: Vec<u8>,

    /// Image dimensions in device pixels
    pub width: u32,
    pub height: u32,

    /// Capture timestamp
    pub timestamp: SystemTime,

    /// Device profile this screenshot was taken with
    pub device: String,
}

impl Screenshot {
    pub fn new(device: impl Into<String>, frame: Frame, data: Vec<u8>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            data,
            width: frame.width,
            height: frame.height,
            timestamp: SystemTime::now(),
            device: device.into(),
        }
    }

    pub fn frame(&self) -> Frame {
        Frame::new(self.width, self.height)
    }
}

/// One row of detector output, exactly as the model reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    /// `[x1, y1, x2, y2]` in screenshot pixels
    pub bbox: [f64; 4],

    /// Index into the detector's class list
    pub class_index: i64,

    /// Reported confidence, expected in [0, 1]
    pub confidence: f64,
}

impl RawDetection {
    pub fn new(bbox: [f64; 4], class_index: i64, confidence: f64) -> Self {
        Self {
            bbox,
            class_index,
            confidence,
        }
    }
}

/// Canonical detection: validated, clamped to the capture frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub device: String,
    pub bbox: BoundingBox,
    pub class: DetectionClass,
    pub confidence: Confidence,
}

impl Detection {
    pub fn new(
        device: impl Into<String>,
        bbox: BoundingBox,
        class: DetectionClass,
        confidence: Confidence,
    ) -> Self {
        Self {
            device: device.into(),
            bbox,
            class,
            confidence,
        }
    }
}

/// Why a raw detector row was dropped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionAnomalyKind {
    ClassIndexOutOfRange { class_index: i64 },
    ConfidenceOutOfRange { confidence: f64 },
    InvalidBox { reason: String },
    OutsideFrame,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionAnomaly {
    /// Position of the row in the detector output
    pub index: usize,
    #[serde(flatten)]
    pub kind: DetectionAnomalyKind,
}

/// Result of normalizing one detector invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionBatch {
    pub detections: Vec<Detection>,
    pub anomalies: Vec<DetectionAnomaly>,
}
