//! Visual Perceiver - detector output handling for AccessAudit
//!
//! This crate turns what the visual detection model sees into canonical
//! detections:
//! - Detector port over device screenshots
//! - Normalization of raw detector rows, with anomalies for malformed rows
//! - Same-class non-maximum suppression
//! - Spotlight regions and crops for individual findings

pub mod adapter;
pub mod dedup;
pub mod errors;
pub mod models;
pub mod spotlight;
pub mod visual;

// Re-exports
pub use adapter::normalize_detections;
pub use dedup::{deduplicate, DedupOutcome};
pub use errors::VisualError;
pub use models::*;
pub use spotlight::{crop_spotlight, spotlight_region, SpotlightRegion};
pub use visual::{Detector, VisualPass, VisualPerceiver, VisualPerceiverImpl};
