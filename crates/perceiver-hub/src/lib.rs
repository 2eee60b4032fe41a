///! Fusion Hub - detections meet the DOM
///!
///! This crate joins what the visual detector sees with what the accessibility
///! tree declares, one device at a time:
///!
///! - **Matcher**: greedy one-to-one association scored on geometry and role
///! - **Classifier**: accessibility heuristics over the matched pairs
///! - **Ranking**: deterministic ordering of findings by confidence
///!
///! The resulting [`DeviceReport`]s are grouped into an [`AuditRecord`] per
///! audited URL.

pub mod classifier;
pub mod compat;
pub mod errors;
pub mod hub;
pub mod matcher;
pub mod models;
pub mod ranking;

#[cfg(test)]
mod test_support;

// Re-exports
pub use classifier::classify;
pub use compat::{compatibility, is_compatible, Compatibility};
pub use errors::{HubError, Result};
pub use hub::{PerceptionHub, PerceptionHubImpl};
pub use matcher::{match_device, match_score};
pub use models::*;
pub use ranking::rank;

// Re-export perceiver types for convenience
pub use perceiver_structural::{StructuralPerceiver, StructuralPerceiverImpl};
pub use perceiver_visual::{VisualPerceiver, VisualPerceiverImpl};
