//! DOM side of the fusion engine.
//!
//! The tree walker hands over raw element records; this crate resolves their
//! roles and accessible names, moves them into screenshot pixels and drops the
//! ones that cannot be placed on the capture.

pub mod adapter;
pub mod errors;
pub mod model;
pub mod ports;
pub mod roles;
pub mod structural;

pub use adapter::normalize_elements;
pub use errors::PerceiverError;
pub use model::{
    Element, ElementAnomaly, ElementAnomalyKind, ElementAttributes, ElementBatch, RawElement,
    RenderedPage, Viewport,
};
pub use ports::{DomExtractor, SnapshotExtractor};
pub use roles::RoleKind;
pub use structural::{StructuralPerceiver, StructuralPerceiverImpl};
