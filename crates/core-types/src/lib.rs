//! Shared primitives for the AccessAudit fusion engine.
//!
//! Everything here is a plain value type: identifiers, pixel geometry, the
//! closed detection taxonomy and device profiles. The perceiver crates and the
//! session store all speak in these types.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

pub mod confidence;
pub mod device;
pub mod geometry;
pub mod taxonomy;

pub use confidence::Confidence;
pub use device::{Device, Frame};
pub use geometry::BoundingBox;
pub use taxonomy::DetectionClass;

/// Validation failures for core value types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
    #[error("class index {0} outside the detection taxonomy")]
    ClassIndexOutOfRange(i64),
    #[error("invalid bounding box: {0}")]
    InvalidBox(String),
}

/// Opaque identifier of one user browsing context.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a single `run_audit` invocation.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AuditId(pub String);

impl AuditId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for AuditId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
        assert_eq!(SessionId::from("tab-1").to_string(), "tab-1");
    }
}
