//! Error types of the audit orchestration layer
//!
//! Only configuration problems and unusable URLs fail a whole run. Everything
//! that goes wrong on one device is folded into that device's report.

use accessaudit_policy_center::PolicyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(#[from] PolicyError),
}

impl AuditError {
    pub(crate) fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures of the capture backend for one device.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("page unreachable: {0}")]
    Unreachable(String),

    #[error("no recorded capture for device {device} at {path}")]
    MissingFixture { device: String, path: String },

    #[error("malformed capture data: {0}")]
    Malformed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
