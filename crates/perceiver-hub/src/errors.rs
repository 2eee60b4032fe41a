///! Error types for the fusion hub

use thiserror::Error;

use crate::models::FailureKind;

/// Errors that can occur while fusing one device
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Structural perceiver error: {0}")]
    Structural(String),

    #[error("Visual perceiver error: {0}")]
    Visual(String),

    #[error("Multi-modal fusion error: {0}")]
    Fusion(String),

    /// The deadline passed while `stage` was still running
    #[error("{stage} stage timed out")]
    TimedOut { stage: FailureKind },
}

impl HubError {
    /// How the device is reported when this error ends its pipeline
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            HubError::Structural(_) => FailureKind::DomExtraction,
            HubError::Visual(_) => FailureKind::Detector,
            HubError::Fusion(_) => FailureKind::Aborted,
            HubError::TimedOut { stage } => *stage,
        }
    }
}

/// Result type for hub operations
pub type Result<T> = std::result::Result<T, HubError>;

impl From<perceiver_structural::PerceiverError> for HubError {
    fn from(err: perceiver_structural::PerceiverError) -> Self {
        HubError::Structural(err.to_string())
    }
}

impl From<perceiver_visual::VisualError> for HubError {
    fn from(err: perceiver_visual::VisualError) -> Self {
        HubError::Visual(err.to_string())
    }
}
