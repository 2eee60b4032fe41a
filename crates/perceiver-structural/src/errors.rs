use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerceiverError {
    #[error("dom extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("malformed element snapshot: {0}")]
    Malformed(String),
    #[error("page not rendered for device {0}")]
    PageUnavailable(String),
}

impl From<serde_json::Error> for PerceiverError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
