///! Error types for visual perceiver operations
use std::fmt;

#[derive(Debug)]
pub enum VisualError {
    /// Detector invocation failed
    DetectorFailed(String),

    /// Detector returned something that is not a detection list
    MalformedOutput(String),

    /// Image processing error
    ImageProcessing(String),

    /// Invalid input parameters
    InvalidInput(String),

    /// IO error
    Io(std::io::Error),
}

impl fmt::Display for VisualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DetectorFailed(msg) => write!(f, "Detector invocation failed: {}", msg),
            Self::MalformedOutput(msg) => write!(f, "Malformed detector output: {}", msg),
            Self::ImageProcessing(msg) => write!(f, "Image processing error: {}", msg),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for VisualError {}

impl From<std::io::Error> for VisualError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for VisualError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing(err.to_string())
    }
}

impl From<serde_json::Error> for VisualError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedOutput(err.to_string())
    }
}
