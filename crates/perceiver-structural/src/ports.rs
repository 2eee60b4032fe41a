use async_trait::async_trait;
use serde_json::Value;

use crate::errors::PerceiverError;
use crate::model::{RawElement, RenderedPage, Viewport};

/// Port to the accessibility-tree walker.
#[async_trait]
pub trait DomExtractor: Send + Sync {
    async fn extract(
        &self,
        page: &RenderedPage,
        viewport: Viewport,
    ) -> Result<Vec<RawElement>, PerceiverError>;
}

/// Reads element records the capture backend already stored on the page.
#[derive(Clone, Debug, Default)]
pub struct SnapshotExtractor;

#[async_trait]
impl DomExtractor for SnapshotExtractor {
    async fn extract(
        &self,
        page: &RenderedPage,
        viewport: Viewport,
    ) -> Result<Vec<RawElement>, PerceiverError> {
        if page.device != viewport.device {
            return Err(PerceiverError::PageUnavailable(viewport.device));
        }
        match &page.snapshot {
            Value::Null => Ok(Vec::new()),
            Value::Array(_) => Ok(serde_json::from_value(page.snapshot.clone())?),
            other => Err(PerceiverError::Malformed(format!(
                "expected an element array, got {}",
                kind_of(other)
            ))),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
