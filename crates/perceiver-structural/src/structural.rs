use std::sync::Arc;

use accessaudit_core_types::Frame;
use async_trait::async_trait;
use tracing::debug;

use crate::adapter::normalize_elements;
use crate::errors::PerceiverError;
use crate::model::{ElementBatch, RenderedPage, Viewport};
use crate::ports::DomExtractor;

#[async_trait]
pub trait StructuralPerceiver: Send + Sync {
    /// Extract and normalize the elements of one rendered page.
    async fn perceive(
        &self,
        page: &RenderedPage,
        viewport: &Viewport,
        frame: Frame,
    ) -> Result<ElementBatch, PerceiverError>;
}

pub struct StructuralPerceiverImpl<P>
where
    P: DomExtractor + ?Sized,
{
    extractor: Arc<P>,
}

impl<P> StructuralPerceiverImpl<P>
where
    P: DomExtractor + ?Sized,
{
    pub fn new(extractor: Arc<P>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl<P> StructuralPerceiver for StructuralPerceiverImpl<P>
where
    P: DomExtractor + ?Sized,
{
    async fn perceive(
        &self,
        page: &RenderedPage,
        viewport: &Viewport,
        frame: Frame,
    ) -> Result<ElementBatch, PerceiverError> {
        let raw = self.extractor.extract(page, viewport.clone()).await?;
        let batch = normalize_elements(viewport, frame, &raw);
        debug!(
            device = %viewport.device,
            raw = raw.len(),
            kept = batch.elements.len(),
            anomalies = batch.anomalies.len(),
            "structural pass complete"
        );
        Ok(batch)
    }
}
