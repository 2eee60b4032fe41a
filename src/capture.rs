//! Capture port: one screenshot and one rendered page per device.

use accessaudit_core_types::Device;
use async_trait::async_trait;
use perceiver_structural::RenderedPage;
use perceiver_visual::Screenshot;
use url::Url;

use crate::errors::CaptureError;

/// Everything one device capture hands to the perceivers.
#[derive(Debug, Clone)]
pub struct Capture {
    pub screenshot: Screenshot,
    pub page: RenderedPage,
}

#[async_trait]
pub trait DeviceCapture: Send + Sync {
    /// Render `url` with the device's viewport and capture it.
    async fn capture(&self, url: &Url, device: &Device) -> Result<Capture, CaptureError>;
}
