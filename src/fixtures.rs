//! Directory-backed capture, detector and tree walker.
//!
//! A fixture directory holds one `<device>.json` per device profile and,
//! optionally, the matching `<device>.png` screenshot:
//!
//! ```json
//! {
//!   "frame": { "width": 1280, "height": 800 },
//!   "detections": [ { "bbox": [10, 10, 50, 30], "class_index": 0, "confidence": 0.9 } ],
//!   "elements": [ { "tagName": "BUTTON", "innerText": "Send", "x": 10, "y": 10, "width": 40, "height": 20 } ]
//! }
//! ```
//!
//! `unreachable`, `detector_error` and `dom_error` replay recorded failures of
//! the respective stage; `delay_ms` stalls the capture.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use accessaudit_core_types::{Device, Frame};
use async_trait::async_trait;
use dashmap::DashMap;
use perceiver_structural::{
    DomExtractor, PerceiverError, RawElement, RenderedPage, SnapshotExtractor, Viewport,
};
use perceiver_visual::{Detector, RawDetection, Screenshot, VisualError};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::capture::{Capture, DeviceCapture};
use crate::errors::CaptureError;

/// Recorded capture of one device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceFixture {
    /// Screenshot size; the device viewport when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<Frame>,
    #[serde(default)]
    pub detections: Vec<RawDetection>,
    #[serde(default)]
    pub elements: Vec<RawElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unreachable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detector_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_error: Option<String>,
    #[serde(default)]
    pub delay_ms: u64,
}

pub struct FixtureBackend {
    root: PathBuf,
    loaded: DashMap<String, Arc<DeviceFixture>>,
}

impl FixtureBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            loaded: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn fixture_path(&self, device: &str) -> PathBuf {
        self.root.join(format!("{device}.json"))
    }

    /// Parses `<device>.json` once; later calls reuse the parsed fixture.
    pub async fn load(&self, device: &str) -> Result<Arc<DeviceFixture>, CaptureError> {
        if let Some(fixture) = self.loaded.get(device) {
            return Ok(Arc::clone(fixture.value()));
        }

        let path = self.fixture_path(device);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CaptureError::MissingFixture {
                    device: device.to_string(),
                    path: path.display().to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        let fixture: DeviceFixture = serde_json::from_str(&content)
            .map_err(|err| CaptureError::Malformed(format!("{}: {err}", path.display())))?;
        debug!(
            device,
            path = %path.display(),
            detections = fixture.detections.len(),
            elements = fixture.elements.len(),
            "loaded capture fixture"
        );

        let fixture = Arc::new(fixture);
        self.loaded
            .insert(device.to_string(), Arc::clone(&fixture));
        Ok(fixture)
    }

    async fn screenshot_bytes(&self, device: &str) -> Result<Vec<u8>, CaptureError> {
        let path = self.root.join(format!("{device}.png"));
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl DeviceCapture for FixtureBackend {
    async fn capture(&self, url: &Url, device: &Device) -> Result<Capture, CaptureError> {
        let fixture = self.load(&device.name).await?;
        if fixture.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(fixture.delay_ms)).await;
        }
        if let Some(reason) = &fixture.unreachable {
            return Err(CaptureError::Unreachable(reason.clone()));
        }

        let frame = fixture.frame.unwrap_or_else(|| device.frame());
        let data = self.screenshot_bytes(&device.name).await?;
        let snapshot = serde_json::to_value(&fixture.elements)
            .map_err(|err| CaptureError::Malformed(err.to_string()))?;

        Ok(Capture {
            screenshot: Screenshot::new(device.name.clone(), frame, data),
            page: RenderedPage::new(url.as_str(), device.name.clone(), snapshot),
        })
    }
}

#[async_trait]
impl Detector for FixtureBackend {
    async fn detect(&self, screenshot: &Screenshot) -> Result<Vec<RawDetection>, VisualError> {
        let fixture = self
            .load(&screenshot.device)
            .await
            .map_err(|err| VisualError::DetectorFailed(err.to_string()))?;
        match &fixture.detector_error {
            Some(reason) => Err(VisualError::DetectorFailed(reason.clone())),
            None => Ok(fixture.detections.clone()),
        }
    }
}

#[async_trait]
impl DomExtractor for FixtureBackend {
    async fn extract(
        &self,
        page: &RenderedPage,
        viewport: Viewport,
    ) -> Result<Vec<RawElement>, PerceiverError> {
        let fixture = self
            .load(&viewport.device)
            .await
            .map_err(|err| PerceiverError::PageUnavailable(err.to_string()))?;
        if let Some(reason) = &fixture.dom_error {
            return Err(PerceiverError::ExtractionFailed(reason.clone()));
        }
        SnapshotExtractor.extract(page, viewport).await
    }
}
