///! Visual Perceiver main implementation
use crate::{
    adapter::normalize_detections,
    dedup::{deduplicate, DedupOutcome},
    errors::VisualError,
    models::*,
};
use accessaudit_policy_center::DedupPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Port to the visual detection model
#[async_trait]
pub trait Detector: Send + Sync {
    /// Run the model on one screenshot
    async fn detect(&self, screenshot: &Screenshot) -> Result<Vec<RawDetection>, VisualError>;
}

/// Everything the visual side produced for one screenshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualPass {
    pub detections: Vec<Detection>,
    pub anomalies: Vec<DetectionAnomaly>,
    pub raw_count: usize,
    pub below_floor: usize,
    pub suppressed: usize,
}

/// Visual perceiver trait
#[async_trait]
pub trait VisualPerceiver: Send + Sync {
    /// Detect, normalize and deduplicate
    async fn perceive(
        &self,
        screenshot: &Screenshot,
        policy: &DedupPolicy,
    ) -> Result<VisualPass, VisualError>;
}

/// Visual perceiver implementation
pub struct VisualPerceiverImpl {
    detector: Arc<dyn Detector>,
}

impl VisualPerceiverImpl {
    /// Create new visual perceiver
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self { detector }
    }

    /// Normalize and deduplicate output that was already obtained from a detector
    pub fn process(screenshot: &Screenshot, raw: &[RawDetection], policy: &DedupPolicy) -> VisualPass {
        let batch = normalize_detections(&screenshot.device, screenshot.frame(), raw);
        let DedupOutcome {
            kept,
            below_floor,
            suppressed,
        } = deduplicate(batch.detections, policy);

        VisualPass {
            detections: kept,
            anomalies: batch.anomalies,
            raw_count: raw.len(),
            below_floor,
            suppressed,
        }
    }
}

#[async_trait]
impl VisualPerceiver for VisualPerceiverImpl {
    async fn perceive(
        &self,
        screenshot: &Screenshot,
        policy: &DedupPolicy,
    ) -> Result<VisualPass, VisualError> {
        let raw = self.detector.detect(screenshot).await?;
        let pass = Self::process(screenshot, &raw, policy);
        debug!(
            device = %screenshot.device,
            raw = pass.raw_count,
            kept = pass.detections.len(),
            anomalies = pass.anomalies.len(),
            "visual pass complete"
        );
        Ok(pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accessaudit_core_types::Frame;

    struct FixedDetector(Vec<RawDetection>);

    #[async_trait]
    impl Detector for FixedDetector {
        async fn detect(&self, _: &Screenshot) -> Result<Vec<RawDetection>, VisualError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenDetector;

    #[async_trait]
    impl Detector for BrokenDetector {
        async fn detect(&self, _: &Screenshot) -> Result<Vec<RawDetection>, VisualError> {
            Err(VisualError::DetectorFailed("model not loaded".into()))
        }
    }

    fn policy() -> DedupPolicy {
        DedupPolicy {
            iou_threshold: 0.5,
            confidence_floor: 0.25,
        }
    }

    #[tokio::test]
    async fn perceive_runs_the_whole_visual_side() {
        let detector = FixedDetector(vec![
            RawDetection::new([100.0, 100.0, 200.0, 150.0], 0, 0.9),
            RawDetection::new([105.0, 102.0, 203.0, 150.0], 0, 0.6),
            RawDetection::new([0.0, 0.0, 10.0, 10.0], 7, 0.99),
            RawDetection::new([300.0, 300.0, 320.0, 320.0], 4, 0.1),
        ]);
        let perceiver = VisualPerceiverImpl::new(Arc::new(detector));
        let screenshot = Screenshot::new("desktop", Frame::new(1280, 800), Vec::new());

        let pass = perceiver.perceive(&screenshot, &policy()).await.unwrap();
        assert_eq!(pass.raw_count, 4);
        assert_eq!(pass.detections.len(), 1);
        assert_eq!(pass.detections[0].confidence.value(), 0.9);
        assert_eq!(pass.anomalies.len(), 1);
        assert_eq!(pass.below_floor, 1);
        assert_eq!(pass.suppressed, 1);
    }

    #[tokio::test]
    async fn detector_errors_propagate() {
        let perceiver = VisualPerceiverImpl::new(Arc::new(BrokenDetector));
        let screenshot = Screenshot::new("mobile", Frame::new(1170, 2532), Vec::new());
        let err = perceiver.perceive(&screenshot, &policy()).await.unwrap_err();
        assert!(err.to_string().contains("model not loaded"));
    }
}
