///! Per-device fusion of visual and structural perception
use crate::{
    classifier::classify,
    errors::*,
    matcher::match_device,
    models::*,
    ranking::rank,
};
use accessaudit_core_types::{Device, Frame};
use accessaudit_policy_center::AuditPolicy;
use async_trait::async_trait;
use perceiver_structural::{ElementBatch, RenderedPage, StructuralPerceiver, Viewport};
use perceiver_visual::{spotlight_region, Screenshot, VisualPass, VisualPerceiver};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

/// Fusion hub trait
#[async_trait]
pub trait PerceptionHub: Send + Sync {
    /// Detect and extract concurrently, then fuse into a device report
    async fn perceive(
        &self,
        device: &Device,
        screenshot: &Screenshot,
        page: &RenderedPage,
    ) -> Result<DeviceReport>;

    /// Like [`PerceptionHub::perceive`], but detection and extraction must
    /// both finish before `deadline`; a late stage fails as [`HubError::TimedOut`]
    async fn perceive_until(
        &self,
        device: &Device,
        screenshot: &Screenshot,
        page: &RenderedPage,
        deadline: Instant,
    ) -> Result<DeviceReport>;

    /// Get structural perceiver
    fn structural(&self) -> Arc<dyn StructuralPerceiver>;

    /// Get visual perceiver
    fn visual(&self) -> Arc<dyn VisualPerceiver>;
}

/// Fusion hub implementation
pub struct PerceptionHubImpl {
    structural_perceiver: Arc<dyn StructuralPerceiver>,
    visual_perceiver: Arc<dyn VisualPerceiver>,
    policy: Arc<AuditPolicy>,
}

impl PerceptionHubImpl {
    /// Create new hub over a policy snapshot
    pub fn new(
        structural: Arc<dyn StructuralPerceiver>,
        visual: Arc<dyn VisualPerceiver>,
        policy: Arc<AuditPolicy>,
    ) -> Self {
        Self {
            structural_perceiver: structural,
            visual_perceiver: visual,
            policy,
        }
    }

    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    /// Match, classify, locate and rank one device's perception.
    pub fn fuse(
        &self,
        device: &Device,
        frame: Frame,
        visual: VisualPass,
        structural: ElementBatch,
    ) -> Result<DeviceReport> {
        let pairs = match_device(&visual.detections, &structural.elements, &self.policy.matcher);
        let mut issues = classify(&pairs, device, &self.policy.classifier);

        let window_height = device.frame().height as f64;
        for issue in &mut issues {
            issue.spotlight = Some(spotlight_region(
                &issue.bbox,
                frame,
                window_height,
                self.policy.spotlight.padding_px,
            ));
        }
        rank(&mut issues);
        Self::check_references(&issues, &pairs)?;

        debug!(
            device = %device.name,
            pairs = pairs.len(),
            issues = issues.len(),
            "fused device perception"
        );

        Ok(DeviceReport {
            device: device.name.clone(),
            status: DeviceStatus::Ok,
            dedup: DedupStats {
                raw: visual.raw_count,
                below_floor: visual.below_floor,
                suppressed: visual.suppressed,
                kept: visual.detections.len(),
            },
            issues: Some(issues),
            pairs,
            detection_anomalies: visual.anomalies,
            element_anomalies: structural.anomalies,
            elapsed_ms: 0,
        })
    }

    /// Every finding must point at pairs of this run.
    fn check_references(issues: &[Issue], pairs: &[MatchedPair]) -> Result<()> {
        for issue in issues {
            if issue.pairs.is_empty() {
                return Err(HubError::Fusion(format!("{} issue without pairs", issue.kind)));
            }
            for id in &issue.pairs {
                let known = pairs.get(id.0).map(|pair| pair.id == *id).unwrap_or(false);
                if !known {
                    return Err(HubError::Fusion(format!(
                        "{} issue references unknown pair {}",
                        issue.kind, id
                    )));
                }
            }
        }
        Ok(())
    }

    async fn perceive_bounded(
        &self,
        device: &Device,
        screenshot: &Screenshot,
        page: &RenderedPage,
        deadline: Option<Instant>,
    ) -> Result<DeviceReport> {
        let viewport = Viewport::from(device);
        let frame = screenshot.frame();

        let visual_fut = bounded(FailureKind::Detector, deadline, async {
            self.visual_perceiver
                .perceive(screenshot, &self.policy.dedup)
                .await
                .map_err(HubError::from)
        });
        let structural_fut = bounded(FailureKind::DomExtraction, deadline, async {
            self.structural_perceiver
                .perceive(page, &viewport, frame)
                .await
                .map_err(HubError::from)
        });

        let (visual, structural) = tokio::try_join!(visual_fut, structural_fut)?;
        self.fuse(device, frame, visual, structural)
    }
}

/// Runs one stage, bounded by the deadline when there is one.
async fn bounded<T>(
    stage: FailureKind,
    deadline: Option<Instant>,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, work)
            .await
            .map_err(|_| HubError::TimedOut { stage })?,
        None => work.await,
    }
}

#[async_trait]
impl PerceptionHub for PerceptionHubImpl {
    async fn perceive(
        &self,
        device: &Device,
        screenshot: &Screenshot,
        page: &RenderedPage,
    ) -> Result<DeviceReport> {
        self.perceive_bounded(device, screenshot, page, None).await
    }

    async fn perceive_until(
        &self,
        device: &Device,
        screenshot: &Screenshot,
        page: &RenderedPage,
        deadline: Instant,
    ) -> Result<DeviceReport> {
        self.perceive_bounded(device, screenshot, page, Some(deadline))
            .await
    }

    fn structural(&self) -> Arc<dyn StructuralPerceiver> {
        self.structural_perceiver.clone()
    }

    fn visual(&self) -> Arc<dyn VisualPerceiver> {
        self.visual_perceiver.clone()
    }
}
