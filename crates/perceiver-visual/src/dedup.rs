///! Same-class non-maximum suppression
use accessaudit_policy_center::DedupPolicy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::Detection;

/// Survivors of suppression plus what was thrown away
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupOutcome {
    /// Kept detections, highest confidence first
    pub kept: Vec<Detection>,
    pub below_floor: usize,
    pub suppressed: usize,
}

/// Greedy NMS per class.
///
/// Candidates under the confidence floor are dropped first. The rest are
/// visited by confidence, then by area, then by input position; each kept box
/// suppresses every later same-class box whose IoU reaches the threshold.
pub fn deduplicate(detections: Vec<Detection>, policy: &DedupPolicy) -> DedupOutcome {
    let total = detections.len();
    let mut candidates: Vec<(usize, Detection)> = detections
        .into_iter()
        .enumerate()
        .filter(|(_, d)| d.confidence.value() >= policy.confidence_floor)
        .collect();
    let below_floor = total - candidates.len();

    candidates.sort_by(|(ia, a), (ib, b)| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.bbox.area().total_cmp(&a.bbox.area()))
            .then_with(|| ia.cmp(ib))
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    let mut suppressed = 0usize;
    for (_, candidate) in candidates {
        let duplicate = kept.iter().any(|k| {
            k.class == candidate.class && k.bbox.iou(&candidate.bbox) >= policy.iou_threshold
        });
        if duplicate {
            suppressed += 1;
        } else {
            kept.push(candidate);
        }
    }

    debug!(
        kept = kept.len(),
        below_floor, suppressed, "deduplicated detections"
    );

    DedupOutcome {
        kept,
        below_floor,
        suppressed,
    }
}
