use std::collections::HashMap;

use accessaudit_core_types::{DetectionClass, Device};

use crate::model::{
    AuditPolicy, ClassifierPolicy, DedupPolicy, MatcherPolicy, SessionPolicy, SpotlightPolicy,
    TimeoutPolicy,
};

pub fn default_policy() -> AuditPolicy {
    AuditPolicy {
        rev: 1,
        dedup: DedupPolicy {
            iou_threshold: 0.5,
            confidence_floor: 0.25,
        },
        matcher: MatcherPolicy {
            match_threshold: 0.35,
            spatial_weight: 0.7,
            semantic_weight: 0.3,
            containment_weight: 0.8,
        },
        classifier: ClassifierPolicy {
            overlap_iou: 0.3,
            min_spacing_css: 8.0,
            dom_only_confidence: 0.5,
            ghost_classes: DetectionClass::ALL
                .into_iter()
                .filter(|class| class.is_interactive())
                .collect(),
            nested_containment: 0.95,
            size_mismatch_ratio: 1.2,
            size_mismatch_max_area_css: 1_000.0,
            max_target_width_css: 400.0,
            max_target_height_css: 200.0,
        },
        devices: vec![Device::desktop(), Device::ipad(), Device::mobile()],
        timeouts_ms: TimeoutPolicy { device: 30_000 },
        spotlight: SpotlightPolicy { padding_px: 10.0 },
        session: SessionPolicy {
            idle_ttl_secs: 3_600,
        },
        provenance: HashMap::new(),
    }
}
