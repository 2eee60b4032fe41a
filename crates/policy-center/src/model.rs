use std::collections::{HashMap, HashSet};

use accessaudit_core_types::{DetectionClass, Device};
use serde::{Deserialize, Serialize};

use crate::errors::PolicyError;

/// Complete, immutable configuration snapshot shared by every device pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditPolicy {
    pub rev: u64,
    pub dedup: DedupPolicy,
    pub matcher: MatcherPolicy,
    pub classifier: ClassifierPolicy,
    pub devices: Vec<Device>,
    pub timeouts_ms: TimeoutPolicy,
    pub spotlight: SpotlightPolicy,
    pub session: SessionPolicy,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub provenance: HashMap<String, PolicyProvenance>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DedupPolicy {
    /// Same-class detections at or above this IoU are duplicates.
    pub iou_threshold: f64,
    /// Detections below this confidence are discarded before suppression.
    pub confidence_floor: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatcherPolicy {
    /// A pair must score strictly above this to be matched.
    pub match_threshold: f64,
    pub spatial_weight: f64,
    pub semantic_weight: f64,
    /// Discount applied to containment when it beats IoU as the spatial term.
    pub containment_weight: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassifierPolicy {
    /// Interactive detections above this IoU overlap each other.
    pub overlap_iou: f64,
    /// Minimum gap between interactive targets, CSS pixels. 0 disables the check.
    pub min_spacing_css: f64,
    /// Confidence attached to findings that only the DOM supports.
    pub dom_only_confidence: f64,
    /// Classes that raise a ghost finding when no DOM node matches.
    pub ghost_classes: Vec<DetectionClass>,
    /// Targets nested at least this deeply in one another are one control,
    /// not an overlap or a spacing problem.
    pub nested_containment: f64,
    /// Clickable area larger than the drawn one by this factor is a mismatch.
    pub size_mismatch_ratio: f64,
    /// Only drawn targets below this area (CSS px²) can mismatch.
    pub size_mismatch_max_area_css: f64,
    pub max_target_width_css: f64,
    pub max_target_height_css: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    /// Budget for one device pipeline, capture through ranking.
    pub device: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpotlightPolicy {
    pub padding_px: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionPolicy {
    /// Sessions idle longer than this are eligible for eviction.
    pub idle_ttl_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyProvenance {
    pub path: String,
    pub source: PolicySource,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PolicySource {
    Builtin,
    File,
    Env,
}

impl AuditPolicy {
    pub fn set_provenance(&mut self, path: &str, source: PolicySource) {
        self.provenance.insert(
            path.to_string(),
            PolicyProvenance {
                path: path.to_string(),
                source,
            },
        );
    }

    pub fn source_of(&self, path: &str) -> Option<PolicySource> {
        self.provenance.get(path).map(|p| p.source)
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }

    /// Rejects snapshots the engine cannot run with.
    pub fn validate(&self) -> Result<(), PolicyError> {
        unit_interval("dedup.iou_threshold", self.dedup.iou_threshold)?;
        unit_interval("dedup.confidence_floor", self.dedup.confidence_floor)?;
        unit_interval("matcher.match_threshold", self.matcher.match_threshold)?;
        unit_interval("matcher.spatial_weight", self.matcher.spatial_weight)?;
        unit_interval("matcher.semantic_weight", self.matcher.semantic_weight)?;
        unit_interval("matcher.containment_weight", self.matcher.containment_weight)?;
        unit_interval("classifier.overlap_iou", self.classifier.overlap_iou)?;
        unit_interval(
            "classifier.dom_only_confidence",
            self.classifier.dom_only_confidence,
        )?;

        if self.dedup.iou_threshold == 0.0 {
            return Err(PolicyError::Invalid(
                "dedup.iou_threshold must be greater than 0".into(),
            ));
        }
        let weight_sum = self.matcher.spatial_weight + self.matcher.semantic_weight;
        if weight_sum <= 0.0 || weight_sum > 1.0 + f64::EPSILON {
            return Err(PolicyError::Invalid(format!(
                "matcher weights must sum to (0, 1], got {weight_sum}"
            )));
        }
        if !self.classifier.min_spacing_css.is_finite() || self.classifier.min_spacing_css < 0.0 {
            return Err(PolicyError::Invalid(
                "classifier.min_spacing_css must be a non-negative number".into(),
            ));
        }
        unit_interval(
            "classifier.nested_containment",
            self.classifier.nested_containment,
        )?;
        if !self.classifier.size_mismatch_ratio.is_finite() || self.classifier.size_mismatch_ratio < 1.0 {
            return Err(PolicyError::Invalid(
                "classifier.size_mismatch_ratio must be at least 1".into(),
            ));
        }
        for (path, value) in [
            (
                "classifier.size_mismatch_max_area_css",
                self.classifier.size_mismatch_max_area_css,
            ),
            ("classifier.max_target_width_css", self.classifier.max_target_width_css),
            ("classifier.max_target_height_css", self.classifier.max_target_height_css),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PolicyError::Invalid(format!("{path} must be positive")));
            }
        }
        if !self.spotlight.padding_px.is_finite() || self.spotlight.padding_px < 0.0 {
            return Err(PolicyError::Invalid(
                "spotlight.padding_px must be a non-negative number".into(),
            ));
        }
        if self.timeouts_ms.device == 0 {
            return Err(PolicyError::Invalid(
                "timeouts_ms.device must be positive".into(),
            ));
        }

        if self.devices.is_empty() {
            return Err(PolicyError::Invalid("no devices configured".into()));
        }
        let mut names = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(PolicyError::Invalid("device with empty name".into()));
            }
            if !names.insert(device.name.as_str()) {
                return Err(PolicyError::Invalid(format!(
                    "duplicate device '{}'",
                    device.name
                )));
            }
            if device.viewport_width == 0 || device.viewport_height == 0 {
                return Err(PolicyError::Invalid(format!(
                    "device '{}' has an empty viewport",
                    device.name
                )));
            }
            if !(device.pixel_ratio.is_finite() && device.pixel_ratio > 0.0) {
                return Err(PolicyError::Invalid(format!(
                    "device '{}' pixel_ratio must be positive",
                    device.name
                )));
            }
            if !(device.min_target_css.is_finite() && device.min_target_css >= 0.0) {
                return Err(PolicyError::Invalid(format!(
                    "device '{}' min_target_css must be non-negative",
                    device.name
                )));
            }
        }
        Ok(())
    }
}

fn unit_interval(path: &str, value: f64) -> Result<(), PolicyError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PolicyError::Invalid(format!(
            "{path} must lie in [0, 1], got {value}"
        )))
    }
}
