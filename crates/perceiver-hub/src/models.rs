///! Data models for fused findings
use accessaudit_core_types::{AuditId, BoundingBox, Confidence, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use perceiver_structural::{Element, ElementAnomaly};
pub use perceiver_visual::{Detection, DetectionAnomaly, SpotlightRegion};

/// Position of a pair within one device run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairId(pub usize);

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Association of a detection with a DOM element; either side may be absent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub id: PairId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection: Option<Detection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<Element>,
    /// Match score in [0, 1]; 0 for one-sided pairs
    pub score: f64,
}

impl MatchedPair {
    pub fn matched(id: PairId, detection: Detection, element: Element, score: f64) -> Self {
        Self {
            id,
            detection: Some(detection),
            element: Some(element),
            score: score.clamp(0.0, 1.0),
        }
    }

    pub fn visual_only(id: PairId, detection: Detection) -> Self {
        Self {
            id,
            detection: Some(detection),
            element: None,
            score: 0.0,
        }
    }

    pub fn dom_only(id: PairId, element: Element) -> Self {
        Self {
            id,
            detection: None,
            element: Some(element),
            score: 0.0,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.detection.is_some() && self.element.is_some()
    }

    /// Visual box when there is one, else the DOM box
    pub fn bbox(&self) -> Option<BoundingBox> {
        self.detection
            .as_ref()
            .map(|d| d.bbox)
            .or_else(|| self.element.as_ref().map(|e| e.bbox))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Serious,
    Moderate,
    Minor,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Serious => "serious",
            Severity::Moderate => "moderate",
            Severity::Minor => "minor",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finding categories, declared in ranking priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    Ghost,
    MissingLabel,
    RoleMismatch,
    KeyboardUnreachable,
    MissingAltText,
    SmallTarget,
    Overlap,
    InsufficientSpacing,
    ColorOnlyLink,
    /// Clickable area much larger than what is drawn
    TargetSizeMismatch,
    OversizedTarget,
}

impl IssueKind {
    pub const ALL: [IssueKind; 11] = [
        IssueKind::Ghost,
        IssueKind::MissingLabel,
        IssueKind::RoleMismatch,
        IssueKind::KeyboardUnreachable,
        IssueKind::MissingAltText,
        IssueKind::SmallTarget,
        IssueKind::Overlap,
        IssueKind::InsufficientSpacing,
        IssueKind::ColorOnlyLink,
        IssueKind::TargetSizeMismatch,
        IssueKind::OversizedTarget,
    ];

    /// Lower ranks first among equally confident findings
    pub fn priority(self) -> usize {
        self as usize
    }

    pub fn severity(self) -> Severity {
        match self {
            IssueKind::Ghost | IssueKind::KeyboardUnreachable => Severity::Critical,
            IssueKind::MissingLabel | IssueKind::RoleMismatch | IssueKind::MissingAltText => {
                Severity::Serious
            }
            IssueKind::SmallTarget
            | IssueKind::Overlap
            | IssueKind::ColorOnlyLink
            | IssueKind::TargetSizeMismatch => Severity::Moderate,
            IssueKind::InsufficientSpacing | IssueKind::OversizedTarget => Severity::Minor,
        }
    }

    /// WCAG 2.2 success criterion the finding relates to, if any
    pub fn wcag(self) -> Option<&'static str> {
        match self {
            IssueKind::Ghost | IssueKind::MissingLabel | IssueKind::RoleMismatch => Some("4.1.2"),
            IssueKind::KeyboardUnreachable => Some("2.1.1"),
            IssueKind::MissingAltText => Some("1.1.1"),
            IssueKind::SmallTarget
            | IssueKind::Overlap
            | IssueKind::InsufficientSpacing
            | IssueKind::TargetSizeMismatch => Some("2.5.8"),
            IssueKind::ColorOnlyLink => Some("1.4.1"),
            IssueKind::OversizedTarget => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::Ghost => "ghost",
            IssueKind::MissingLabel => "missing-label",
            IssueKind::RoleMismatch => "role-mismatch",
            IssueKind::KeyboardUnreachable => "keyboard-unreachable",
            IssueKind::MissingAltText => "missing-alt-text",
            IssueKind::SmallTarget => "small-target",
            IssueKind::Overlap => "overlap",
            IssueKind::InsufficientSpacing => "insufficient-spacing",
            IssueKind::ColorOnlyLink => "color-only-link",
            IssueKind::TargetSizeMismatch => "target-size-mismatch",
            IssueKind::OversizedTarget => "oversized-target",
        }
    }

    /// What the finding means for people using assistive technology
    pub fn explanation(self) -> &'static str {
        match self {
            IssueKind::Ghost => {
                "Something looks like a control, but the page code has no element for it. \
                 Screen readers and keyboards cannot reach it at all."
            }
            IssueKind::MissingLabel => {
                "This control has no accessible name, so a screen reader announces it \
                 without saying what it does."
            }
            IssueKind::RoleMismatch => {
                "The element looks like one kind of control but is coded as another, so \
                 assistive technology describes it wrongly."
            }
            IssueKind::KeyboardUnreachable => {
                "The control cannot be reached with the Tab key, so keyboard-only users \
                 cannot operate it."
            }
            IssueKind::MissingAltText => {
                "The image has no text alternative, so people who cannot see it get no \
                 description."
            }
            IssueKind::SmallTarget => {
                "The target is smaller than 24 by 24 CSS pixels, which makes it hard to hit \
                 with a finger or an unsteady pointer."
            }
            IssueKind::Overlap => {
                "Two controls overlap on screen, so a tap or click may land on the wrong one."
            }
            IssueKind::InsufficientSpacing => {
                "Two controls sit very close together, which invites accidental activation."
            }
            IssueKind::ColorOnlyLink => {
                "The link is told apart from surrounding text by color alone, which \
                 colorblind users may not see."
            }
            IssueKind::TargetSizeMismatch => {
                "The clickable area is much larger than what is drawn, so people cannot \
                 tell where the control starts and ends."
            }
            IssueKind::OversizedTarget => {
                "The control covers an unusually large area, which may be unintentional \
                 and can swallow taps meant for nearby content."
            }
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accessibility finding on one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub confidence: Confidence,
    pub bbox: BoundingBox,
    pub device: String,
    /// Pairs that triggered the finding
    pub pairs: Vec<PairId>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wcag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotlight: Option<SpotlightRegion>,
}

impl Issue {
    pub fn new(
        kind: IssueKind,
        confidence: Confidence,
        bbox: BoundingBox,
        device: impl Into<String>,
        pairs: Vec<PairId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            confidence,
            bbox,
            device: device.into(),
            pairs,
            message: message.into(),
            wcag: kind.wcag().map(str::to_string),
            spotlight: None,
        }
    }
}

/// Why a device produced no findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Page unreachable, capture error or timeout
    Capture,
    Detector,
    DomExtraction,
    /// Cancelled or the task died
    Aborted,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Capture => "capture",
            FailureKind::Detector => "detector",
            FailureKind::DomExtraction => "dom-extraction",
            FailureKind::Aborted => "aborted",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeviceStatus {
    Ok,
    Failed { kind: FailureKind, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupStats {
    /// Detector rows before normalization
    pub raw: usize,
    pub below_floor: usize,
    pub suppressed: usize,
    pub kept: usize,
}

/// Outcome of one device pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReport {
    pub device: String,
    pub status: DeviceStatus,
    /// Ranked findings; absent when the device failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<Issue>>,
    #[serde(default)]
    pub pairs: Vec<MatchedPair>,
    #[serde(default)]
    pub detection_anomalies: Vec<DetectionAnomaly>,
    #[serde(default)]
    pub element_anomalies: Vec<ElementAnomaly>,
    #[serde(default)]
    pub dedup: DedupStats,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl DeviceReport {
    pub fn failed(device: impl Into<String>, kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            status: DeviceStatus::Failed {
                kind,
                reason: reason.into(),
            },
            issues: None,
            pairs: Vec::new(),
            detection_anomalies: Vec::new(),
            element_anomalies: Vec::new(),
            dedup: DedupStats::default(),
            elapsed_ms: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == DeviceStatus::Ok
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.status {
            DeviceStatus::Failed { kind, .. } => Some(*kind),
            DeviceStatus::Ok => None,
        }
    }

    pub fn issues(&self) -> &[Issue] {
        self.issues.as_deref().unwrap_or(&[])
    }
}

/// Result of auditing one URL across every configured device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditId,
    pub session: SessionId,
    pub url: String,
    pub created_at: DateTime<Utc>,
    /// Per-device reports in configured device order
    pub devices: Vec<DeviceReport>,
}

impl AuditRecord {
    pub fn new(session: SessionId, url: impl Into<String>, devices: Vec<DeviceReport>) -> Self {
        Self {
            id: AuditId::new(),
            session,
            url: url.into(),
            created_at: Utc::now(),
            devices,
        }
    }

    pub fn device(&self, name: &str) -> Option<&DeviceReport> {
        self.devices.iter().find(|report| report.device == name)
    }

    pub fn issue_count(&self) -> usize {
        self.devices.iter().map(|report| report.issues().len()).sum()
    }

    pub fn failed_devices(&self) -> impl Iterator<Item = &DeviceReport> {
        self.devices.iter().filter(|report| !report.is_ok())
    }
}
