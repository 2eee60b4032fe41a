//! End-to-end audit runs over in-process capture and detector stubs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use accessaudit_cli::{AuditError, Auditor, Capture, CaptureError, DeviceCapture};
use accessaudit_core_types::{Device, SessionId};
use accessaudit_policy_center::{default_policy, AuditPolicy};
use accessaudit_state_center::InMemorySessionStore;
use async_trait::async_trait;
use perceiver_hub::{DeviceStatus, FailureKind, IssueKind};
use perceiver_structural::{
    DomExtractor, PerceiverError, RawElement, RenderedPage, SnapshotExtractor, Viewport,
};
use perceiver_visual::{Detector, RawDetection, Screenshot, VisualError};
use serde_json::{json, Value};
use url::Url;

struct StubCapture {
    elements: Value,
    hang: HashSet<String>,
}

impl StubCapture {
    fn new(elements: Value) -> Self {
        Self {
            elements,
            hang: HashSet::new(),
        }
    }

    fn hanging_on(mut self, device: &str) -> Self {
        self.hang.insert(device.to_string());
        self
    }
}

#[async_trait]
impl DeviceCapture for StubCapture {
    async fn capture(&self, url: &Url, device: &Device) -> Result<Capture, CaptureError> {
        if self.hang.contains(&device.name) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(Capture {
            screenshot: Screenshot::new(device.name.clone(), device.frame(), Vec::new()),
            page: RenderedPage::new(url.as_str(), device.name.clone(), self.elements.clone()),
        })
    }
}

#[derive(Default)]
struct StubDetector {
    rows: Vec<RawDetection>,
    failing: HashSet<String>,
    stalling: HashSet<String>,
}

#[async_trait]
impl Detector for StubDetector {
    async fn detect(&self, screenshot: &Screenshot) -> Result<Vec<RawDetection>, VisualError> {
        if self.failing.contains(&screenshot.device) {
            return Err(VisualError::DetectorFailed("inference server down".into()));
        }
        if self.stalling.contains(&screenshot.device) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(self.rows.clone())
    }
}

/// Tree walker that never returns for one device.
struct StalledExtractor {
    device: String,
}

#[async_trait]
impl DomExtractor for StalledExtractor {
    async fn extract(
        &self,
        page: &RenderedPage,
        viewport: Viewport,
    ) -> Result<Vec<RawElement>, PerceiverError> {
        if page.device == self.device {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        SnapshotExtractor.extract(page, viewport).await
    }
}

fn fast_policy() -> AuditPolicy {
    let mut policy = default_policy();
    policy.timeouts_ms.device = 300;
    policy
}

fn auditor(policy: AuditPolicy, capture: StubCapture, detector: StubDetector) -> Auditor {
    Auditor::new(
        policy,
        Arc::new(capture),
        Arc::new(detector),
        Arc::new(SnapshotExtractor),
        Arc::new(InMemorySessionStore::new()),
    )
    .expect("valid policy")
}

fn ghost_link() -> StubDetector {
    StubDetector {
        rows: vec![RawDetection::new([100.0, 100.0, 200.0, 120.0], 1, 0.8)],
        ..Default::default()
    }
}

#[tokio::test]
async fn hanging_device_is_reported_failed_while_others_complete() {
    let auditor = auditor(
        fast_policy(),
        StubCapture::new(json!([])).hanging_on("ipad"),
        ghost_link(),
    );
    let session = SessionId::from("timeouts");

    let started = Instant::now();
    let record = auditor
        .run_audit(&session, "https://example.com/")
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));

    let names: Vec<_> = record.devices.iter().map(|d| d.device.as_str()).collect();
    assert_eq!(names, vec!["desktop", "ipad", "mobile"]);

    let ipad = record.device("ipad").unwrap();
    assert_eq!(ipad.failure_kind(), Some(FailureKind::Capture));
    assert!(ipad.issues.is_none());
    assert!(failure_reason(ipad).contains("timed out"));

    for name in ["desktop", "mobile"] {
        let report = record.device(name).unwrap();
        assert!(report.is_ok(), "{name} failed: {:?}", report.status);
        let issues = report.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::Ghost);
        assert!((issues[0].confidence.value() - 0.8).abs() < 1e-9);
    }
}

#[tokio::test]
async fn detector_failure_stays_local_to_its_device() {
    let detector = StubDetector {
        failing: HashSet::from(["mobile".to_string()]),
        ..ghost_link()
    };
    let auditor = auditor(fast_policy(), StubCapture::new(json!([])), detector);
    let record = auditor
        .run_audit(&SessionId::from("detector"), "example.com")
        .await
        .unwrap();

    assert_eq!(record.url, "https://example.com/");
    assert_eq!(
        record.device("mobile").unwrap().failure_kind(),
        Some(FailureKind::Detector)
    );
    assert!(record.device("desktop").unwrap().is_ok());
    assert!(record.device("ipad").unwrap().is_ok());
    assert_eq!(record.failed_devices().count(), 1);
}

fn failure_reason(report: &perceiver_hub::DeviceReport) -> &str {
    match &report.status {
        DeviceStatus::Failed { reason, .. } => reason,
        DeviceStatus::Ok => panic!("{} should have failed", report.device),
    }
}

#[tokio::test]
async fn stalled_detector_times_out_as_detector_failure() {
    let detector = StubDetector {
        stalling: HashSet::from(["desktop".to_string()]),
        ..ghost_link()
    };
    let auditor = auditor(fast_policy(), StubCapture::new(json!([])), detector);
    let record = auditor
        .run_audit(&SessionId::from("slow-detector"), "https://example.com/")
        .await
        .unwrap();

    let desktop = record.device("desktop").unwrap();
    assert_eq!(desktop.failure_kind(), Some(FailureKind::Detector));
    assert!(failure_reason(desktop).contains("timed out"));
    assert!(record.device("ipad").unwrap().is_ok());
    assert!(record.device("mobile").unwrap().is_ok());
}

#[tokio::test]
async fn stalled_tree_walker_times_out_as_dom_extraction_failure() {
    let auditor = Auditor::new(
        fast_policy(),
        Arc::new(StubCapture::new(json!([]))),
        Arc::new(ghost_link()),
        Arc::new(StalledExtractor {
            device: "mobile".to_string(),
        }),
        Arc::new(InMemorySessionStore::new()),
    )
    .expect("valid policy");
    let record = auditor
        .run_audit(&SessionId::from("slow-dom"), "https://example.com/")
        .await
        .unwrap();

    let mobile = record.device("mobile").unwrap();
    assert_eq!(mobile.failure_kind(), Some(FailureKind::DomExtraction));
    assert!(failure_reason(mobile).contains("timed out"));
    assert_eq!(record.failed_devices().count(), 1);
}

#[tokio::test]
async fn unlabeled_small_textbox_yields_label_and_target_findings() {
    let mut policy = fast_policy();
    policy.devices = vec![Device::desktop()];
    let capture = StubCapture::new(json!([
        {"tagName": "INPUT", "x": 0, "y": 0, "width": 40, "height": 20}
    ]));
    let detector = StubDetector {
        rows: vec![RawDetection::new([0.0, 0.0, 40.0, 20.0], 2, 0.7)],
        ..Default::default()
    };
    let auditor = auditor(policy, capture, detector);
    let record = auditor
        .run_audit(&SessionId::from("textbox"), "https://example.com/form")
        .await
        .unwrap();

    let issues = record.device("desktop").unwrap().issues();
    let kinds: HashSet<_> = issues.iter().map(|issue| issue.kind).collect();
    assert_eq!(
        kinds,
        HashSet::from([IssueKind::MissingLabel, IssueKind::SmallTarget])
    );
    for issue in issues {
        assert!((issue.confidence.value() - 0.7).abs() < 1e-9);
    }
}

#[tokio::test]
async fn sequential_audits_accumulate_in_session_history() {
    let auditor = auditor(fast_policy(), StubCapture::new(json!([])), ghost_link());
    let session = SessionId::from("history");

    let first = auditor.run_audit(&session, "https://a.example/").await.unwrap();
    let second = auditor.run_audit(&session, "https://b.example/").await.unwrap();

    let history = auditor.get_history(&session);
    assert_eq!(history.len(), 2);
    assert!(Arc::ptr_eq(&history[0], &first));
    assert!(Arc::ptr_eq(&history[1], &second));
    assert_ne!(first.id, second.id);

    let latest = auditor.latest_for_url(&session, "a.example").unwrap();
    assert_eq!(latest.id, first.id);
    assert!(auditor.get_history(&SessionId::from("other")).is_empty());

    assert_eq!(auditor.end_session(&session), 2);
    assert!(auditor.get_history(&session).is_empty());
}

#[tokio::test]
async fn idle_sessions_are_evicted_after_the_policy_ttl() {
    let mut policy = fast_policy();
    policy.session.idle_ttl_secs = 0;
    let auditor = auditor(policy, StubCapture::new(json!([])), ghost_link());
    let session = SessionId::from("idle");
    auditor.run_audit(&session, "https://example.com/").await.unwrap();
    assert_eq!(auditor.get_history(&session).len(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(auditor.evict_idle_sessions(), 1);
    assert!(auditor.get_history(&session).is_empty());
    assert_eq!(auditor.evict_idle_sessions(), 0);
}

#[tokio::test]
async fn repeated_runs_rank_identically() {
    let detector = StubDetector {
        rows: vec![
            RawDetection::new([0.0, 0.0, 100.0, 40.0], 0, 0.9),
            RawDetection::new([30.0, 0.0, 130.0, 40.0], 0, 0.6),
            RawDetection::new([300.0, 0.0, 320.0, 20.0], 4, 0.6),
            RawDetection::new([500.0, 500.0, 560.0, 520.0], 1, 0.6),
        ],
        ..Default::default()
    };
    let capture = StubCapture::new(json!([
        {"tagName": "A", "innerText": "Docs", "x": 500, "y": 500, "width": 60, "height": 20}
    ]));
    let auditor = auditor(fast_policy(), capture, detector);
    let session = SessionId::from("determinism");

    let first = auditor.run_audit(&session, "https://example.com/").await.unwrap();
    let second = auditor.run_audit(&session, "https://example.com/").await.unwrap();

    for (a, b) in first.devices.iter().zip(&second.devices) {
        assert_eq!(a.device, b.device);
        assert_eq!(a.issues, b.issues);
        assert_eq!(a.pairs, b.pairs);
        assert!(!a.issues().is_empty());
    }
}

#[tokio::test]
async fn unparsable_url_fails_the_run_without_history() {
    let auditor = auditor(fast_policy(), StubCapture::new(json!([])), ghost_link());
    let session = SessionId::from("bad-url");
    let err = auditor.run_audit(&session, "ftp://example.com").await.unwrap_err();
    assert!(matches!(err, AuditError::InvalidUrl { .. }));
    assert!(auditor.get_history(&session).is_empty());
}

#[tokio::test]
async fn invalid_policy_is_rejected_before_any_audit() {
    let mut policy = default_policy();
    policy.dedup.iou_threshold = 1.5;
    let result = Auditor::new(
        policy,
        Arc::new(StubCapture::new(json!([]))),
        Arc::new(StubDetector::default()),
        Arc::new(SnapshotExtractor),
        Arc::new(InMemorySessionStore::new()),
    );
    assert!(matches!(result, Err(AuditError::Configuration(_))));

    let mut policy = default_policy();
    policy.devices.clear();
    let result = Auditor::new(
        policy,
        Arc::new(StubCapture::new(json!([]))),
        Arc::new(StubDetector::default()),
        Arc::new(SnapshotExtractor),
        Arc::new(InMemorySessionStore::new()),
    );
    assert!(matches!(result, Err(AuditError::Configuration(_))));
}

#[tokio::test]
async fn shutdown_aborts_every_device() {
    let mut policy = default_policy();
    policy.timeouts_ms.device = 60_000;
    let auditor = Arc::new(auditor(
        policy,
        StubCapture::new(json!([]))
            .hanging_on("desktop")
            .hanging_on("ipad")
            .hanging_on("mobile"),
        ghost_link(),
    ));
    let session = SessionId::from("shutdown");

    let running = {
        let auditor = Arc::clone(&auditor);
        let session = session.clone();
        tokio::spawn(async move { auditor.run_audit(&session, "https://example.com/").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    auditor.shutdown();

    let record = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("run finishes after shutdown")
        .unwrap()
        .unwrap();
    let kinds: HashMap<_, _> = record
        .devices
        .iter()
        .map(|d| (d.device.clone(), d.failure_kind()))
        .collect();
    assert_eq!(kinds.len(), 3);
    assert!(kinds.values().all(|kind| *kind == Some(FailureKind::Aborted)));
    assert_eq!(auditor.get_history(&session).len(), 1);
}
