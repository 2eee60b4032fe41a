use std::env;

use accessaudit_core_types::DetectionClass;
use serial_test::serial;

use crate::defaults::default_policy;
use crate::loader::{load_policy, load_policy_with_options, LoadOptions};
use crate::model::PolicySource;
use crate::PolicyError;

#[test]
fn default_policy_is_valid() {
    let policy = default_policy();
    policy.validate().unwrap();
    assert_eq!(policy.dedup.iou_threshold, 0.5);
    assert_eq!(policy.devices.len(), 3);
    assert_eq!(
        policy.classifier.ghost_classes,
        vec![
            DetectionClass::Button,
            DetectionClass::Link,
            DetectionClass::Input,
            DetectionClass::Icon
        ]
    );
}

#[test]
#[serial]
fn load_policy_applies_file_overlay() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("policy.yaml");
    std::fs::write(
        &file_path,
        r#"dedup:
  iou_threshold: 0.6
matcher:
  match_threshold: 0.4
devices:
  - name: laptop
    viewport_width: 1440
    viewport_height: 900
    pixel_ratio: 2.0
timeouts_ms:
  device: 5000
"#,
    )
    .unwrap();

    let policy = load_policy(Some(&file_path)).unwrap();
    assert_eq!(policy.dedup.iou_threshold, 0.6);
    assert_eq!(policy.dedup.confidence_floor, 0.25);
    assert_eq!(policy.matcher.match_threshold, 0.4);
    assert_eq!(policy.devices.len(), 1);
    assert_eq!(policy.devices[0].name, "laptop");
    assert_eq!(policy.devices[0].min_target_css, 24.0);
    assert_eq!(policy.timeouts_ms.device, 5000);
    assert_eq!(
        policy.source_of("dedup.iou_threshold"),
        Some(PolicySource::File)
    );
    assert_eq!(
        policy.source_of("dedup.confidence_floor"),
        Some(PolicySource::Builtin)
    );
    policy.validate().unwrap();
}

#[test]
#[serial]
fn env_overrides_take_precedence_over_file() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("policy.yaml");
    std::fs::write(&file_path, "classifier:\n  overlap_iou: 0.2\n").unwrap();

    env::set_var("ACCESSAUDIT_POLICY__CLASSIFIER__OVERLAP_IOU", "0.45");
    env::set_var("ACCESSAUDIT_POLICY__CLASSIFIER__GHOST_CLASSES", "button,link");
    let result = load_policy_with_options(&LoadOptions::with_path(&file_path));
    env::remove_var("ACCESSAUDIT_POLICY__CLASSIFIER__OVERLAP_IOU");
    env::remove_var("ACCESSAUDIT_POLICY__CLASSIFIER__GHOST_CLASSES");

    let policy = result.unwrap();
    assert_eq!(policy.classifier.overlap_iou, 0.45);
    assert_eq!(
        policy.classifier.ghost_classes,
        vec![DetectionClass::Button, DetectionClass::Link]
    );
    assert_eq!(
        policy.source_of("classifier.overlap_iou"),
        Some(PolicySource::Env)
    );
}

#[test]
#[serial]
fn json_override_env_is_flattened() {
    env::set_var(
        "ACCESSAUDIT_POLICY_OVERRIDE_JSON",
        r#"{"spotlight": {"padding_px": 4}, "session": {"idle_ttl_secs": 60}}"#,
    );
    let result = load_policy(None);
    env::remove_var("ACCESSAUDIT_POLICY_OVERRIDE_JSON");

    let policy = result.unwrap();
    assert_eq!(policy.spotlight.padding_px, 4.0);
    assert_eq!(policy.session.idle_ttl_secs, 60);
}

#[test]
#[serial]
fn unknown_path_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("policy.yaml");
    std::fs::write(&file_path, "dedup:\n  iou: 0.6\n").unwrap();

    let err = load_policy(Some(&file_path)).unwrap_err();
    assert!(matches!(err, PolicyError::UnsupportedPath(path) if path == "dedup.iou"));
}

#[test]
fn validate_rejects_out_of_range_threshold() {
    let mut policy = default_policy();
    policy.dedup.iou_threshold = 1.5;
    assert!(matches!(policy.validate(), Err(PolicyError::Invalid(_))));
}

#[test]
fn validate_rejects_empty_device_list() {
    let mut policy = default_policy();
    policy.devices.clear();
    assert!(policy.validate().is_err());
}

#[test]
fn validate_rejects_duplicate_devices() {
    let mut policy = default_policy();
    let first = policy.devices[0].clone();
    policy.devices.push(first);
    let err = policy.validate().unwrap_err();
    assert!(err.to_string().contains("duplicate device"));
}

#[test]
fn validate_rejects_zero_timeout_and_weights() {
    let mut policy = default_policy();
    policy.timeouts_ms.device = 0;
    assert!(policy.validate().is_err());

    let mut policy = default_policy();
    policy.matcher.spatial_weight = 0.0;
    policy.matcher.semantic_weight = 0.0;
    assert!(policy.validate().is_err());
}

#[test]
fn size_thresholds_default_and_validate() {
    let policy = default_policy();
    assert_eq!(policy.classifier.nested_containment, 0.95);
    assert_eq!(policy.classifier.size_mismatch_ratio, 1.2);
    assert_eq!(policy.classifier.size_mismatch_max_area_css, 1_000.0);
    assert_eq!(policy.classifier.max_target_width_css, 400.0);
    assert_eq!(policy.classifier.max_target_height_css, 200.0);

    let mut policy = default_policy();
    policy.classifier.size_mismatch_ratio = 0.8;
    assert!(policy.validate().is_err());

    let mut policy = default_policy();
    policy.classifier.max_target_height_css = 0.0;
    let err = policy.validate().unwrap_err();
    assert!(err.to_string().contains("classifier.max_target_height_css"));

    let mut policy = default_policy();
    policy.classifier.nested_containment = 1.5;
    assert!(policy.validate().is_err());
}

#[test]
#[serial]
fn size_thresholds_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("policy.yaml");
    std::fs::write(
        &file_path,
        "classifier:\n  max_target_width_css: 640\n  size_mismatch_ratio: 1.5\n",
    )
    .unwrap();

    let policy = load_policy(Some(&file_path)).unwrap();
    assert_eq!(policy.classifier.max_target_width_css, 640.0);
    assert_eq!(policy.classifier.size_mismatch_ratio, 1.5);
    assert_eq!(policy.classifier.max_target_height_css, 200.0);
    assert_eq!(
        policy.source_of("classifier.max_target_width_css"),
        Some(PolicySource::File)
    );
}
