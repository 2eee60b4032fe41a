use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use accessaudit_core_types::{DetectionClass, Device};
use serde_json::Value;
use tracing::debug;

use crate::defaults::default_policy;
use crate::errors::PolicyError;
use crate::model::{AuditPolicy, PolicySource};

const ENV_PREFIX: &str = "ACCESSAUDIT_POLICY__";
const ENV_JSON: &str = "ACCESSAUDIT_POLICY_OVERRIDE_JSON";

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
        }
    }
}

/// Defaults, then the optional file, then environment overlays.
pub fn load_policy(path: Option<&Path>) -> Result<AuditPolicy, PolicyError> {
    let mut options = LoadOptions {
        include_env: true,
        ..Default::default()
    };
    if let Some(p) = path {
        options.paths.push(p.to_path_buf());
    }
    load_policy_with_options(&options)
}

pub fn load_policy_with_options(options: &LoadOptions) -> Result<AuditPolicy, PolicyError> {
    let mut policy = default_policy();
    bootstrap_builtin_provenance(&mut policy)?;

    for path in &options.paths {
        if path.exists() {
            let overlays = overlays_from_file(path)?;
            debug!(path = %path.display(), count = overlays.len(), "applying policy file");
            apply_overlays(&mut policy, overlays)?;
        } else {
            debug!(path = %path.display(), "policy file missing, skipped");
        }
    }

    if options.include_env {
        let env_overlays = overlays_from_env()?;
        apply_overlays(&mut policy, env_overlays)?;
    }

    Ok(policy)
}

struct PolicyOverlay {
    path: String,
    value: Value,
    source: PolicySource,
}

fn apply_overlays(policy: &mut AuditPolicy, overlays: Vec<PolicyOverlay>) -> Result<(), PolicyError> {
    for overlay in overlays {
        apply_override(policy, &overlay.path, &overlay.value)?;
        policy.set_provenance(&overlay.path, overlay.source);
    }
    Ok(())
}

/// Writes one dotted-path value into the policy.
pub(crate) fn apply_override(
    policy: &mut AuditPolicy,
    path: &str,
    value: &Value,
) -> Result<(), PolicyError> {
    match path {
        "rev" => policy.rev = to_u64(path, value)?,
        "dedup.iou_threshold" => policy.dedup.iou_threshold = to_f64(path, value)?,
        "dedup.confidence_floor" => policy.dedup.confidence_floor = to_f64(path, value)?,
        "matcher.match_threshold" => policy.matcher.match_threshold = to_f64(path, value)?,
        "matcher.spatial_weight" => policy.matcher.spatial_weight = to_f64(path, value)?,
        "matcher.semantic_weight" => policy.matcher.semantic_weight = to_f64(path, value)?,
        "matcher.containment_weight" => policy.matcher.containment_weight = to_f64(path, value)?,
        "classifier.overlap_iou" => policy.classifier.overlap_iou = to_f64(path, value)?,
        "classifier.min_spacing_css" => policy.classifier.min_spacing_css = to_f64(path, value)?,
        "classifier.dom_only_confidence" => {
            policy.classifier.dom_only_confidence = to_f64(path, value)?
        }
        "classifier.ghost_classes" => policy.classifier.ghost_classes = to_classes(path, value)?,
        "classifier.nested_containment" => {
            policy.classifier.nested_containment = to_f64(path, value)?
        }
        "classifier.size_mismatch_ratio" => {
            policy.classifier.size_mismatch_ratio = to_f64(path, value)?
        }
        "classifier.size_mismatch_max_area_css" => {
            policy.classifier.size_mismatch_max_area_css = to_f64(path, value)?
        }
        "classifier.max_target_width_css" => {
            policy.classifier.max_target_width_css = to_f64(path, value)?
        }
        "classifier.max_target_height_css" => {
            policy.classifier.max_target_height_css = to_f64(path, value)?
        }
        "devices" => {
            policy.devices = serde_json::from_value::<Vec<Device>>(value.clone())
                .map_err(|err| PolicyError::invalid_value(path, err.to_string()))?
        }
        "timeouts_ms.device" => policy.timeouts_ms.device = to_u64(path, value)?,
        "spotlight.padding_px" => policy.spotlight.padding_px = to_f64(path, value)?,
        "session.idle_ttl_secs" => policy.session.idle_ttl_secs = to_u64(path, value)?,
        other => return Err(PolicyError::UnsupportedPath(other.to_string())),
    }
    Ok(())
}

fn to_f64(path: &str, value: &Value) -> Result<f64, PolicyError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| PolicyError::invalid_value(path, "not a number")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|err| PolicyError::invalid_value(path, err.to_string())),
        _ => Err(PolicyError::invalid_value(path, "expected a number")),
    }
}

fn to_u64(path: &str, value: &Value) -> Result<u64, PolicyError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| PolicyError::invalid_value(path, "expected a non-negative integer")),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|err| PolicyError::invalid_value(path, err.to_string())),
        _ => Err(PolicyError::invalid_value(path, "expected an integer")),
    }
}

fn to_classes(path: &str, value: &Value) -> Result<Vec<DetectionClass>, PolicyError> {
    let items: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| PolicyError::invalid_value(path, "expected class names"))
            })
            .collect::<Result<_, _>>()?,
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Null => Vec::new(),
        _ => return Err(PolicyError::invalid_value(path, "expected a list of classes")),
    };
    items
        .iter()
        .map(|name| {
            name.parse::<DetectionClass>()
                .map_err(|err| PolicyError::invalid_value(path, err))
        })
        .collect()
}

fn overlays_from_file(path: &Path) -> Result<Vec<PolicyOverlay>, PolicyError> {
    let content = fs::read_to_string(path).map_err(|err| PolicyError::Io(format!("{}", err)))?;
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
    let json_value =
        serde_json::to_value(yaml_value).map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
    Ok(flatten_value(json_value, None, PolicySource::File))
}

fn overlays_from_env() -> Result<Vec<PolicyOverlay>, PolicyError> {
    let mut overlays = Vec::new();
    for (key, raw) in env::vars() {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let path = stripped
                .split("__")
                .filter(|segment| !segment.is_empty())
                .map(|segment| segment.to_ascii_lowercase())
                .collect::<Vec<_>>()
                .join(".");
            if path.is_empty() {
                continue;
            }
            overlays.push(PolicyOverlay {
                path,
                value: parse_env_value(&raw),
                source: PolicySource::Env,
            });
        }
    }

    if let Ok(raw_json) = env::var(ENV_JSON) {
        if !raw_json.trim().is_empty() {
            let json_value: Value = serde_json::from_str(&raw_json)
                .map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
            overlays.extend(flatten_value(json_value, None, PolicySource::Env));
        }
    }

    // env::vars order is unspecified
    overlays.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(overlays)
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    Value::String(raw.to_string())
}

fn flatten_value(value: Value, prefix: Option<String>, source: PolicySource) -> Vec<PolicyOverlay> {
    match value {
        Value::Object(map) => {
            let mut result = Vec::new();
            for (key, value) in map {
                let key_segment = key.trim().to_ascii_lowercase();
                let next_prefix = match &prefix {
                    Some(prefix) if !prefix.is_empty() => format!("{}.{}", prefix, key_segment),
                    _ => key_segment,
                };
                result.extend(flatten_value(value, Some(next_prefix), source));
            }
            result
        }
        other => match prefix {
            Some(prefix) => vec![PolicyOverlay {
                path: prefix,
                value: other,
                source,
            }],
            None => Vec::new(),
        },
    }
}

fn bootstrap_builtin_provenance(policy: &mut AuditPolicy) -> Result<(), PolicyError> {
    let mut builtin = policy.clone();
    builtin.provenance.clear();
    let value =
        serde_json::to_value(&builtin).map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
    for overlay in flatten_value(value, None, PolicySource::Builtin) {
        policy.set_provenance(&overlay.path, overlay.source);
    }
    Ok(())
}
