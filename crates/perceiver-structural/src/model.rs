use std::time::SystemTime;

use accessaudit_core_types::{BoundingBox, Device, Frame};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::roles::RoleKind;

/// Viewport an extraction runs against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
}

impl Viewport {
    /// Viewport in screenshot pixels.
    pub fn frame(&self) -> Frame {
        Frame::new(
            (self.width as f64 * self.pixel_ratio).round() as u32,
            (self.height as f64 * self.pixel_ratio).round() as u32,
        )
    }
}

impl From<&Device> for Viewport {
    fn from(device: &Device) -> Self {
        Self {
            device: device.name.clone(),
            width: device.viewport_width,
            height: device.viewport_height,
            pixel_ratio: device.pixel_ratio,
        }
    }
}

/// A page after rendering, as handed over by browser automation.
///
/// `snapshot` is whatever the capture backend recorded for the tree walker;
/// [`crate::SnapshotExtractor`] expects an array of [`RawElement`] records.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderedPage {
    pub url: String,
    pub device: String,
    pub captured_at: SystemTime,
    #[serde(default)]
    pub snapshot: Value,
}

impl RenderedPage {
    pub fn new(url: impl Into<String>, device: impl Into<String>, snapshot: Value) -> Self {
        Self {
            url: url.into(),
            device: device.into(),
            captured_at: SystemTime::now(),
            snapshot,
        }
    }
}

/// One element record from the tree walker. Geometry is already in
/// screenshot pixels.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawElement {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, rename = "type")]
    pub input_type: Option<String>,
    #[serde(default)]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub inner_text: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub tab_index: Option<i64>,
    #[serde(default)]
    pub focusable: Option<bool>,
    #[serde(default)]
    pub text_decoration: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementAttributes {
    pub tab_reachable: bool,
    /// Rendered size in CSS pixels.
    pub css_width: f64,
    pub css_height: f64,
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_decoration: Option<String>,
}

/// Canonical DOM element, placed on the capture frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub device: String,
    pub bbox: BoundingBox,
    pub role: RoleKind,
    /// Role attribute as written, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_role: Option<String>,
    pub name: String,
    pub attributes: ElementAttributes,
}

impl Element {
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    pub fn is_underlined(&self) -> bool {
        self.attributes
            .text_decoration
            .as_deref()
            .map(|d| d.to_ascii_lowercase().contains("underline"))
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementAnomalyKind {
    InvalidGeometry { reason: String },
    ZeroSize,
    OutsideFrame,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementAnomaly {
    pub index: usize,
    #[serde(flatten)]
    pub kind: ElementAnomalyKind,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ElementBatch {
    pub elements: Vec<Element>,
    pub anomalies: Vec<ElementAnomaly>,
}
