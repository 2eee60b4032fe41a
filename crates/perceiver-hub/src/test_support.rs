use accessaudit_core_types::{BoundingBox, Confidence, DetectionClass};
use perceiver_structural::{ElementAttributes, RoleKind};

use crate::models::{Detection, Element};

pub(crate) fn detection(class: DetectionClass, bbox: BoundingBox, confidence: f64) -> Detection {
    Detection::new("desktop", bbox, class, Confidence::new(confidence).unwrap())
}

/// Focusable element on the desktop profile.
pub(crate) fn element(role: RoleKind, bbox: BoundingBox, name: &str) -> Element {
    let tag_name = match role {
        RoleKind::Link => "A",
        RoleKind::Button => "BUTTON",
        RoleKind::Textbox => "INPUT",
        RoleKind::Img => "IMG",
        RoleKind::Heading => "H2",
        _ => "DIV",
    };
    Element {
        device: "desktop".into(),
        bbox,
        role,
        raw_role: None,
        name: name.to_string(),
        attributes: ElementAttributes {
            tab_reachable: true,
            css_width: bbox.width(),
            css_height: bbox.height(),
            tag_name: tag_name.to_string(),
            text_decoration: None,
        },
    }
}
