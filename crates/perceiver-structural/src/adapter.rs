use accessaudit_core_types::{BoundingBox, Frame};
use tracing::debug;

use crate::model::{
    Element, ElementAnomaly, ElementAnomalyKind, ElementAttributes, ElementBatch, RawElement,
    Viewport,
};
use crate::roles::{accessible_name, natively_focusable, resolve_role, RoleKind};

/// Turns tree-walker records into canonical elements for one viewport.
///
/// Boxes are clamped to `frame`; records with no area left, or that never
/// touched the frame, become anomalies. Input order is preserved.
pub fn normalize_elements(viewport: &Viewport, frame: Frame, raw: &[RawElement]) -> ElementBatch {
    let mut batch = ElementBatch::default();
    for (index, record) in raw.iter().enumerate() {
        match normalize_record(viewport, frame, record) {
            Ok(element) => batch.elements.push(element),
            Err(kind) => {
                debug!(device = %viewport.device, index, ?kind, "dropping element record");
                batch.anomalies.push(ElementAnomaly { index, kind });
            }
        }
    }
    batch
}

fn normalize_record(
    viewport: &Viewport,
    frame: Frame,
    record: &RawElement,
) -> Result<Element, ElementAnomalyKind> {
    if record.width <= 0.0 || record.height <= 0.0 {
        return Err(ElementAnomalyKind::ZeroSize);
    }
    let bbox = BoundingBox::try_new(
        record.x,
        record.y,
        record.x + record.width,
        record.y + record.height,
    )
    .map_err(|err| ElementAnomalyKind::InvalidGeometry {
        reason: err.to_string(),
    })?;

    let clamped = bbox.clamp_to(frame);
    if clamped.is_degenerate() {
        return Err(ElementAnomalyKind::OutsideFrame);
    }

    let input_type = record.input_type.as_deref();
    let role = resolve_role(record.role.as_deref(), &record.tag_name, input_type);
    let is_image = role == RoleKind::Img || record.tag_name.eq_ignore_ascii_case("img");
    let name = accessible_name(
        record.aria_label.as_deref(),
        record.alt.as_deref(),
        record.inner_text.as_deref(),
        record.title.as_deref(),
        is_image,
    );

    let tab_reachable = match record.tab_index {
        Some(index) => index >= 0,
        None => record
            .focusable
            .unwrap_or_else(|| natively_focusable(&record.tag_name, input_type)),
    };

    let ratio = if viewport.pixel_ratio > 0.0 {
        viewport.pixel_ratio
    } else {
        1.0
    };

    Ok(Element {
        device: viewport.device.clone(),
        bbox: clamped,
        role,
        raw_role: record
            .role
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string),
        name,
        attributes: ElementAttributes {
            tab_reachable,
            css_width: record.width / ratio,
            css_height: record.height / ratio,
            tag_name: record.tag_name.to_ascii_uppercase(),
            text_decoration: record
                .text_decoration
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        },
    })
}
