///! Normalization of raw detector rows into canonical detections
use accessaudit_core_types::{BoundingBox, Confidence, DetectionClass, Frame};
use tracing::debug;

use crate::models::*;

/// Validates every row, clamps boxes to the frame and records what was dropped.
///
/// Rows keep their relative order, which later stages rely on for tie-breaking.
pub fn normalize_detections(device: &str, frame: Frame, raw: &[RawDetection]) -> DetectionBatch {
    let mut batch = DetectionBatch::default();

    for (index, row) in raw.iter().enumerate() {
        match normalize_row(device, frame, row) {
            Ok(detection) => batch.detections.push(detection),
            Err(kind) => {
                debug!(device, index, ?kind, "dropping detector row");
                batch.anomalies.push(DetectionAnomaly { index, kind });
            }
        }
    }

    batch
}

fn normalize_row(
    device: &str,
    frame: Frame,
    row: &RawDetection,
) -> Result<Detection, DetectionAnomalyKind> {
    let class = DetectionClass::from_index(row.class_index).map_err(|_| {
        DetectionAnomalyKind::ClassIndexOutOfRange {
            class_index: row.class_index,
        }
    })?;

    let confidence = Confidence::new(row.confidence).map_err(|_| {
        DetectionAnomalyKind::ConfidenceOutOfRange {
            confidence: row.confidence,
        }
    })?;

    let [x1, y1, x2, y2] = row.bbox;
    let bbox = BoundingBox::try_new(x1, y1, x2, y2).map_err(|err| {
        DetectionAnomalyKind::InvalidBox {
            reason: err.to_string(),
        }
    })?;

    let clamped = bbox.clamp_to(frame);
    if clamped.is_degenerate() {
        return Err(if bbox.is_degenerate() {
            DetectionAnomalyKind::InvalidBox {
                reason: "zero area".into(),
            }
        } else {
            DetectionAnomalyKind::OutsideFrame
        });
    }

    Ok(Detection::new(device, clamped, class, confidence))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::new(1280, 800)
    }

    #[test]
    fn valid_rows_become_detections() {
        let raw = vec![
            RawDetection::new([10.0, 10.0, 50.0, 30.0], 0, 0.9),
            RawDetection::new([100.0, 100.0, 200.0, 120.0], 1, 0.8),
        ];
        let batch = normalize_detections("desktop", frame(), &raw);
        assert!(batch.anomalies.is_empty());
        assert_eq!(batch.detections.len(), 2);
        assert_eq!(batch.detections[0].class, DetectionClass::Button);
        assert_eq!(batch.detections[1].class, DetectionClass::Link);
        assert_eq!(batch.detections[1].device, "desktop");
    }

    #[test]
    fn background_and_unknown_classes_are_anomalies() {
        let raw = vec![
            RawDetection::new([0.0, 0.0, 10.0, 10.0], 7, 0.9),
            RawDetection::new([0.0, 0.0, 10.0, 10.0], -2, 0.9),
            RawDetection::new([0.0, 0.0, 10.0, 10.0], 6, 0.9),
        ];
        let batch = normalize_detections("desktop", frame(), &raw);
        assert_eq!(batch.detections.len(), 1);
        assert_eq!(batch.detections[0].class, DetectionClass::Heading);
        assert_eq!(
            batch.anomalies[0],
            DetectionAnomaly {
                index: 0,
                kind: DetectionAnomalyKind::ClassIndexOutOfRange { class_index: 7 },
            }
        );
        assert_eq!(batch.anomalies[1].index, 1);
    }

    #[test]
    fn bad_confidence_and_boxes_are_anomalies() {
        let raw = vec![
            RawDetection::new([0.0, 0.0, 10.0, 10.0], 0, 1.2),
            RawDetection::new([0.0, 0.0, 10.0, 10.0], 0, f64::NAN),
            RawDetection::new([20.0, 0.0, 10.0, 10.0], 0, 0.5),
            RawDetection::new([5.0, 5.0, 5.0, 10.0], 0, 0.5),
            RawDetection::new([2000.0, 900.0, 2100.0, 950.0], 0, 0.5),
        ];
        let batch = normalize_detections("desktop", frame(), &raw);
        assert!(batch.detections.is_empty());
        assert_eq!(batch.anomalies.len(), 5);
        assert!(matches!(
            batch.anomalies[0].kind,
            DetectionAnomalyKind::ConfidenceOutOfRange { .. }
        ));
        assert!(matches!(
            batch.anomalies[2].kind,
            DetectionAnomalyKind::InvalidBox { .. }
        ));
        assert_eq!(batch.anomalies[4].kind, DetectionAnomalyKind::OutsideFrame);
    }

    #[test]
    fn boxes_are_clamped_into_frame() {
        let raw = vec![RawDetection::new([1200.0, 780.0, 1300.0, 820.0], 2, 0.6)];
        let batch = normalize_detections("desktop", frame(), &raw);
        let bbox = batch.detections[0].bbox;
        assert_eq!(bbox, BoundingBox::new(1200.0, 780.0, 1280.0, 800.0));
        assert!(bbox.within(frame()));
    }
}
