//! Axis-aligned pixel boxes shared by detections, DOM elements and findings.

use crate::{CoreError, Frame};

/// Corner-form box `(x1, y1) - (x2, y2)` in screenshot pixels.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Checked constructor: coordinates must be finite and not inverted.
    pub fn try_new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self, CoreError> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(CoreError::InvalidBox("non-finite coordinate".into()));
        }
        if x2 < x1 || y2 < y1 {
            return Err(CoreError::InvalidBox(format!(
                "inverted corners ({x1},{y1})-({x2},{y2})"
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn is_degenerate(&self) -> bool {
        self.area() <= 0.0
    }

    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);
        if x2 > x1 && y2 > y1 {
            Some(BoundingBox::new(x1, y1, x2, y2))
        } else {
            None
        }
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        self.intersection(other).map(|b| b.area()).unwrap_or(0.0)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.intersection(other).is_some()
    }

    /// Intersection over union; 0 when either box is empty.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let inter = self.intersection_area(other);
        if inter <= 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            (inter / union).clamp(0.0, 1.0)
        }
    }

    /// Share of the smaller box covered by the other one.
    pub fn containment(&self, other: &BoundingBox) -> f64 {
        let smaller = self.area().min(other.area());
        if smaller <= 0.0 {
            return 0.0;
        }
        (self.intersection_area(other) / smaller).clamp(0.0, 1.0)
    }

    /// Shortest gap between the two edges; 0 when they touch or overlap.
    pub fn edge_distance(&self, other: &BoundingBox) -> f64 {
        let dx = (self.x1.max(other.x1) - self.x2.min(other.x2)).max(0.0);
        let dy = (self.y1.max(other.y1) - self.y2.min(other.y2)).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.x1.min(other.x1),
            self.y1.min(other.y1),
            self.x2.max(other.x2),
            self.y2.max(other.y2),
        )
    }

    pub fn clamp_to(&self, frame: Frame) -> BoundingBox {
        let w = frame.width as f64;
        let h = frame.height as f64;
        BoundingBox::new(
            self.x1.clamp(0.0, w),
            self.y1.clamp(0.0, h),
            self.x2.clamp(0.0, w),
            self.y2.clamp(0.0, h),
        )
    }

    pub fn pad(&self, padding: f64) -> BoundingBox {
        BoundingBox::new(
            self.x1 - padding,
            self.y1 - padding,
            self.x2 + padding,
            self.y2 + padding,
        )
    }

    pub fn within(&self, frame: Frame) -> bool {
        self.x1 >= 0.0
            && self.y1 >= 0.0
            && self.x2 <= frame.width as f64
            && self.y2 <= frame.height as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_near_duplicates() {
        let a = BoundingBox::new(10.0, 10.0, 50.0, 30.0);
        let b = BoundingBox::new(12.0, 11.0, 49.0, 29.0);
        let iou = a.iou(&b);
        assert!(iou > 0.8 && iou < 0.85, "iou was {iou}");
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(14.0, 13.0, 20.0, 20.0);
        assert_eq!(a.iou(&b), 0.0);
        assert!(!a.intersects(&b));
        assert_eq!(a.edge_distance(&b), 5.0);
    }

    #[test]
    fn containment_uses_smaller_box() {
        let outer = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let inner = BoundingBox::new(10.0, 10.0, 20.0, 20.0);
        assert_eq!(outer.containment(&inner), 1.0);
        assert!(outer.iou(&inner) < 0.02);
    }

    #[test]
    fn clamp_and_pad() {
        let frame = Frame::new(100, 50);
        let b = BoundingBox::new(-5.0, 40.0, 30.0, 70.0).clamp_to(frame);
        assert_eq!(b, BoundingBox::new(0.0, 40.0, 30.0, 50.0));
        assert!(b.within(frame));
        assert_eq!(b.pad(2.0).width(), 34.0);
    }

    #[test]
    fn try_new_rejects_inverted() {
        assert!(BoundingBox::try_new(10.0, 0.0, 5.0, 5.0).is_err());
        assert!(BoundingBox::try_new(0.0, 0.0, f64::INFINITY, 5.0).is_err());
    }
}
