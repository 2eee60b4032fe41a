///! Deterministic ordering of findings
use std::cmp::Ordering;

use crate::models::Issue;

/// Confidence descending, then kind priority, then larger box first.
pub fn compare(a: &Issue, b: &Issue) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.kind.priority().cmp(&b.kind.priority()))
        .then_with(|| b.bbox.area().total_cmp(&a.bbox.area()))
}

/// Stable sort; equal findings keep their classifier order.
pub fn rank(issues: &mut [Issue]) {
    issues.sort_by(compare);
}

pub fn is_ranked(issues: &[Issue]) -> bool {
    issues
        .windows(2)
        .all(|w| compare(&w[0], &w[1]) != Ordering::Greater)
}
