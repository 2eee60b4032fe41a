///! Greedy one-to-one association of detections with DOM elements
use accessaudit_policy_center::MatcherPolicy;
use tracing::debug;

use crate::compat::compatibility;
use crate::models::{Detection, Element, MatchedPair, PairId};

/// Weighted spatial plus semantic agreement, in [0, 1].
///
/// Boxes that do not intersect score 0 whatever their roles say.
pub fn match_score(detection: &Detection, element: &Element, policy: &MatcherPolicy) -> f64 {
    if !detection.bbox.intersects(&element.bbox) {
        return 0.0;
    }
    let iou = detection.bbox.iou(&element.bbox);
    let contained = detection.bbox.containment(&element.bbox) * policy.containment_weight;
    let spatial = iou.max(contained);
    let semantic = compatibility(detection.class, &element.role).score();
    (policy.spatial_weight * spatial + policy.semantic_weight * semantic).clamp(0.0, 1.0)
}

/// Pairs every detection and element of one device.
///
/// Detections claim elements in confidence order; each takes the best
/// unclaimed element scoring strictly above the threshold, the earliest one
/// on ties. The result lists detection-side pairs in detection input order,
/// then the unclaimed elements in element order. `PairId` is the position.
pub fn match_device(
    detections: &[Detection],
    elements: &[Element],
    policy: &MatcherPolicy,
) -> Vec<MatchedPair> {
    let mut order: Vec<usize> = (0..detections.len()).collect();
    order.sort_by(|&a, &b| {
        detections[b]
            .confidence
            .total_cmp(&detections[a].confidence)
            .then_with(|| a.cmp(&b))
    });

    let mut claimed = vec![false; elements.len()];
    let mut assignment: Vec<Option<(usize, f64)>> = vec![None; detections.len()];

    for &di in &order {
        let mut best: Option<(usize, f64)> = None;
        for (ei, element) in elements.iter().enumerate() {
            if claimed[ei] {
                continue;
            }
            let score = match_score(&detections[di], element, policy);
            if score <= policy.match_threshold {
                continue;
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((ei, score));
            }
        }
        if let Some((ei, score)) = best {
            claimed[ei] = true;
            assignment[di] = Some((ei, score));
        }
    }

    let mut pairs = Vec::with_capacity(detections.len() + elements.len());
    for (di, detection) in detections.iter().enumerate() {
        let id = PairId(pairs.len());
        let pair = match assignment[di] {
            Some((ei, score)) => {
                MatchedPair::matched(id, detection.clone(), elements[ei].clone(), score)
            }
            None => MatchedPair::visual_only(id, detection.clone()),
        };
        pairs.push(pair);
    }
    for (ei, element) in elements.iter().enumerate() {
        if !claimed[ei] {
            let id = PairId(pairs.len());
            pairs.push(MatchedPair::dom_only(id, element.clone()));
        }
    }

    debug!(
        detections = detections.len(),
        elements = elements.len(),
        matched = assignment.iter().filter(|a| a.is_some()).count(),
        "matched detections to elements"
    );
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{detection, element};
    use accessaudit_core_types::{BoundingBox, DetectionClass};
    use perceiver_structural::RoleKind;
    use proptest::prelude::*;

    fn policy() -> MatcherPolicy {
        MatcherPolicy {
            match_threshold: 0.35,
            spatial_weight: 0.7,
            semantic_weight: 0.3,
            containment_weight: 0.8,
        }
    }

    #[test]
    fn identical_compatible_boxes_score_one() {
        let bbox = BoundingBox::new(10.0, 10.0, 110.0, 50.0);
        let d = detection(DetectionClass::Button, bbox, 0.9);
        let e = element(RoleKind::Button, bbox, "Buy");
        assert!((match_score(&d, &e, &policy()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_boxes_score_zero() {
        let d = detection(DetectionClass::Link, BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9);
        let e = element(RoleKind::Link, BoundingBox::new(20.0, 0.0, 30.0, 10.0), "x");
        assert_eq!(match_score(&d, &e, &policy()), 0.0);
    }

    #[test]
    fn containment_rescues_nested_boxes() {
        // small visual icon inside a large clickable area
        let d = detection(DetectionClass::Icon, BoundingBox::new(10.0, 10.0, 30.0, 30.0), 0.8);
        let e = element(RoleKind::Button, BoundingBox::new(0.0, 0.0, 200.0, 40.0), "Menu");
        let score = match_score(&d, &e, &policy());
        assert!((score - (0.7 * 0.8 + 0.3)).abs() < 1e-9);
    }

    #[test]
    fn stronger_detection_claims_element_first() {
        let bbox = BoundingBox::new(0.0, 0.0, 100.0, 40.0);
        let weak = detection(DetectionClass::Button, bbox, 0.5);
        let strong = detection(DetectionClass::Button, BoundingBox::new(2.0, 0.0, 100.0, 40.0), 0.9);
        let e = element(RoleKind::Button, bbox, "Go");

        let pairs = match_device(&[weak, strong], &[e], &policy());
        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].element.is_none());
        assert!(pairs[1].is_matched());
        assert_eq!(pairs[1].id, PairId(1));
    }

    #[test]
    fn unmatched_elements_follow_detections() {
        let d = detection(DetectionClass::Link, BoundingBox::new(0.0, 0.0, 100.0, 20.0), 0.9);
        let far = element(RoleKind::Textbox, BoundingBox::new(500.0, 500.0, 600.0, 520.0), "");
        let pairs = match_device(&[d], &[far], &policy());
        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].element.is_none());
        assert_eq!(pairs[0].score, 0.0);
        assert!(pairs[1].detection.is_none());
        assert_eq!(pairs[1].id, PairId(1));
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut p = policy();
        p.match_threshold = 1.0;
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let pairs = match_device(
            &[detection(DetectionClass::Link, bbox, 0.9)],
            &[element(RoleKind::Link, bbox, "a")],
            &p,
        );
        assert!(!pairs[0].is_matched());
    }

    fn arb_box() -> impl Strategy<Value = BoundingBox> {
        (0.0f64..300.0, 0.0f64..300.0, 1.0f64..120.0, 1.0f64..120.0)
            .prop_map(|(x, y, w, h)| BoundingBox::from_xywh(x, y, w, h))
    }

    proptest! {
        #[test]
        fn assignment_is_one_to_one(
            dets in prop::collection::vec((0usize..7, arb_box(), 0.0f64..=1.0), 0..20),
            elems in prop::collection::vec((0usize..6, arb_box()), 0..20),
        ) {
            let roles = [
                RoleKind::Button,
                RoleKind::Link,
                RoleKind::Textbox,
                RoleKind::Img,
                RoleKind::Generic,
                RoleKind::Heading,
            ];
            let detections: Vec<_> = dets
                .into_iter()
                .map(|(c, b, conf)| detection(DetectionClass::ALL[c], b, conf))
                .collect();
            let elements: Vec<_> = elems
                .into_iter()
                .map(|(r, b)| element(roles[r].clone(), b, ""))
                .collect();

            let pairs = match_device(&detections, &elements, &policy());

            let detection_sides = pairs.iter().filter(|p| p.detection.is_some()).count();
            let element_sides = pairs.iter().filter(|p| p.element.is_some()).count();
            prop_assert_eq!(detection_sides, detections.len());
            prop_assert_eq!(element_sides, elements.len());

            for (i, pair) in pairs.iter().enumerate() {
                prop_assert_eq!(pair.id, PairId(i));
                prop_assert!((0.0..=1.0).contains(&pair.score));
                prop_assert!(pair.detection.is_some() || pair.element.is_some());
                if pair.is_matched() {
                    prop_assert!(pair.score > policy().match_threshold);
                }
            }
        }
    }
}
