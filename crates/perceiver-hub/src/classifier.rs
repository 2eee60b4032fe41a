///! Accessibility heuristics over matched pairs
use accessaudit_core_types::{Confidence, DetectionClass, Device};
use accessaudit_policy_center::ClassifierPolicy;
use perceiver_structural::RoleKind;

use crate::compat::is_compatible;
use crate::models::{Detection, Element, Issue, IssueKind, MatchedPair};

/// Runs every heuristic over one device's pairs.
///
/// Findings come out grouped by heuristic in kind order, each group in pair
/// order. Confidences are carried over from the evidence, never recomputed.
pub fn classify(pairs: &[MatchedPair], device: &Device, policy: &ClassifierPolicy) -> Vec<Issue> {
    let ctx = Context {
        device,
        policy,
        nominal: Confidence::saturating(policy.dom_only_confidence),
    };

    let mut issues = Vec::new();
    ghosts(&ctx, pairs, &mut issues);
    missing_labels(&ctx, pairs, &mut issues);
    role_mismatches(&ctx, pairs, &mut issues);
    keyboard_unreachable(&ctx, pairs, &mut issues);
    missing_alt_text(&ctx, pairs, &mut issues);
    small_targets(&ctx, pairs, &mut issues);
    overlaps(&ctx, pairs, &mut issues);
    spacing(&ctx, pairs, &mut issues);
    color_only_links(&ctx, pairs, &mut issues);
    size_mismatches(&ctx, pairs, &mut issues);
    oversized_targets(&ctx, pairs, &mut issues);
    issues
}

struct Context<'a> {
    device: &'a Device,
    policy: &'a ClassifierPolicy,
    nominal: Confidence,
}

impl Context<'_> {
    fn issue(&self, kind: IssueKind, pair: &MatchedPair, confidence: Confidence, message: String) -> Option<Issue> {
        let bbox = pair.bbox()?;
        Some(Issue::new(
            kind,
            confidence,
            bbox,
            self.device.name.as_str(),
            vec![pair.id],
            message,
        ))
    }
}

enum Side<'a> {
    Visual(&'a Detection),
    Matched(&'a Detection, &'a Element),
    Dom(&'a Element),
}

fn side(pair: &MatchedPair) -> Option<Side<'_>> {
    match (&pair.detection, &pair.element) {
        (Some(d), Some(e)) => Some(Side::Matched(d, e)),
        (Some(d), None) => Some(Side::Visual(d)),
        (None, Some(e)) => Some(Side::Dom(e)),
        (None, None) => None,
    }
}

fn describe(element: &Element) -> String {
    format!("<{}> ({})", element.attributes.tag_name.to_ascii_lowercase(), element.role)
}

fn ghosts(ctx: &Context<'_>, pairs: &[MatchedPair], out: &mut Vec<Issue>) {
    for pair in pairs {
        if let Some(Side::Visual(d)) = side(pair) {
            if ctx.policy.ghost_classes.contains(&d.class) {
                let message = format!(
                    "Visible {} has no element in the page structure",
                    d.class
                );
                out.extend(ctx.issue(IssueKind::Ghost, pair, d.confidence, message));
            }
        }
    }
}

fn missing_labels(ctx: &Context<'_>, pairs: &[MatchedPair], out: &mut Vec<Issue>) {
    for pair in pairs {
        let (element, confidence) = match side(pair) {
            Some(Side::Matched(d, e)) => (e, d.confidence),
            Some(Side::Dom(e)) => (e, ctx.nominal),
            _ => continue,
        };
        if element.role.is_interactive() && !element.has_name() {
            let message = format!("{} has no accessible name", describe(element));
            out.extend(ctx.issue(IssueKind::MissingLabel, pair, confidence, message));
        }
    }
}

fn role_mismatches(ctx: &Context<'_>, pairs: &[MatchedPair], out: &mut Vec<Issue>) {
    for pair in pairs {
        if let Some(Side::Matched(d, e)) = side(pair) {
            if d.class.is_interactive() && !is_compatible(d.class, &e.role) {
                let message = if e.role.is_neutral() {
                    format!("Visual {} is coded as {} without a control role", d.class, describe(e))
                } else {
                    format!("Visual {} is announced as {}", d.class, e.role)
                };
                out.extend(ctx.issue(IssueKind::RoleMismatch, pair, d.confidence, message));
            }
        }
    }
}

fn keyboard_unreachable(ctx: &Context<'_>, pairs: &[MatchedPair], out: &mut Vec<Issue>) {
    for pair in pairs {
        if let Some(Side::Matched(d, e)) = side(pair) {
            let interactive = d.class.is_interactive() || e.role.is_interactive();
            if interactive && !e.attributes.tab_reachable {
                let message = format!("{} cannot be reached with the keyboard", describe(e));
                out.extend(ctx.issue(IssueKind::KeyboardUnreachable, pair, d.confidence, message));
            }
        }
    }
}

fn missing_alt_text(ctx: &Context<'_>, pairs: &[MatchedPair], out: &mut Vec<Issue>) {
    for pair in pairs {
        let (element, confidence) = match side(pair) {
            Some(Side::Matched(d, e)) => (e, d.confidence),
            Some(Side::Dom(e)) => (e, ctx.nominal),
            _ => continue,
        };
        if element.role == RoleKind::Img && !element.has_name() {
            let message = format!("{} has no text alternative", describe(element));
            out.extend(ctx.issue(IssueKind::MissingAltText, pair, confidence, message));
        }
    }
}

fn small_targets(ctx: &Context<'_>, pairs: &[MatchedPair], out: &mut Vec<Issue>) {
    let min = ctx.device.min_target_px();
    for pair in pairs {
        let (bbox, confidence) = match side(pair) {
            Some(Side::Matched(d, _)) if d.class.is_interactive() => (d.bbox, d.confidence),
            Some(Side::Dom(e)) if e.role.is_interactive() => (e.bbox, ctx.nominal),
            _ => continue,
        };
        if bbox.width() < min || bbox.height() < min {
            let message = format!(
                "Target is {:.0}x{:.0}px, below the {:.0}px minimum on {}",
                bbox.width(),
                bbox.height(),
                min,
                ctx.device.name
            );
            out.extend(ctx.issue(IssueKind::SmallTarget, pair, confidence, message));
        }
    }
}

/// Pairs with an interactive detection, matched or not
fn interactive_targets(pairs: &[MatchedPair]) -> Vec<(&MatchedPair, &Detection)> {
    pairs
        .iter()
        .filter_map(|pair| match side(pair) {
            Some(Side::Matched(d, _)) | Some(Side::Visual(d)) if d.class.is_interactive() => {
                Some((pair, d))
            }
            _ => None,
        })
        .collect()
}

/// One box sits inside the other, e.g. an icon drawn within its button
fn nested(ctx: &Context<'_>, a: &Detection, b: &Detection) -> bool {
    a.bbox.containment(&b.bbox) >= ctx.policy.nested_containment
}

fn pair_issue(
    ctx: &Context<'_>,
    kind: IssueKind,
    a: (&MatchedPair, &Detection),
    b: (&MatchedPair, &Detection),
    message: String,
) -> Issue {
    Issue::new(
        kind,
        a.1.confidence.min(b.1.confidence),
        a.1.bbox.union(&b.1.bbox),
        ctx.device.name.as_str(),
        vec![a.0.id, b.0.id],
        message,
    )
}

fn overlaps(ctx: &Context<'_>, pairs: &[MatchedPair], out: &mut Vec<Issue>) {
    let targets = interactive_targets(pairs);
    for (i, &a) in targets.iter().enumerate() {
        for &b in &targets[i + 1..] {
            if nested(ctx, a.1, b.1) {
                continue;
            }
            let iou = a.1.bbox.iou(&b.1.bbox);
            if iou > ctx.policy.overlap_iou {
                let message = format!(
                    "{} and {} overlap ({:.0}% IoU)",
                    a.1.class,
                    b.1.class,
                    iou * 100.0
                );
                out.push(pair_issue(ctx, IssueKind::Overlap, a, b, message));
            }
        }
    }
}

fn spacing(ctx: &Context<'_>, pairs: &[MatchedPair], out: &mut Vec<Issue>) {
    if ctx.policy.min_spacing_css <= 0.0 {
        return;
    }
    let min_gap = ctx.device.css_to_px(ctx.policy.min_spacing_css);
    let targets = interactive_targets(pairs);
    for (i, &a) in targets.iter().enumerate() {
        for &b in &targets[i + 1..] {
            if a.1.bbox.intersects(&b.1.bbox) {
                continue;
            }
            let gap = a.1.bbox.edge_distance(&b.1.bbox);
            if gap < min_gap {
                let message = format!(
                    "{} and {} are {:.0}px apart, below {:.0}px",
                    a.1.class, b.1.class, gap, min_gap
                );
                out.push(pair_issue(ctx, IssueKind::InsufficientSpacing, a, b, message));
            }
        }
    }
}

fn color_only_links(ctx: &Context<'_>, pairs: &[MatchedPair], out: &mut Vec<Issue>) {
    for pair in pairs {
        if let Some(Side::Matched(d, e)) = side(pair) {
            let visual_link = matches!(d.class, DetectionClass::Link | DetectionClass::Text);
            let reports_decoration = e.attributes.text_decoration.is_some();
            if visual_link && e.role == RoleKind::Link && reports_decoration && !e.is_underlined() {
                let message = "Link is distinguished by color only (no underline)".to_string();
                out.extend(ctx.issue(IssueKind::ColorOnlyLink, pair, d.confidence, message));
            }
        }
    }
}

fn size_mismatches(ctx: &Context<'_>, pairs: &[MatchedPair], out: &mut Vec<Issue>) {
    let ratio = ctx.device.pixel_ratio;
    for pair in pairs {
        let Some(Side::Matched(d, e)) = side(pair) else {
            continue;
        };
        if !matches!(
            d.class,
            DetectionClass::Button | DetectionClass::Link | DetectionClass::Input
        ) {
            continue;
        }
        let drawn = d.bbox.area() / (ratio * ratio);
        let clickable = e.attributes.css_width * e.attributes.css_height;
        if drawn < ctx.policy.size_mismatch_max_area_css
            && clickable > drawn * ctx.policy.size_mismatch_ratio
        {
            let message = format!(
                "Drawn {} is {:.0}x{:.0} CSS px but its clickable area is {:.0}x{:.0}",
                d.class,
                d.bbox.width() / ratio,
                d.bbox.height() / ratio,
                e.attributes.css_width,
                e.attributes.css_height
            );
            out.extend(ctx.issue(IssueKind::TargetSizeMismatch, pair, d.confidence, message));
        }
    }
}

fn oversized_targets(ctx: &Context<'_>, pairs: &[MatchedPair], out: &mut Vec<Issue>) {
    let ratio = ctx.device.pixel_ratio;
    for pair in pairs {
        let Some(Side::Matched(d, _)) = side(pair) else {
            continue;
        };
        if !matches!(d.class, DetectionClass::Button | DetectionClass::Link) {
            continue;
        }
        let width = d.bbox.width() / ratio;
        let height = d.bbox.height() / ratio;
        if width > ctx.policy.max_target_width_css || height > ctx.policy.max_target_height_css {
            let message = format!(
                "{} spans {:.0}x{:.0} CSS px, larger than {:.0}x{:.0}",
                d.class,
                width,
                height,
                ctx.policy.max_target_width_css,
                ctx.policy.max_target_height_css
            );
            out.extend(ctx.issue(IssueKind::OversizedTarget, pair, d.confidence, message));
        }
    }
}
