//! Rendering of audit records for the terminal.

use std::fmt::Write as _;

use anyhow::Result;
use perceiver_hub::{AuditRecord, DeviceReport, DeviceStatus, Issue};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Serializes any payload in the machine-readable formats.
pub fn render_structured<T: Serialize + ?Sized>(payload: &T, output: OutputFormat) -> Result<Option<String>> {
    Ok(match output {
        OutputFormat::Json => Some(serde_json::to_string_pretty(payload)?),
        OutputFormat::Yaml => Some(serde_yaml::to_string(payload)?),
        OutputFormat::Human => None,
    })
}

pub fn render_records(records: &[&AuditRecord], output: OutputFormat, explain: bool) -> Result<String> {
    if let Some(text) = render_structured(records, output)? {
        return Ok(text);
    }
    let mut out = String::new();
    for (index, record) in records.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&render_human(record, explain));
    }
    Ok(out)
}

pub fn render_human(record: &AuditRecord, explain: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Audit {} of {} (session {}, {})",
        record.id,
        record.url,
        record.session,
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for report in &record.devices {
        render_device(&mut out, report, explain);
    }
    let failed = record.failed_devices().count();
    let _ = writeln!(
        out,
        "Total: {} issue(s) across {} device(s){}",
        record.issue_count(),
        record.devices.len(),
        if failed > 0 {
            format!(", {failed} failed")
        } else {
            String::new()
        }
    );
    out
}

fn render_device(out: &mut String, report: &DeviceReport, explain: bool) {
    match &report.status {
        DeviceStatus::Failed { kind, reason } => {
            let _ = writeln!(out, "  {}: FAILED ({kind}) {reason}", report.device);
        }
        DeviceStatus::Ok => {
            let _ = writeln!(
                out,
                "  {}: {} issue(s), {} detection(s) kept of {} ({} suppressed), {}ms",
                report.device,
                report.issues().len(),
                report.dedup.kept,
                report.dedup.raw,
                report.dedup.suppressed,
                report.elapsed_ms
            );
            let anomalies = report.detection_anomalies.len() + report.element_anomalies.len();
            if anomalies > 0 {
                let _ = writeln!(out, "    {anomalies} malformed input(s) dropped");
            }
            for (rank, issue) in report.issues().iter().enumerate() {
                render_issue(out, rank + 1, issue, explain);
            }
        }
    }
}

fn render_issue(out: &mut String, rank: usize, issue: &Issue, explain: bool) {
    let b = &issue.bbox;
    let criterion = issue
        .wcag
        .as_deref()
        .map(|wcag| format!(" (WCAG {wcag})"))
        .unwrap_or_default();
    let _ = writeln!(
        out,
        "    {rank}. [{}] {}{criterion} confidence {:.2} at ({:.0},{:.0})-({:.0},{:.0}): {}",
        issue.severity,
        issue.kind,
        issue.confidence.value(),
        b.x1,
        b.y1,
        b.x2,
        b.y2,
        issue.message
    );
    if explain {
        let _ = writeln!(out, "       why: {}", issue.kind.explanation());
    }
}
