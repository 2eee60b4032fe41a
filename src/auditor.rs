//! Audit orchestration: one pipeline per device, fanned out and joined.
//!
//! [`Auditor::run_audit`] never fails because of a single device. Capture,
//! detector and tree-walker failures, timeouts and cancellations are folded
//! into that device's [`DeviceReport`]; the run itself only errs on a URL that
//! cannot be audited.

use std::sync::Arc;
use std::time::Duration;

use accessaudit_core_types::{Device, SessionId};
use accessaudit_policy_center::AuditPolicy;
use accessaudit_state_center::SessionStore;
use perceiver_hub::{
    AuditRecord, DeviceReport, FailureKind, HubError, PerceptionHub, PerceptionHubImpl,
    StructuralPerceiverImpl, VisualPerceiverImpl,
};
use perceiver_structural::DomExtractor;
use perceiver_visual::Detector;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;

use crate::capture::DeviceCapture;
use crate::errors::AuditError;
use crate::metrics;

pub struct Auditor {
    policy: Arc<AuditPolicy>,
    capture: Arc<dyn DeviceCapture>,
    hub: Arc<dyn PerceptionHub>,
    store: Arc<dyn SessionStore>,
    shutdown: CancellationToken,
}

impl Auditor {
    /// Validates `policy` before wiring the pipeline; an invalid policy never
    /// reaches a device.
    pub fn new(
        policy: AuditPolicy,
        capture: Arc<dyn DeviceCapture>,
        detector: Arc<dyn Detector>,
        extractor: Arc<dyn DomExtractor>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, AuditError> {
        policy.validate()?;
        let policy = Arc::new(policy);
        let hub = PerceptionHubImpl::new(
            Arc::new(StructuralPerceiverImpl::new(extractor)),
            Arc::new(VisualPerceiverImpl::new(detector)),
            Arc::clone(&policy),
        );
        Ok(Self {
            policy,
            capture,
            hub: Arc::new(hub),
            store,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    pub async fn run_audit(
        &self,
        session: &SessionId,
        url: &str,
    ) -> Result<Arc<AuditRecord>, AuditError> {
        let url = normalize_url(url)?;
        let started = Instant::now();
        info!(session = %session, url = %url, devices = self.policy.devices.len(), "audit started");

        let budget = Duration::from_millis(self.policy.timeouts_ms.device);
        let mut tasks = JoinSet::new();
        for (slot, device) in self.policy.devices.iter().cloned().enumerate() {
            let span = info_span!("device_pipeline", device = %device.name, url = %url);
            let pipeline = DevicePipeline {
                capture: Arc::clone(&self.capture),
                hub: Arc::clone(&self.hub),
                cancel: self.shutdown.child_token(),
                budget,
            };
            let url = url.clone();
            tasks.spawn(
                async move {
                    let report = pipeline.run(&url, &device).await;
                    (slot, report)
                }
                .instrument(span),
            );
        }

        let mut slots: Vec<Option<DeviceReport>> = vec![None; self.policy.devices.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, report)) => slots[slot] = Some(report),
                Err(err) => warn!(?err, "device pipeline task died"),
            }
        }

        let devices = slots
            .into_iter()
            .zip(&self.policy.devices)
            .map(|(report, device)| {
                report.unwrap_or_else(|| {
                    DeviceReport::failed(
                        device.name.clone(),
                        FailureKind::Aborted,
                        "device pipeline task died",
                    )
                })
            })
            .collect();

        let record = Arc::new(AuditRecord::new(session.clone(), url.as_str(), devices));
        if let Err(err) = self.store.append(Arc::clone(&record)).await {
            warn!(%err, audit = %record.id, "audit record not stored");
        }
        metrics::record_audit(&record);

        info!(
            session = %session,
            audit = %record.id,
            issues = record.issue_count(),
            failed_devices = record.failed_devices().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "audit finished"
        );
        Ok(record)
    }

    /// Every audit of the session, oldest first.
    pub fn get_history(&self, session: &SessionId) -> Vec<Arc<AuditRecord>> {
        self.store.history(session)
    }

    pub fn latest_for_url(&self, session: &SessionId, url: &str) -> Option<Arc<AuditRecord>> {
        let url = normalize_url(url).ok()?;
        self.store.latest_for_url(session, url.as_str())
    }

    /// Ends a session and drops its history.
    pub fn end_session(&self, session: &SessionId) -> usize {
        self.store.end_session(session)
    }

    /// Drops sessions idle longer than the policy's session TTL.
    pub fn evict_idle_sessions(&self) -> usize {
        self.store
            .evict_idle(Duration::from_secs(self.policy.session.idle_ttl_secs))
    }

    /// Aborts in-flight device pipelines; later runs report every device as
    /// aborted.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

struct DevicePipeline {
    capture: Arc<dyn DeviceCapture>,
    hub: Arc<dyn PerceptionHub>,
    cancel: CancellationToken,
    budget: Duration,
}

impl DevicePipeline {
    async fn run(self, url: &Url, device: &Device) -> DeviceReport {
        let started = Instant::now();
        let deadline = started + self.budget;
        let budget_ms = self.budget.as_millis();
        let work = async {
            let capture = tokio::time::timeout_at(deadline, self.capture.capture(url, device))
                .await
                .map_err(|_| {
                    (
                        FailureKind::Capture,
                        format!("capture timed out after {budget_ms}ms"),
                    )
                })?
                .map_err(|err| (FailureKind::Capture, err.to_string()))?;
            self.hub
                .perceive_until(device, &capture.screenshot, &capture.page, deadline)
                .await
                .map_err(|err| match err {
                    HubError::TimedOut { stage } => {
                        (stage, format!("{stage} timed out after {budget_ms}ms"))
                    }
                    err => (err.failure_kind(), err.to_string()),
                })
        };

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err((FailureKind::Aborted, "audit cancelled".to_string()))
            }
            result = work => result,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(mut report) => {
                report.elapsed_ms = elapsed_ms;
                debug!(issues = report.issues().len(), elapsed_ms, "device pipeline complete");
                report
            }
            Err((kind, reason)) => {
                warn!(kind = %kind, %reason, elapsed_ms, "device pipeline failed");
                let mut report = DeviceReport::failed(device.name.clone(), kind, reason);
                report.elapsed_ms = elapsed_ms;
                report
            }
        }
    }
}

/// Parses a user-entered address; bare hosts are audited over https.
pub fn normalize_url(raw: &str) -> Result<Url, AuditError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuditError::invalid_url(raw, "empty url"));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).map_err(|err| AuditError::invalid_url(raw, err.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AuditError::invalid_url(
                raw,
                format!("unsupported scheme {other}"),
            ))
        }
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(AuditError::invalid_url(raw, "missing host"));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hosts_default_to_https() {
        let url = normalize_url("  example.com/docs ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/docs");
        let url = normalize_url("http://localhost:8080").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/");
    }

    #[test]
    fn unusable_urls_are_rejected() {
        for raw in ["", "   ", "ftp://example.com", "https://", "http://exa mple.com"] {
            assert!(
                matches!(normalize_url(raw), Err(AuditError::InvalidUrl { .. })),
                "{raw:?} accepted"
            );
        }
    }
}
