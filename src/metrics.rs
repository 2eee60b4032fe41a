use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use once_cell::sync::{Lazy, OnceCell};
use perceiver_hub::{AuditRecord, DeviceReport};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info};

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

static AUDITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("accessaudit_audits_total", "Completed audit runs")
        .expect("create accessaudit_audits_total")
});

static DEVICE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "accessaudit_device_failures_total",
            "Device pipelines that produced no findings, by failure kind",
        ),
        &["kind"],
    )
    .expect("create accessaudit_device_failures_total")
});

static ISSUES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("accessaudit_issues_total", "Reported findings, by issue kind"),
        &["kind"],
    )
    .expect("create accessaudit_issues_total")
});

static ANOMALIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "accessaudit_anomalies_total",
            "Dropped detector rows and DOM elements",
        ),
        &["source"],
    )
    .expect("create accessaudit_anomalies_total")
});

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();
        for collector in [
            Box::new(AUDITS_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(DEVICE_FAILURES.clone()),
            Box::new(ISSUES_TOTAL.clone()),
            Box::new(ANOMALIES_TOTAL.clone()),
        ] {
            if let Err(err) = registry.register(collector) {
                error!(?err, "failed to register audit metrics");
            }
        }
    });
}

/// Counts one finished audit and everything its device reports carry.
pub fn record_audit(record: &AuditRecord) {
    register_metrics();
    AUDITS_TOTAL.inc();
    for report in &record.devices {
        record_device(report);
    }
}

fn record_device(report: &DeviceReport) {
    if let Some(kind) = report.failure_kind() {
        DEVICE_FAILURES.with_label_values(&[kind.as_str()]).inc();
    }
    for issue in report.issues() {
        ISSUES_TOTAL
            .with_label_values(&[issue.kind.as_str()])
            .inc();
    }
    if !report.detection_anomalies.is_empty() {
        ANOMALIES_TOTAL
            .with_label_values(&["detector"])
            .inc_by(report.detection_anomalies.len() as u64);
    }
    if !report.element_anomalies.is_empty() {
        ANOMALIES_TOTAL
            .with_label_values(&["dom"])
            .inc_by(report.element_anomalies.len() as u64);
    }
}

pub fn spawn_metrics_server(port: u16) -> Option<JoinHandle<()>> {
    if port == 0 {
        return None;
    }

    register_metrics();
    let registry = Arc::new(global_registry().clone());
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(registry);

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(%addr, "metrics server listening");
    Some(tokio::spawn(async move {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(err) = axum::serve(listener, app.into_make_service()).await {
                    error!(?err, "metrics server exited with error");
                }
            }
            Err(err) => {
                error!(?err, "failed to bind metrics listener");
            }
        }
    }))
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> Response {
    match render(&registry) {
        Ok((content_type, body)) => {
            ([(axum::http::header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(message) => {
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
        }
    }
}

fn render(registry: &Registry) -> Result<(HeaderValue, String), &'static str> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&registry.gather(), &mut buffer) {
        error!(?err, "failed to encode prometheus metrics");
        return Err("metric encode error");
    }
    let body = String::from_utf8(buffer).map_err(|err| {
        error!(?err, "failed to convert prometheus metrics to utf8");
        "metric encode error"
    })?;
    let content_type = HeaderValue::from_str(encoder.format_type()).map_err(|err| {
        error!(?err, "failed to build content-type header");
        "metric encode error"
    })?;
    Ok((content_type, body))
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}
