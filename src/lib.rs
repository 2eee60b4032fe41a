//! AccessAudit library
//!
//! Wires capture, the perceivers, the fusion hub and the session store into
//! per-URL audits. The binary and the integration tests build on these
//! modules.

pub mod auditor;
pub mod capture;
pub mod config;
pub mod errors;
pub mod fixtures;
pub mod metrics;
pub mod report;

pub use auditor::{normalize_url, Auditor};
pub use capture::{Capture, DeviceCapture};
pub use errors::{AuditError, CaptureError};
pub use fixtures::{DeviceFixture, FixtureBackend};
pub use report::OutputFormat;
