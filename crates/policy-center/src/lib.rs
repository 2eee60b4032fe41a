//! Named thresholds and device profiles for the fusion engine.
//!
//! Every tunable the pipeline reads lives in [`AuditPolicy`]. Values start from
//! [`default_policy`] and are layered with YAML files and environment overlays
//! by [`load_policy`]; [`AuditPolicy::validate`] is the gate an auditor passes
//! before any run starts.

pub mod defaults;
pub mod errors;
pub mod loader;
pub mod model;

pub use defaults::default_policy;
pub use errors::PolicyError;
pub use loader::{load_policy, load_policy_with_options, LoadOptions};
pub use model::{
    AuditPolicy, ClassifierPolicy, DedupPolicy, MatcherPolicy, PolicyProvenance, PolicySource,
    SessionPolicy, SpotlightPolicy, TimeoutPolicy,
};

#[cfg(test)]
mod tests;
