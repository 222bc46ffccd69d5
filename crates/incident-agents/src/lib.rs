//! Async incident triage runtime.
//!
//! Wires the deterministic core in `coordination` to real collaborators:
//! capability providers, classifiers, RCA storage and telemetry. The entry
//! point is [`Pipeline`], which turns one incident into an
//! [`IncidentOutcome`] plus a stored RCA document.

pub mod agents;
pub mod capabilities;
pub mod config;
pub mod orchestrator;
pub mod rca;
pub mod state_machine;
pub mod telemetry;

pub use config::TriageConfig;
pub use orchestrator::{IncidentOutcome, Pipeline, RunStatus, ORCHESTRATION_MODE};
