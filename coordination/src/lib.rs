//! Incident Triage Coordination Library
//!
//! Deterministic core of the incident decision pipeline. Nothing in this
//! crate performs I/O or calls a model; every function is a pure mapping from
//! its inputs to a record, so the same inputs always produce the same verdict.
//!
//! # Components
//!
//! - [`taxonomy`]: the intent table (authorized capabilities, forced overrides)
//! - [`incident`]: incident records and classification results
//! - [`evidence`]: investigation reports and remediation action records
//! - [`gates`]: the Pre-Action and Pre-Close safety gates
//! - [`policy`]: weighted scoring and decision mapping
//! - [`rca`]: the root-cause document assembled for every incident
//!
//! # Flow
//!
//! ```text
//! Incident ──classify──▶ ClassificationResult
//!          ──investigate──▶ InvestigationReport
//!          ──PreActionGate──▶ GateDecision ──(proceed)──▶ Vec<RemediationAction>
//!          ──PolicyEngine──▶ PolicyDecision
//!          ──PreCloseGate──▶ GateDecision
//!          ──assemble──▶ RcaDocument
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod error;
pub mod evidence;
pub mod gates;
pub mod incident;
pub mod policy;
pub mod rca;
pub mod taxonomy;

pub use error::{TriageError, TriageResult};

pub use evidence::{
    payload_summary, remediation_success_fraction, CapabilityResult, ErrorKind,
    InvestigationReport, RemediationAction,
};

pub use gates::{
    GateConfig, GateDecision, GateKind, GateOutcome, GateRule, Guardrail, PreActionGate,
    PreCloseGate,
};

pub use incident::{parse_incidents, ClassificationResult, ClassificationSource, Incident};

pub use policy::{PolicyConfig, PolicyDecision, PolicyEngine, PolicyWeights, ScoreBreakdown};

pub use rca::{RcaDocument, RcaParts, StageTransition, RCA_SCHEMA_VERSION};

pub use taxonomy::{
    Decision, IntentEntry, IntentTaxonomy, RemediationCapability, TaxonomyFile, UNKNOWN_INTENT,
};
