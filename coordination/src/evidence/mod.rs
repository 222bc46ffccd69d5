//! Evidence records
//!
//! What the Investigator found and what the Action Executor did. Both are
//! append-only during their stage and read-only afterwards.

pub mod report;

pub use report::{
    payload_summary, remediation_success_fraction, CapabilityResult, ErrorKind,
    InvestigationReport, RemediationAction,
};
