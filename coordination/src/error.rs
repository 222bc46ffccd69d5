//! Triage error taxonomy
//!
//! Every failure the decision pipeline can observe is one of these variants.
//! Most of them never reach the caller: the pipeline absorbs them into
//! structured records (a failed capability result, a downgraded decision, a
//! persistence flag) and always produces an incident result.
//!
//! | Variant              | Absorbed | Pipeline effect                        |
//! |----------------------|----------|----------------------------------------|
//! | InvalidIncident      | yes      | short-circuit to `human_review`        |
//! | CapabilityInvocation | yes      | failed `CapabilityResult`              |
//! | GateViolation        | yes      | decision downgraded to `human_review`  |
//! | Persistence          | yes      | result marks RCA persistence as failed |
//! | Classification       | yes      | zero confidence, `human_review`        |
//! | Taxonomy             | no       | startup failure                        |
//! | Config               | no       | startup failure                        |

use thiserror::Error;

/// Result type alias for triage operations
pub type TriageResult<T> = Result<T, TriageError>;

/// Errors raised by the incident decision pipeline
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TriageError {
    /// The incident record is malformed (e.g. empty short description)
    #[error("invalid incident: {reason}")]
    InvalidIncident { reason: String },

    /// A capability call failed (timeout, remote error, transport error)
    #[error("capability `{capability}` failed: {message}")]
    CapabilityInvocation { capability: String, message: String },

    /// A close-time safety check rejected the decision
    #[error("gate `{gate}` violated: {reason}")]
    GateViolation { gate: String, reason: String },

    /// The RCA document could not be durably stored
    #[error("RCA persistence failed: {reason}")]
    Persistence { reason: String },

    /// The intent classifier was unavailable or returned garbage
    #[error("classification failed: {reason}")]
    Classification { reason: String },

    /// The intent taxonomy is inconsistent
    #[error("invalid taxonomy: {reason}")]
    Taxonomy { reason: String },

    /// A configuration value is out of range
    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl TriageError {
    /// Stable snake_case code for logs and result payloads
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIncident { .. } => "invalid_incident",
            Self::CapabilityInvocation { .. } => "capability_invocation",
            Self::GateViolation { .. } => "gate_violation",
            Self::Persistence { .. } => "persistence",
            Self::Classification { .. } => "classification",
            Self::Taxonomy { .. } => "taxonomy",
            Self::Config { .. } => "config",
        }
    }

    /// Whether the pipeline converts this error into a record instead of
    /// propagating it to the caller.
    pub fn is_absorbed(&self) -> bool {
        !matches!(self, Self::Taxonomy { .. } | Self::Config { .. })
    }

    pub fn invalid_incident(reason: impl Into<String>) -> Self {
        Self::InvalidIncident {
            reason: reason.into(),
        }
    }

    pub fn classification(reason: impl Into<String>) -> Self {
        Self::Classification {
            reason: reason.into(),
        }
    }

    pub fn persistence(reason: impl Into<String>) -> Self {
        Self::Persistence {
            reason: reason.into(),
        }
    }

    pub fn taxonomy(reason: impl Into<String>) -> Self {
        Self::Taxonomy {
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}
