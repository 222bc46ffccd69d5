//! RCA document — the auditable record produced for every incident
//!
//! Assembled once per pipeline run on every exit path. Early exits leave the
//! later stage slots empty and set `partial` when the run was cut short.
//! The body is fingerprinted with blake3 so a stored document can be checked
//! for tampering or truncation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TriageError, TriageResult};
use crate::evidence::{InvestigationReport, RemediationAction};
use crate::gates::{GateDecision, Guardrail};
use crate::incident::{ClassificationResult, Incident};
use crate::policy::PolicyDecision;
use crate::taxonomy::Decision;

/// Current document schema version
pub const RCA_SCHEMA_VERSION: u32 = 1;

/// One pipeline stage transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: String,
    pub to: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Everything the pipeline collected, handed to [`RcaDocument::assemble`]
#[derive(Debug, Clone)]
pub struct RcaParts {
    pub incident: Incident,
    pub classification: Option<ClassificationResult>,
    pub investigation: Option<InvestigationReport>,
    pub pre_action_gate: Option<GateDecision>,
    pub remediation: Vec<RemediationAction>,
    pub policy: Option<PolicyDecision>,
    pub pre_close_gate: Option<GateDecision>,
    pub final_decision: Decision,
    pub final_reasoning: String,
    pub guardrails: Vec<Guardrail>,
    pub stages: Vec<StageTransition>,
    pub partial: bool,
}

impl RcaParts {
    /// Parts for an incident that has not been through any stage yet
    pub fn new(incident: Incident) -> Self {
        Self {
            incident,
            classification: None,
            investigation: None,
            pre_action_gate: None,
            remediation: Vec::new(),
            policy: None,
            pre_close_gate: None,
            final_decision: Decision::HumanReview,
            final_reasoning: String::new(),
            guardrails: Vec::new(),
            stages: Vec::new(),
            partial: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcaDocument {
    pub schema_version: u32,
    pub document_id: Uuid,
    pub incident_id: String,
    pub incident: Incident,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investigation: Option<InvestigationReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_action_gate: Option<GateDecision>,
    #[serde(default)]
    pub remediation: Vec<RemediationAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_close_gate: Option<GateDecision>,
    pub final_decision: Decision,
    pub final_reasoning: String,
    #[serde(default)]
    pub guardrails: Vec<Guardrail>,
    #[serde(default)]
    pub stages: Vec<StageTransition>,
    #[serde(default)]
    pub partial: bool,
    pub generated_at: DateTime<Utc>,
    /// blake3 hex digest of the document with this field empty
    #[serde(default)]
    pub content_digest: String,
}

impl RcaDocument {
    /// Assemble a fresh document. Every call yields a new `document_id`, so
    /// re-running an incident never collides with an earlier record.
    pub fn assemble(parts: RcaParts) -> TriageResult<Self> {
        let mut doc = Self {
            schema_version: RCA_SCHEMA_VERSION,
            document_id: Uuid::new_v4(),
            incident_id: parts.incident.id.clone(),
            incident: parts.incident,
            classification: parts.classification,
            investigation: parts.investigation,
            pre_action_gate: parts.pre_action_gate,
            remediation: parts.remediation,
            policy: parts.policy,
            pre_close_gate: parts.pre_close_gate,
            final_decision: parts.final_decision,
            final_reasoning: parts.final_reasoning,
            guardrails: parts.guardrails,
            stages: parts.stages,
            partial: parts.partial,
            generated_at: Utc::now(),
            content_digest: String::new(),
        };
        doc.content_digest = doc.compute_digest()?;
        Ok(doc)
    }

    fn compute_digest(&self) -> TriageResult<String> {
        let mut body = self.clone();
        body.content_digest.clear();
        let bytes = serde_json::to_vec(&body)
            .map_err(|e| TriageError::persistence(format!("serialize RCA body: {e}")))?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    /// Whether the stored digest matches the body
    pub fn verify_digest(&self) -> bool {
        self.compute_digest()
            .map(|d| d == self.content_digest)
            .unwrap_or(false)
    }

    /// Names of stages the run entered, in order
    pub fn stages_completed(&self) -> Vec<&str> {
        self.stages.iter().map(|t| t.to.as_str()).collect()
    }

    pub fn to_json(&self) -> TriageResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TriageError::persistence(format!("serialize RCA: {e}")))
    }

    /// Parse a stored document, rejecting schema versions newer than ours
    pub fn from_json(json: &str) -> TriageResult<Self> {
        let doc: Self = serde_json::from_str(json)
            .map_err(|e| TriageError::persistence(format!("parse RCA: {e}")))?;
        if doc.schema_version > RCA_SCHEMA_VERSION {
            return Err(TriageError::persistence(format!(
                "RCA schema version {} is newer than supported {}",
                doc.schema_version, RCA_SCHEMA_VERSION
            )));
        }
        Ok(doc)
    }
}
