//! Gate verdict types shared by both gates

use serde::{Deserialize, Serialize};

use crate::taxonomy::Decision;

/// What a gate allows the pipeline to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    Proceed,
    SkipToEscalate,
    SkipToHumanReview,
}

impl GateOutcome {
    /// Decision the gate enforces, if it enforces one
    pub fn enforced_decision(self) -> Option<Decision> {
        match self {
            Self::Proceed => None,
            Self::SkipToEscalate => Some(Decision::Escalate),
            Self::SkipToHumanReview => Some(Decision::HumanReview),
        }
    }
}

impl std::fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Proceed => write!(f, "proceed"),
            Self::SkipToEscalate => write!(f, "skip_to_escalate"),
            Self::SkipToHumanReview => write!(f, "skip_to_human_review"),
        }
    }
}

/// Which rule produced a gate verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateRule {
    /// Taxonomy forces `escalate`
    ForcedEscalate,
    /// Taxonomy forces `human_review`
    ForcedHumanReview,
    /// Classifier confidence under the configured minimum
    LowConfidence,
    /// Investigation was required but produced no successful result
    NoEvidence,
    /// An automated decision without a successful remediation or clean evidence
    MissingRemediationSuccess,
    /// Decision is not automated; nothing to check
    NotApplicable,
    Passed,
}

/// Where a guardrail was enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    PreAction,
    PreClose,
    /// Incident was invalid or the run was cut short
    Pipeline,
}

impl std::fmt::Display for GateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreAction => write!(f, "pre_action"),
            Self::PreClose => write!(f, "pre_close"),
            Self::Pipeline => write!(f, "pipeline"),
        }
    }
}

/// One gate invocation's verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub gate: GateKind,
    pub outcome: GateOutcome,
    pub rule: GateRule,
    pub reason: String,
}

impl GateDecision {
    pub fn proceed(gate: GateKind, rule: GateRule, reason: impl Into<String>) -> Self {
        Self {
            gate,
            outcome: GateOutcome::Proceed,
            rule,
            reason: reason.into(),
        }
    }

    pub fn skip(
        gate: GateKind,
        outcome: GateOutcome,
        rule: GateRule,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            gate,
            outcome,
            rule,
            reason: reason.into(),
        }
    }

    pub fn is_proceed(&self) -> bool {
        self.outcome == GateOutcome::Proceed
    }

    /// Guardrail record for a non-proceed verdict.
    ///
    /// `original` is the decision the gate overrode, if one existed yet.
    pub fn guardrail(&self, original: Option<Decision>) -> Option<Guardrail> {
        self.outcome.enforced_decision().map(|enforced| Guardrail {
            gate: self.gate,
            rule: self.rule,
            original,
            enforced,
            reason: self.reason.clone(),
        })
    }
}

/// A recorded downgrade or forced decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guardrail {
    pub gate: GateKind,
    pub rule: GateRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<Decision>,
    pub enforced: Decision,
    pub reason: String,
}

impl Guardrail {
    /// Guardrail for a run that ended before the gates could speak
    pub fn pipeline(enforced: Decision, reason: impl Into<String>) -> Self {
        Self {
            gate: GateKind::Pipeline,
            rule: GateRule::NotApplicable,
            original: None,
            enforced,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Guardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.original {
            Some(original) => write!(
                f,
                "{}: {} -> {} ({})",
                self.gate, original, self.enforced, self.reason
            ),
            None => write!(f, "{}: {} ({})", self.gate, self.enforced, self.reason),
        }
    }
}

/// Gate thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Classifications below this confidence never trigger remediation
    pub min_confidence: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
        }
    }
}
