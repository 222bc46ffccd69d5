//! Policy Engine — weighted scoring and decision mapping
//!
//! ```text
//! s = (w_c·confidence + w_i·investigation + w_r·remediation) / Σw
//!
//!   s ≥ auto_close_threshold                     → auto_close
//!   s ≥ auto_retry_threshold ∧ remediation ok    → auto_retry
//!   s ≥ auto_retry_threshold ∧ no remediation ok → human_review
//!   s <  auto_retry_threshold                    → escalate
//! ```
//!
//! A taxonomy forced override short-circuits scoring (`score = 0`).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TriageError, TriageResult};
use crate::evidence::{remediation_success_fraction, InvestigationReport, RemediationAction};
use crate::gates::GateDecision;
use crate::incident::ClassificationResult;
use crate::taxonomy::{Decision, IntentEntry};

/// Relative weight of each signal. Normalized by their sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyWeights {
    pub confidence: f64,
    pub investigation: f64,
    pub remediation: f64,
}

impl Default for PolicyWeights {
    fn default() -> Self {
        Self {
            confidence: 0.4,
            investigation: 0.3,
            remediation: 0.3,
        }
    }
}

impl PolicyWeights {
    pub fn total(&self) -> f64 {
        self.confidence + self.investigation + self.remediation
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub auto_close_threshold: f64,
    pub auto_retry_threshold: f64,
    pub weights: PolicyWeights,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            auto_close_threshold: 0.8,
            auto_retry_threshold: 0.5,
            weights: PolicyWeights::default(),
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> TriageResult<()> {
        let w = &self.weights;
        for (name, value) in [
            ("confidence", w.confidence),
            ("investigation", w.investigation),
            ("remediation", w.remediation),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(TriageError::config(format!(
                    "policy weight `{name}` must be a non-negative number, got {value}"
                )));
            }
        }
        if w.total() <= 0.0 {
            return Err(TriageError::config("policy weights must not all be zero"));
        }
        for (name, value) in [
            ("auto_close_threshold", self.auto_close_threshold),
            ("auto_retry_threshold", self.auto_retry_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TriageError::config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.auto_retry_threshold > self.auto_close_threshold {
            return Err(TriageError::config(format!(
                "auto_retry_threshold {} exceeds auto_close_threshold {}",
                self.auto_retry_threshold, self.auto_close_threshold
            )));
        }
        Ok(())
    }
}

/// The three input signals and the combined score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub confidence: f64,
    pub investigation: f64,
    pub remediation: f64,
    pub score: f64,
}

/// Exactly one per incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub decision: Decision,
    /// In [0, 1]; 0 when a forced override applied
    pub score: f64,
    pub reasoning: String,
    #[serde(default)]
    pub override_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
}

pub struct PolicyEngine {
    config: PolicyConfig,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self {
            config: PolicyConfig::default(),
        }
    }

    pub fn with_config(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Weighted, normalized score of the three signals
    pub fn score(
        &self,
        classification: &ClassificationResult,
        report: &InvestigationReport,
        actions: &[RemediationAction],
    ) -> ScoreBreakdown {
        let w = &self.config.weights;
        let confidence = classification.confidence.clamp(0.0, 1.0);
        let investigation = report.success_fraction();
        let remediation = remediation_success_fraction(actions);

        let total = w.total();
        let score = if total > 0.0 {
            (w.confidence * confidence + w.investigation * investigation + w.remediation * remediation)
                / total
        } else {
            0.0
        };

        ScoreBreakdown {
            confidence,
            investigation,
            remediation,
            score: score.clamp(0.0, 1.0),
        }
    }

    /// Map a score to a decision. Mid-band scores without a successful
    /// remediation fall to the more conservative `human_review`.
    pub fn map_score(&self, score: f64, any_remediation_succeeded: bool) -> Decision {
        if score >= self.config.auto_close_threshold {
            Decision::AutoClose
        } else if score >= self.config.auto_retry_threshold {
            if any_remediation_succeeded {
                Decision::AutoRetry
            } else {
                Decision::HumanReview
            }
        } else {
            Decision::Escalate
        }
    }

    pub fn apply_policy_decision(
        &self,
        entry: &IntentEntry,
        classification: &ClassificationResult,
        report: &InvestigationReport,
        actions: &[RemediationAction],
        pre_action: &GateDecision,
    ) -> PolicyDecision {
        if let Some(forced) = entry.forced_override {
            debug!(intent = %entry.intent, decision = %forced, "forced override");
            return PolicyDecision {
                decision: forced,
                score: 0.0,
                reasoning: format!(
                    "forced override for intent `{}`: {}",
                    entry.intent, pre_action.reason
                ),
                override_applied: true,
                breakdown: None,
            };
        }

        let breakdown = self.score(classification, report, actions);
        let signals = format!(
            "score {:.3} (confidence {:.2}, investigation {:.2}, remediation {:.2})",
            breakdown.score, breakdown.confidence, breakdown.investigation, breakdown.remediation
        );

        if let Some(enforced) = pre_action.outcome.enforced_decision() {
            return PolicyDecision {
                decision: enforced,
                score: breakdown.score,
                reasoning: format!("pre-action gate: {}; {}", pre_action.reason, signals),
                override_applied: false,
                breakdown: Some(breakdown),
            };
        }

        let any_success = actions.iter().any(|a| a.success);
        let decision = self.map_score(breakdown.score, any_success);
        let reasoning = match decision {
            Decision::HumanReview => {
                format!("{signals}; no successful remediation to justify auto_retry")
            }
            _ => format!("{signals} → {decision}"),
        };
        debug!(intent = %entry.intent, %decision, score = breakdown.score, "policy decision");

        PolicyDecision {
            decision,
            score: breakdown.score,
            reasoning,
            override_applied: false,
            breakdown: Some(breakdown),
        }
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}
