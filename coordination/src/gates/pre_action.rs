//! Pre-Action Gate
//!
//! Decides whether remediation may run. Rules are evaluated in order and the
//! first match wins:
//!
//! 1. forced `escalate`       → skip_to_escalate
//! 2. forced `human_review`   → skip_to_human_review
//! 3. confidence < minimum    → skip_to_human_review
//! 4. required evidence absent → skip_to_human_review
//! 5. otherwise               → proceed

use tracing::debug;

use super::report::{GateConfig, GateDecision, GateKind, GateOutcome, GateRule};
use crate::evidence::InvestigationReport;
use crate::incident::ClassificationResult;
use crate::taxonomy::{Decision, IntentEntry};

/// The Pre-Action Gate. Pure; holds only its thresholds.
#[derive(Debug, Clone, Default)]
pub struct PreActionGate {
    config: GateConfig,
}

impl PreActionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn evaluate_before_action(
        &self,
        entry: &IntentEntry,
        classification: &ClassificationResult,
        report: &InvestigationReport,
    ) -> GateDecision {
        let verdict = self.evaluate(entry, classification, report);
        debug!(
            intent = %entry.intent,
            outcome = %verdict.outcome,
            rule = ?verdict.rule,
            "pre-action gate"
        );
        verdict
    }

    fn evaluate(
        &self,
        entry: &IntentEntry,
        classification: &ClassificationResult,
        report: &InvestigationReport,
    ) -> GateDecision {
        let gate = GateKind::PreAction;

        match entry.forced_override {
            Some(Decision::Escalate) => {
                return GateDecision::skip(
                    gate,
                    GateOutcome::SkipToEscalate,
                    GateRule::ForcedEscalate,
                    format!("intent `{}` is always escalated", entry.intent),
                )
            }
            Some(Decision::HumanReview) => {
                return GateDecision::skip(
                    gate,
                    GateOutcome::SkipToHumanReview,
                    GateRule::ForcedHumanReview,
                    format!("intent `{}` always requires human review", entry.intent),
                )
            }
            _ => {}
        }

        if classification.confidence < self.config.min_confidence {
            return GateDecision::skip(
                gate,
                GateOutcome::SkipToHumanReview,
                GateRule::LowConfidence,
                format!(
                    "confidence {:.2} below minimum {:.2}",
                    classification.confidence, self.config.min_confidence
                ),
            );
        }

        if entry.requires_investigation() && report.successful_count() == 0 {
            return GateDecision::skip(
                gate,
                GateOutcome::SkipToHumanReview,
                GateRule::NoEvidence,
                format!(
                    "no successful investigation result ({} attempted)",
                    report.results().len()
                ),
            );
        }

        GateDecision::proceed(
            gate,
            GateRule::Passed,
            format!(
                "confidence {:.2}, {} of {} investigation results succeeded",
                classification.confidence,
                report.successful_count(),
                report.results().len()
            ),
        )
    }
}
