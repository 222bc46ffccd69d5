//! Pre-Close Gate
//!
//! An automated decision must be backed by evidence of a fix:
//! - `auto_retry` needs at least one successful remediation action
//! - `auto_close` needs a successful remediation action or a clean
//!   investigation (results present, none failed)
//!
//! A violation downgrades to `human_review`; it never fails the pipeline.

use tracing::{debug, warn};

use super::report::{GateDecision, GateKind, GateOutcome, GateRule};
use crate::evidence::{InvestigationReport, RemediationAction};
use crate::policy::PolicyDecision;
use crate::taxonomy::Decision;

#[derive(Debug, Clone, Copy, Default)]
pub struct PreCloseGate;

impl PreCloseGate {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate_before_close(
        &self,
        decision: &PolicyDecision,
        report: &InvestigationReport,
        actions: &[RemediationAction],
    ) -> GateDecision {
        let gate = GateKind::PreClose;
        let remediated = actions.iter().any(|a| a.success);

        let verdict = match decision.decision {
            Decision::HumanReview | Decision::Escalate => GateDecision::proceed(
                gate,
                GateRule::NotApplicable,
                format!("`{}` is not automated", decision.decision),
            ),
            Decision::AutoRetry if remediated => GateDecision::proceed(
                gate,
                GateRule::Passed,
                "remediation succeeded",
            ),
            Decision::AutoClose if remediated || report.is_clean() => GateDecision::proceed(
                gate,
                GateRule::Passed,
                if remediated {
                    "remediation succeeded"
                } else {
                    "investigation clean"
                },
            ),
            Decision::AutoRetry => GateDecision::skip(
                gate,
                GateOutcome::SkipToHumanReview,
                GateRule::MissingRemediationSuccess,
                "auto_retry without a successful remediation action",
            ),
            Decision::AutoClose => GateDecision::skip(
                gate,
                GateOutcome::SkipToHumanReview,
                GateRule::MissingRemediationSuccess,
                format!(
                    "auto_close without a successful remediation or clean investigation \
                     ({} failed of {})",
                    report.failed_count(),
                    report.results().len()
                ),
            ),
        };

        if verdict.is_proceed() {
            debug!(decision = %decision.decision, rule = ?verdict.rule, "pre-close gate");
        } else {
            warn!(
                decision = %decision.decision,
                reason = %verdict.reason,
                "pre-close gate downgraded decision"
            );
        }
        verdict
    }
}
