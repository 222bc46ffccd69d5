//! Action Executor — sequential, fail-fast remediation.
//!
//! Remediation capabilities run one at a time in taxonomy order. A failed
//! step is recorded and later steps still run, except that no further
//! destructive step is issued once a destructive step has failed.

use std::sync::Arc;
use std::time::Duration;

use coordination::{
    payload_summary, Incident, IntentEntry, InvestigationReport, RemediationAction,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::capabilities::{invoke_timed, AuthorizedProvider, CapabilityProvider, Scope};

/// Root causes a retry cannot fix
const PERMANENT_FAILURE_INDICATORS: &[&str] = &[
    "permission denied",
    "access denied",
    "authorization",
    "syntax error",
    "compilation error",
    "code bug",
    "schema mismatch",
    "invalid configuration",
];

/// The first permanent-failure indicator found in successful evidence.
pub fn permanent_failure_indicator(report: &InvestigationReport) -> Option<&'static str> {
    report
        .successful_payloads()
        .filter_map(payload_summary)
        .map(|text| text.to_lowercase())
        .find_map(|text| {
            PERMANENT_FAILURE_INDICATORS
                .iter()
                .copied()
                .find(|indicator| text.contains(indicator))
        })
}

/// Detail on an action whose call was still in flight when the run stopped
pub const INTERRUPTED_DETAIL: &str = "interrupted before the call returned";

pub struct ActionExecutor {
    provider: Arc<dyn CapabilityProvider>,
    timeout: Duration,
}

impl ActionExecutor {
    pub fn new(provider: Arc<dyn CapabilityProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub async fn execute_remediation(
        &self,
        entry: &IntentEntry,
        incident: &Incident,
        report: &InvestigationReport,
    ) -> Vec<RemediationAction> {
        let mut actions = Vec::with_capacity(entry.remediation_capabilities.len());
        self.execute_remediation_into(entry, incident, report, &mut actions)
            .await;
        actions
    }

    /// Like [`execute_remediation`](Self::execute_remediation), but records
    /// into `actions` as it goes so an interrupted run keeps every invoked step.
    ///
    /// Each action is pushed as an interrupted failure before it is invoked
    /// and replaced with the real result once the call returns.
    pub async fn execute_remediation_into(
        &self,
        entry: &IntentEntry,
        incident: &Incident,
        report: &InvestigationReport,
        actions: &mut Vec<RemediationAction>,
    ) {
        if let Some(indicator) = permanent_failure_indicator(report) {
            info!(
                incident_id = %incident.id,
                indicator,
                "permanent failure in evidence, remediation skipped"
            );
            return;
        }

        let provider = AuthorizedProvider::new(self.provider.clone(), entry, Scope::Remediation);
        let params = Self::parameters(entry, incident, report);
        let mut destructive_failed = false;

        for capability in &entry.remediation_capabilities {
            if capability.destructive && destructive_failed {
                warn!(
                    incident_id = %incident.id,
                    capability = %capability.name,
                    "withholding destructive action after earlier destructive failure"
                );
                continue;
            }

            actions.push(RemediationAction {
                action: capability.name.clone(),
                success: false,
                detail: INTERRUPTED_DETAIL.to_string(),
                destructive: capability.destructive,
                latency_ms: 0,
            });
            let slot = actions.len() - 1;

            let result = invoke_timed(&provider, &capability.name, &params, self.timeout).await;
            let action = RemediationAction::from_result(&result, capability.destructive);
            if !action.success && capability.destructive {
                destructive_failed = true;
            }
            info!(
                incident_id = %incident.id,
                action = %action.action,
                success = action.success,
                "remediation action"
            );
            actions[slot] = action;
        }
    }

    /// Incident parameters plus the evidence the investigation produced
    fn parameters(entry: &IntentEntry, incident: &Incident, report: &InvestigationReport) -> Value {
        let mut params = incident.capability_parameters(&entry.intent);
        if let Value::Object(ref mut map) = params {
            let evidence: Vec<Value> = report
                .results()
                .iter()
                .filter(|r| r.success)
                .map(|r| {
                    serde_json::json!({
                        "capability": r.capability,
                        "payload": r.payload,
                    })
                })
                .collect();
            map.insert("evidence".into(), Value::Array(evidence));
        }
        params
    }
}
