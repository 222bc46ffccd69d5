//! Capability results, investigation reports and remediation actions

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a capability call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Exceeded the per-capability timeout
    Timeout,
    /// The capability ran and reported failure
    Remote,
    /// The provider could not be reached
    Transport,
    /// No handler is registered under that name
    NotRegistered,
    /// The taxonomy does not authorize the capability for this intent
    NotAuthorized,
    /// The provider answered with something unparseable
    InvalidResponse,
    /// The invocation task panicked
    Panicked,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Remote => "remote",
            Self::Transport => "transport",
            Self::NotRegistered => "not_registered",
            Self::NotAuthorized => "not_authorized",
            Self::InvalidResponse => "invalid_response",
            Self::Panicked => "panicked",
        };
        f.write_str(s)
    }
}

/// Outcome of one capability invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub capability: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

impl CapabilityResult {
    pub fn succeeded(capability: &str, payload: Value, latency_ms: u64) -> Self {
        Self {
            capability: capability.to_string(),
            success: true,
            payload: Some(payload),
            error_kind: None,
            error: None,
            latency_ms,
        }
    }

    pub fn failed(
        capability: &str,
        kind: ErrorKind,
        error: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            capability: capability.to_string(),
            success: false,
            payload: None,
            error_kind: Some(kind),
            error: Some(error.into()),
            latency_ms,
        }
    }

    /// Human-readable one-liner for action details and logs
    pub fn summary(&self) -> String {
        if self.success {
            match self.payload.as_ref().and_then(payload_summary) {
                Some(text) => text,
                None => "ok".to_string(),
            }
        } else {
            format!(
                "{}: {}",
                self.error_kind.map(|k| k.to_string()).unwrap_or_default(),
                self.error.as_deref().unwrap_or("failed")
            )
        }
    }
}

/// Pull the diagnostic text out of a payload, if it carries any
pub fn payload_summary(payload: &Value) -> Option<String> {
    const KEYS: &[&str] = &["summary", "root_cause", "message", "status", "error"];
    match payload {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            let parts: Vec<&str> = KEYS
                .iter()
                .filter_map(|k| map.get(*k).and_then(Value::as_str))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        _ => None,
    }
}

/// Structured evidence gathered for one incident.
///
/// Results are appended in taxonomy-declared capability order and never
/// rewritten. A skipped report is empty by design, not by failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationReport {
    pub intent: String,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    results: Vec<CapabilityResult>,
}

impl InvestigationReport {
    pub fn new(intent: &str) -> Self {
        Self {
            intent: intent.to_string(),
            skipped: false,
            skip_reason: None,
            results: Vec::new(),
        }
    }

    /// An empty report for an intent whose investigation is skipped by design
    pub fn skipped(intent: &str, reason: impl Into<String>) -> Self {
        Self {
            intent: intent.to_string(),
            skipped: true,
            skip_reason: Some(reason.into()),
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: CapabilityResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[CapabilityResult] {
        &self.results
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn successful_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.successful_count()
    }

    /// Fraction of successful results; 0 when nothing was invoked
    pub fn success_fraction(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            self.successful_count() as f64 / self.results.len() as f64
        }
    }

    /// At least one result and none of them failed
    pub fn is_clean(&self) -> bool {
        !self.results.is_empty() && self.failed_count() == 0
    }

    pub fn successful_payloads(&self) -> impl Iterator<Item = &Value> {
        self.results
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| r.payload.as_ref())
    }
}

/// One remediation capability invocation, in invocation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub action: String,
    pub success: bool,
    pub detail: String,
    #[serde(default)]
    pub destructive: bool,
    #[serde(default)]
    pub latency_ms: u64,
}

impl RemediationAction {
    pub fn from_result(result: &CapabilityResult, destructive: bool) -> Self {
        Self {
            action: result.capability.clone(),
            success: result.success,
            detail: result.summary(),
            destructive,
            latency_ms: result.latency_ms,
        }
    }
}

/// Fraction of successful remediation actions; 0 when none were attempted
pub fn remediation_success_fraction(actions: &[RemediationAction]) -> f64 {
    if actions.is_empty() {
        return 0.0;
    }
    actions.iter().filter(|a| a.success).count() as f64 / actions.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(name: &str) -> CapabilityResult {
        CapabilityResult::succeeded(name, json!({"summary": "fine"}), 5)
    }

    fn bad(name: &str) -> CapabilityResult {
        CapabilityResult::failed(name, ErrorKind::Timeout, "timed out after 30s", 30_000)
    }

    #[test]
    fn test_empty_report_fraction_is_zero() {
        let report = InvestigationReport::new("glue_etl_failure");
        assert_eq!(report.success_fraction(), 0.0);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_clean_requires_no_failures() {
        let mut report = InvestigationReport::new("dag_alarm");
        report.push(ok("get_mwaa_logs"));
        assert!(report.is_clean());
        report.push(bad("get_cloudwatch_alarm"));
        assert!(!report.is_clean());
        assert_eq!(report.successful_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!((report.success_fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_skipped_report_is_empty() {
        let report = InvestigationReport::skipped("access_denied", "skipped by taxonomy");
        assert!(report.skipped);
        assert!(report.is_empty());
    }

    #[test]
    fn test_summary_prefers_diagnostic_keys() {
        let r = CapabilityResult::succeeded(
            "get_emr_logs",
            json!({"root_cause": "OutOfMemoryError", "cluster_id": "j-1"}),
            10,
        );
        assert_eq!(r.summary(), "OutOfMemoryError");
        assert_eq!(bad("x").summary(), "timeout: timed out after 30s");
    }

    #[test]
    fn test_remediation_fraction() {
        let actions = vec![
            RemediationAction::from_result(&ok("retry_glue_job"), true),
            RemediationAction::from_result(&bad("retry_kafka"), true),
        ];
        assert!((remediation_success_fraction(&actions) - 0.5).abs() < f64::EPSILON);
        assert_eq!(remediation_success_fraction(&[]), 0.0);
    }

    #[test]
    fn test_result_serde_omits_empty_fields() {
        let json = serde_json::to_value(ok("get_glue_logs")).unwrap();
        assert!(json.get("error").is_none());
        let json = serde_json::to_value(bad("get_glue_logs")).unwrap();
        assert_eq!(json["error_kind"], "timeout");
    }
}
