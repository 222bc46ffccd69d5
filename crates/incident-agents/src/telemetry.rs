//! Telemetry — per-incident JSONL records plus structured metric events.
//!
//! Metric events are plain `tracing` events carrying a `metric` field so any
//! subscriber can pick them up:
//!
//! ```text
//! classification      every classified incident
//! low_confidence      confidence < 0.3
//! guardrail_enforced  every gate downgrade or forced decision
//! decision            every finished run
//! ```
//!
//! When a telemetry path is configured, one JSON line per processed incident
//! is appended to it.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use coordination::{ClassificationResult, Guardrail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::orchestrator::IncidentOutcome;

/// Confidence below which a classification is flagged
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.3;

/// One line of the telemetry file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub incident_id: String,
    pub intent: String,
    pub confidence: f64,
    pub decision: String,
    pub score: f64,
    pub guardrails: Vec<String>,
    pub latency_ms: u64,
    pub rca_persisted: bool,
    pub status: String,
}

impl TelemetryRecord {
    pub fn from_outcome(outcome: &IncidentOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            incident_id: outcome.incident_id.clone(),
            intent: outcome.intent.clone(),
            confidence: outcome.confidence,
            decision: outcome.decision.to_string(),
            score: outcome.score,
            guardrails: outcome
                .guardrails_triggered
                .iter()
                .map(|g| g.to_string())
                .collect(),
            latency_ms: outcome.processing_time_ms,
            rca_persisted: outcome.rca_persisted,
            status: outcome.status.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct TelemetrySink {
    path: Option<PathBuf>,
    /// Serializes appends from concurrent incident runs
    write_lock: Mutex<()>,
}

impl TelemetrySink {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Sink that only emits tracing events
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn classification(&self, incident_id: &str, result: &ClassificationResult) {
        info!(
            metric = "classification",
            incident_id,
            intent = %result.intent,
            confidence = result.confidence,
            source = %result.source,
            "incident classified"
        );
        if result.confidence < LOW_CONFIDENCE_THRESHOLD {
            warn!(
                metric = "low_confidence",
                incident_id,
                intent = %result.intent,
                confidence = result.confidence,
                "low classification confidence"
            );
        }
    }

    pub fn guardrail(&self, incident_id: &str, guardrail: &Guardrail) {
        warn!(
            metric = "guardrail_enforced",
            incident_id,
            gate = %guardrail.gate,
            enforced = %guardrail.enforced,
            reason = %guardrail.reason,
            "guardrail enforced"
        );
    }

    /// Emit the decision event and append the JSONL record.
    pub fn record(&self, outcome: &IncidentOutcome) {
        info!(
            metric = "decision",
            incident_id = %outcome.incident_id,
            intent = %outcome.intent,
            decision = %outcome.decision,
            score = outcome.score,
            status = %outcome.status,
            latency_ms = outcome.processing_time_ms,
            "incident decided"
        );

        let Some(ref path) = self.path else {
            return;
        };
        let record = TelemetryRecord::from_outcome(outcome);
        match serde_json::to_string(&record) {
            Ok(json) => {
                let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
                match std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                {
                    Ok(mut file) => {
                        if let Err(e) = writeln!(file, "{json}") {
                            warn!("Failed to append telemetry: {e}");
                        }
                    }
                    Err(e) => warn!(path = %path.display(), "Failed to open telemetry file: {e}"),
                }
            }
            Err(e) => warn!("Failed to serialize telemetry: {e}"),
        }
    }
}
