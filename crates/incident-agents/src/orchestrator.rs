//! Pipeline Orchestrator — sequences every stage for one incident.
//!
//! ```text
//! Pipeline::process_with_cancel(incident, token)
//!   → validate            invalid → Recording (human_review)
//!   → select! {
//!       run_stages:  classify → investigate → pre-action gate
//!                    → (remediate) → policy → pre-close gate
//!       token.cancelled() / deadline sleep → Aborted (partial RCA)
//!     }
//!   → RcaBuilder::build_rca_document   (every exit path)
//!   → TelemetrySink::record
//!   → IncidentOutcome
//! ```
//!
//! Each run owns its own records; the only shared state is the read-only
//! taxonomy and the stateless stage components, so runs need no locks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use coordination::{
    ClassificationResult, Decision, Guardrail, Incident, IntentEntry, IntentTaxonomy, PolicyEngine,
    PreActionGate, PreCloseGate, RcaParts, RemediationAction, TriageError, UNKNOWN_INTENT,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::agents::{ActionExecutor, CapabilityClassifier, IntentClassifier, Investigator, KeywordClassifier};
use crate::capabilities::{CapabilityProvider, HttpCapabilityProvider, SimulatedProvider};
use crate::config::TriageConfig;
use crate::rca::{FsRcaStore, RcaBuilder, RcaStore};
use crate::state_machine::{PipelineStage, StateMachine};
use crate::telemetry::TelemetrySink;

/// Tag carried on every result
pub const ORCHESTRATION_MODE: &str = "deterministic_pipeline";

// ── Result types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every stage ran
    Completed,
    /// Input rejected before classification
    InvalidIncident,
    /// Deadline or cancellation cut the run short
    Interrupted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::InvalidIncident => write!(f, "invalid_incident"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// The structured result returned for every incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentOutcome {
    pub incident_id: String,
    pub intent: String,
    pub confidence: f64,
    pub decision: Decision,
    /// Ticket status the downstream updater should apply
    pub ticket_status: String,
    pub score: f64,
    pub reasoning: String,
    pub rca_uri: Option<String>,
    pub rca_persisted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rca_error: Option<String>,
    pub actions_taken: Vec<RemediationAction>,
    pub guardrails_triggered: Vec<Guardrail>,
    pub processing_time_ms: u64,
    pub orchestration_mode: String,
    pub status: RunStatus,
}

impl IncidentOutcome {
    /// Outcome for a run whose task died before it could report.
    fn lost(incident_id: &str, reason: &str) -> Self {
        let decision = Decision::HumanReview;
        Self {
            incident_id: incident_id.to_string(),
            intent: UNKNOWN_INTENT.to_string(),
            confidence: 0.0,
            decision,
            ticket_status: decision.ticket_status().to_string(),
            score: 0.0,
            reasoning: reason.to_string(),
            rca_uri: None,
            rca_persisted: false,
            rca_error: Some(reason.to_string()),
            actions_taken: Vec::new(),
            guardrails_triggered: vec![Guardrail::pipeline(decision, reason)],
            processing_time_ms: 0,
            orchestration_mode: ORCHESTRATION_MODE.to_string(),
            status: RunStatus::Interrupted,
        }
    }
}

// ── Per-run state ────────────────────────────────────────────────────────────

/// Records collected by one run. Written by exactly one stage each.
struct Run {
    machine: StateMachine,
    parts: RcaParts,
    status: RunStatus,
}

impl Run {
    fn new(incident: Incident) -> Self {
        Self {
            machine: StateMachine::new(),
            parts: RcaParts::new(incident),
            status: RunStatus::Completed,
        }
    }
}

fn enter(machine: &mut StateMachine, stage: PipelineStage, reason: Option<&str>) {
    if let Err(e) = machine.advance(stage, reason) {
        error!(error = %e, "pipeline stage graph violated");
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

pub struct Pipeline {
    taxonomy: Arc<IntentTaxonomy>,
    classifier: Arc<dyn IntentClassifier>,
    investigator: Investigator,
    executor: ActionExecutor,
    pre_action: PreActionGate,
    policy: PolicyEngine,
    pre_close: PreCloseGate,
    rca: RcaBuilder,
    telemetry: TelemetrySink,
    deadline: Duration,
    max_concurrent_incidents: usize,
}

impl Pipeline {
    /// Pipeline with the keyword classifier and no telemetry file.
    pub fn new(
        config: &TriageConfig,
        taxonomy: Arc<IntentTaxonomy>,
        provider: Arc<dyn CapabilityProvider>,
        store: Arc<dyn RcaStore>,
    ) -> Self {
        let timeout = config.capability_timeout();
        Self {
            classifier: Arc::new(KeywordClassifier::new(
                taxonomy.clone(),
                config.classifier.unknown_confidence_cap,
            )),
            taxonomy,
            investigator: Investigator::new(
                provider.clone(),
                timeout,
                config.capabilities.max_concurrent_investigations,
            ),
            executor: ActionExecutor::new(provider, timeout),
            pre_action: PreActionGate::with_config(config.gates.clone()),
            policy: PolicyEngine::with_config(config.policy.clone()),
            pre_close: PreCloseGate::new(),
            rca: RcaBuilder::new(store).with_timeout(config.rca_store_timeout()),
            telemetry: TelemetrySink::disabled(),
            deadline: config.pipeline_deadline(),
            max_concurrent_incidents: config.pipeline.max_concurrent_incidents.max(1),
        }
    }

    /// Wire every collaborator from configuration.
    ///
    /// No gateway URL means the simulated provider; RCA documents go to the
    /// filesystem store.
    pub fn from_config(config: &TriageConfig) -> Result<Self> {
        let taxonomy = config.load_taxonomy()?;
        let timeout = config.capability_timeout();

        let gateway = config.capabilities.gateway_url.as_deref();
        let provider: Arc<dyn CapabilityProvider> = match gateway {
            Some(url) => {
                info!(url, "using capability gateway");
                Arc::new(HttpCapabilityProvider::new(
                    url,
                    config.capabilities.gateway_token.clone(),
                    timeout,
                ))
            }
            None => {
                info!("no capability gateway configured, using simulated provider");
                Arc::new(SimulatedProvider::new())
            }
        };

        let store = Arc::new(FsRcaStore::new(&config.rca.dir, config.rca.prefix.clone()));
        let mut pipeline = Self::new(config, taxonomy.clone(), provider.clone(), store)
            .with_telemetry(TelemetrySink::new(config.telemetry.path.clone()));

        if config.classifier.use_capability {
            if gateway.is_some() {
                pipeline = pipeline.with_classifier(Arc::new(CapabilityClassifier::new(
                    provider,
                    taxonomy,
                    config.classifier.unknown_confidence_cap,
                    timeout,
                )));
            } else {
                warn!("capability classifier requested without a gateway, using keyword rules");
            }
        }
        Ok(pipeline)
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetrySink) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn taxonomy(&self) -> &IntentTaxonomy {
        &self.taxonomy
    }

    pub async fn process(&self, incident: Incident) -> IncidentOutcome {
        self.process_with_cancel(incident, CancellationToken::new()).await
    }

    /// Run one incident, racing the stages against `cancel` and the deadline.
    pub async fn process_with_cancel(
        &self,
        incident: Incident,
        cancel: CancellationToken,
    ) -> IncidentOutcome {
        let span = info_span!("incident", incident_id = %incident.id);
        self.process_inner(incident, cancel).instrument(span).await
    }

    async fn process_inner(&self, incident: Incident, cancel: CancellationToken) -> IncidentOutcome {
        let started = Instant::now();
        let mut run = Run::new(incident);
        info!("incident received");

        if let Err(e) = run.parts.incident.validate() {
            self.reject(&mut run, &e);
        } else {
            let interruption = tokio::select! {
                biased;
                () = self.run_stages(&mut run) => None,
                _ = cancel.cancelled() => Some("cancelled"),
                _ = tokio::time::sleep(self.deadline) => Some("pipeline deadline exceeded"),
            };
            match interruption {
                Some(reason) => self.interrupt(&mut run, reason),
                None => enter(&mut run.machine, PipelineStage::Recording, None),
            }
        }

        self.record(run, started).await
    }

    async fn run_stages(&self, run: &mut Run) {
        let incident = &run.parts.incident;

        // Classification
        enter(&mut run.machine, PipelineStage::Classifying, None);
        let classification = match self.classifier.classify(incident).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "classifier unavailable, treating as zero confidence");
                ClassificationResult::unavailable(e.to_string())
            }
        };
        self.telemetry.classification(&incident.id, &classification);
        let entry: IntentEntry = self.taxonomy.resolve(&classification.intent).clone();
        let classification = &*run.parts.classification.insert(classification);

        // Investigation
        enter(&mut run.machine, PipelineStage::Investigating, None);
        let report = self.investigator.investigate(&entry, incident).await;
        let report = &*run.parts.investigation.insert(report);

        // Pre-action gate
        enter(&mut run.machine, PipelineStage::GatingAction, None);
        let gate = self
            .pre_action
            .evaluate_before_action(&entry, classification, report);
        info!(outcome = %gate.outcome, rule = ?gate.rule, reason = %gate.reason, "pre-action gate");
        if let Some(guardrail) = gate.guardrail(None) {
            self.telemetry.guardrail(&incident.id, &guardrail);
            run.parts.guardrails.push(guardrail);
        }
        let gate = &*run.parts.pre_action_gate.insert(gate);

        // Remediation, only when the gate allows it
        if gate.is_proceed() {
            enter(&mut run.machine, PipelineStage::Remediating, None);
            self.executor
                .execute_remediation_into(&entry, incident, report, &mut run.parts.remediation)
                .await;
        }
        let actions = &run.parts.remediation;

        // Policy
        enter(
            &mut run.machine,
            PipelineStage::Deciding,
            (!gate.is_proceed()).then_some(gate.outcome.to_string()).as_deref(),
        );
        let policy = self
            .policy
            .apply_policy_decision(&entry, classification, report, actions, gate);
        info!(decision = %policy.decision, score = policy.score, "policy decision");

        // Pre-close gate
        enter(&mut run.machine, PipelineStage::GatingClose, None);
        let close = self.pre_close.evaluate_before_close(&policy, report, actions);
        let (final_decision, final_reasoning) = match close.outcome.enforced_decision() {
            Some(enforced) => {
                let violation = TriageError::GateViolation {
                    gate: close.gate.to_string(),
                    reason: close.reason.clone(),
                };
                warn!(error = %violation, %enforced, "decision downgraded");
                if let Some(guardrail) = close.guardrail(Some(policy.decision)) {
                    self.telemetry.guardrail(&incident.id, &guardrail);
                    run.parts.guardrails.push(guardrail);
                }
                (enforced, format!("{}; pre-close gate: {}", policy.reasoning, close.reason))
            }
            None => (policy.decision, policy.reasoning.clone()),
        };

        run.parts.final_decision = final_decision;
        run.parts.final_reasoning = final_reasoning;
        run.parts.policy = Some(policy);
        run.parts.pre_close_gate = Some(close);
    }

    /// Short-circuit an incident that failed validation.
    fn reject(&self, run: &mut Run, error: &TriageError) {
        warn!(error = %error, "invalid incident, routing to human review");
        let reason = error.to_string();
        enter(&mut run.machine, PipelineStage::Recording, Some(&reason));
        run.status = RunStatus::InvalidIncident;
        run.parts.final_decision = Decision::HumanReview;
        run.parts.final_reasoning = reason.clone();
        let guardrail = Guardrail::pipeline(Decision::HumanReview, reason);
        self.telemetry.guardrail(&run.parts.incident.id, &guardrail);
        run.parts.guardrails.push(guardrail);
    }

    /// Keep whatever stages finished and fall back to human review.
    fn interrupt(&self, run: &mut Run, reason: &str) {
        let stage = run.machine.current();
        warn!(%stage, reason, "pipeline interrupted, recording partial RCA");
        if let Err(e) = run.machine.abort(reason) {
            error!(error = %e, "pipeline stage graph violated");
        }
        let reasoning = format!("pipeline interrupted during {stage}: {reason}");
        run.status = RunStatus::Interrupted;
        run.parts.partial = true;
        run.parts.final_decision = Decision::HumanReview;
        run.parts.final_reasoning = reasoning.clone();
        let guardrail = Guardrail::pipeline(Decision::HumanReview, reasoning);
        self.telemetry.guardrail(&run.parts.incident.id, &guardrail);
        run.parts.guardrails.push(guardrail);
    }

    /// Build and store the RCA, then assemble the outcome.
    async fn record(&self, mut run: Run, started: Instant) -> IncidentOutcome {
        run.parts.stages = run.machine.to_stage_transitions();

        let parts = &run.parts;
        let (intent, confidence) = parts
            .classification
            .as_ref()
            .map(|c| (c.intent.clone(), c.confidence))
            .unwrap_or_else(|| (UNKNOWN_INTENT.to_string(), 0.0));
        let score = parts.policy.as_ref().map(|p| p.score).unwrap_or(0.0);
        let decision = parts.final_decision;
        let reasoning = parts.final_reasoning.clone();
        let actions_taken = parts.remediation.clone();
        let guardrails_triggered = parts.guardrails.clone();
        let incident_id = parts.incident.id.clone();

        let built = self.rca.build_rca_document(run.parts).await;
        if !run.machine.is_terminal() {
            enter(&mut run.machine, PipelineStage::Completed, None);
        }
        info!(summary = %run.machine.summary(), "incident run finished");

        let outcome = IncidentOutcome {
            incident_id,
            intent,
            confidence,
            decision,
            ticket_status: decision.ticket_status().to_string(),
            score,
            reasoning,
            rca_persisted: built.persisted(),
            rca_uri: built.locator,
            rca_error: built.error.map(|e| e.to_string()),
            actions_taken,
            guardrails_triggered,
            processing_time_ms: started.elapsed().as_millis() as u64,
            orchestration_mode: ORCHESTRATION_MODE.to_string(),
            status: run.status,
        };
        self.telemetry.record(&outcome);
        outcome
    }

    /// Process many incidents concurrently; results come back in input order.
    pub async fn process_batch(
        self: &Arc<Self>,
        incidents: Vec<Incident>,
        cancel: CancellationToken,
    ) -> Vec<IncidentOutcome> {
        let ids: Vec<String> = incidents.iter().map(|i| i.id.clone()).collect();
        let sem = Arc::new(Semaphore::new(self.max_concurrent_incidents));
        let mut join_set: JoinSet<(usize, IncidentOutcome)> = JoinSet::new();

        for (index, incident) in incidents.into_iter().enumerate() {
            let pipeline = Arc::clone(self);
            let sem = sem.clone();
            let cancel = cancel.child_token();
            join_set.spawn(async move {
                let _permit = sem.acquire().await.ok();
                (index, pipeline.process_with_cancel(incident, cancel).await)
            });
        }

        let mut slots: Vec<Option<IncidentOutcome>> = vec![None; ids.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => error!(error = %e, "incident task failed"),
            }
        }

        slots
            .into_iter()
            .zip(ids)
            .map(|(slot, id)| {
                slot.unwrap_or_else(|| IncidentOutcome::lost(&id, "incident task failed before reporting"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::MockCapabilityProvider;
    use crate::rca::MemoryRcaStore;
    use coordination::GateRule;
    use serde_json::json;

    fn pipeline_with(provider: Arc<dyn CapabilityProvider>, store: Arc<MemoryRcaStore>) -> Pipeline {
        let config = TriageConfig::default();
        Pipeline::new(
            &config,
            Arc::new(IntentTaxonomy::builtin().clone()),
            provider,
            store,
        )
    }

    #[tokio::test]
    async fn test_glue_incident_auto_closes() {
        let store = Arc::new(MemoryRcaStore::new());
        let pipeline = pipeline_with(Arc::new(SimulatedProvider::new()), store.clone());

        let outcome = pipeline
            .process(Incident::new("INC100", "Glue job failed").with_category("glue"))
            .await;
        assert_eq!(outcome.intent, "glue_etl_failure");
        assert_eq!(outcome.decision, Decision::AutoClose);
        assert_eq!(outcome.ticket_status, "resolved");
        assert!(outcome.score >= 0.8);
        assert_eq!(outcome.actions_taken.len(), 1);
        assert!(outcome.rca_persisted);
        assert_eq!(outcome.status, RunStatus::Completed);

        let doc = store.get(outcome.rca_uri.as_deref().unwrap()).unwrap();
        assert_eq!(
            doc.stages_completed(),
            vec![
                "classifying",
                "investigating",
                "gating_action",
                "remediating",
                "deciding",
                "gating_close",
                "recording"
            ]
        );
    }

    #[tokio::test]
    async fn test_access_denied_never_touches_provider() {
        let mut mock = MockCapabilityProvider::new();
        mock.expect_invoke().times(0);
        let store = Arc::new(MemoryRcaStore::new());
        let pipeline = pipeline_with(Arc::new(mock), store);

        let outcome = pipeline
            .process(Incident::new("INC200", "Access Denied on s3 bucket"))
            .await;
        assert_eq!(outcome.intent, "access_denied");
        assert_eq!(outcome.decision, Decision::Escalate);
        assert_eq!(outcome.score, 0.0);
        assert!(outcome.actions_taken.is_empty());
        assert_eq!(outcome.guardrails_triggered[0].rule, GateRule::ForcedEscalate);
    }

    #[tokio::test]
    async fn test_invalid_incident_still_recorded() {
        let store = Arc::new(MemoryRcaStore::new());
        let pipeline = pipeline_with(Arc::new(SimulatedProvider::new()), store.clone());

        let outcome = pipeline.process(Incident::new("INC300", "   ")).await;
        assert_eq!(outcome.status, RunStatus::InvalidIncident);
        assert_eq!(outcome.decision, Decision::HumanReview);
        assert!(outcome.rca_persisted);

        let doc = store.get(outcome.rca_uri.as_deref().unwrap()).unwrap();
        assert!(doc.classification.is_none());
        assert_eq!(doc.stages_completed(), vec!["recording"]);
    }

    #[tokio::test]
    async fn test_failed_remediation_falls_to_human_review() {
        let mut mock = MockCapabilityProvider::new();
        mock.expect_invoke()
            .withf(|name, _| name == "get_glue_logs")
            .returning(|_, _| Ok(json!({"summary": "Glue job failed with timeout"})));
        mock.expect_invoke()
            .withf(|name, _| name == "retry_glue_job")
            .returning(|_, _| Err(crate::capabilities::CapabilityError::Remote("busy".into())));

        let store = Arc::new(MemoryRcaStore::new());
        let pipeline = pipeline_with(Arc::new(mock), store);
        let outcome = pipeline
            .process(Incident::new("INC400", "Glue job failed").with_category("glue"))
            .await;

        // 0.4 * 0.95 + 0.3 * 1.0 + 0.3 * 0.0 = 0.68 → mid band, no success → human_review
        assert_eq!(outcome.decision, Decision::HumanReview);
        assert_eq!(outcome.actions_taken.len(), 1);
        assert!(!outcome.actions_taken[0].success);
    }

    struct Unanswered;

    #[async_trait::async_trait]
    impl CapabilityProvider for Unanswered {
        async fn invoke(
            &self,
            _: &str,
            _: &serde_json::Value,
        ) -> Result<serde_json::Value, crate::capabilities::CapabilityError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_is_partial() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let store = Arc::new(MemoryRcaStore::new());
        let pipeline = pipeline_with(Arc::new(Unanswered), store.clone());

        let outcome = pipeline
            .process_with_cancel(
                Incident::new("INC500", "Glue job failed").with_category("glue"),
                cancel,
            )
            .await;

        assert_eq!(outcome.status, RunStatus::Interrupted);
        assert_eq!(outcome.decision, Decision::HumanReview);
        assert!(outcome.reasoning.contains("cancelled"));
        assert!(outcome.rca_persisted);

        let doc = store.get(outcome.rca_uri.as_deref().unwrap()).unwrap();
        assert!(doc.partial);
        assert!(doc.classification.is_some());
        assert!(doc.investigation.is_none());
        assert_eq!(doc.stages.last().unwrap().to, "aborted");
    }
}
