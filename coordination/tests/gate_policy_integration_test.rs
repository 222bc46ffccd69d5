//! Gate and policy invariants, checked across every builtin intent and a grid
//! of confidence, evidence and remediation signals.
//!
//! Wires the deterministic stages the way the pipeline does:
//! pre-action gate → (remediation) → policy → pre-close gate.

use coordination::{
    CapabilityResult, ClassificationResult, ClassificationSource, Decision, ErrorKind, GateOutcome,
    IntentEntry, IntentTaxonomy, InvestigationReport, PolicyDecision, PolicyEngine, PreActionGate,
    PreCloseGate, RemediationAction,
};
use serde_json::json;

// ── Signal grid ─────────────────────────────────────────────────────

const CONFIDENCES: &[f64] = &[0.0, 0.3, 0.59, 0.6, 0.75, 0.92, 1.0];

#[derive(Debug, Clone, Copy)]
enum Evidence {
    None,
    AllFailed,
    Mixed,
    Clean,
}

const EVIDENCE: &[Evidence] = &[Evidence::None, Evidence::AllFailed, Evidence::Mixed, Evidence::Clean];

#[derive(Debug, Clone, Copy)]
enum Remediation {
    NotAttempted,
    Failed,
    Succeeded,
}

const REMEDIATION: &[Remediation] = &[
    Remediation::NotAttempted,
    Remediation::Failed,
    Remediation::Succeeded,
];

fn classification(intent: &str, confidence: f64) -> ClassificationResult {
    ClassificationResult {
        intent: intent.to_string(),
        confidence,
        reasoning: String::new(),
        source: ClassificationSource::Capability,
    }
}

fn report(intent: &str, evidence: Evidence) -> InvestigationReport {
    let mut report = InvestigationReport::new(intent);
    let ok = || CapabilityResult::succeeded("get_glue_logs", json!({"summary": "ok"}), 5);
    let bad = || CapabilityResult::failed("get_s3_logs", ErrorKind::Timeout, "timed out", 30_000);
    match evidence {
        Evidence::None => {}
        Evidence::AllFailed => report.push(bad()),
        Evidence::Mixed => {
            report.push(ok());
            report.push(bad());
        }
        Evidence::Clean => report.push(ok()),
    }
    report
}

fn actions(remediation: Remediation) -> Vec<RemediationAction> {
    let action = |success| RemediationAction {
        action: "retry_glue_job".into(),
        success,
        detail: String::new(),
        destructive: true,
        latency_ms: 10,
    };
    match remediation {
        Remediation::NotAttempted => Vec::new(),
        Remediation::Failed => vec![action(false)],
        Remediation::Succeeded => vec![action(true)],
    }
}

struct Verdict {
    remediated: bool,
    policy: PolicyDecision,
    final_decision: Decision,
}

/// The deterministic half of one pipeline run.
fn decide(
    entry: &IntentEntry,
    confidence: f64,
    evidence: Evidence,
    remediation: Remediation,
) -> Verdict {
    let classification = classification(&entry.intent, confidence);
    let report = report(&entry.intent, evidence);

    let pre_action = PreActionGate::new().evaluate_before_action(entry, &classification, &report);
    let remediated = pre_action.is_proceed();
    let actions = if remediated {
        actions(remediation)
    } else {
        Vec::new()
    };

    let policy = PolicyEngine::new().apply_policy_decision(
        entry,
        &classification,
        &report,
        &actions,
        &pre_action,
    );
    let close = PreCloseGate::new().evaluate_before_close(&policy, &report, &actions);
    let final_decision = close.outcome.enforced_decision().unwrap_or(policy.decision);

    Verdict {
        remediated,
        policy,
        final_decision,
    }
}

fn each_case(mut check: impl FnMut(&IntentEntry, f64, Evidence, Remediation, &Verdict)) {
    for entry in IntentTaxonomy::builtin().entries() {
        for &confidence in CONFIDENCES {
            for &evidence in EVIDENCE {
                for &remediation in REMEDIATION {
                    let verdict = decide(entry, confidence, evidence, remediation);
                    check(entry, confidence, evidence, remediation, &verdict);
                }
            }
        }
    }
}

// ── Invariants ──────────────────────────────────────────────────────

#[test]
fn forced_override_always_wins() {
    each_case(|entry, confidence, evidence, remediation, verdict| {
        if let Some(forced) = entry.forced_override {
            assert_eq!(
                verdict.final_decision, forced,
                "{} at {confidence} with {evidence:?}/{remediation:?}",
                entry.intent
            );
            assert_eq!(verdict.policy.score, 0.0);
            assert!(!verdict.remediated);
        }
    });
}

#[test]
fn low_confidence_never_remediates() {
    let min = PreActionGate::new().config().min_confidence;
    each_case(|entry, confidence, _, _, verdict| {
        if confidence < min {
            assert!(!verdict.remediated, "{} at {confidence}", entry.intent);
            assert!(!verdict.final_decision.is_automated());
        }
    });
}

#[test]
fn automated_decisions_are_backed_by_evidence() {
    each_case(|entry, confidence, evidence, remediation, verdict| {
        if verdict.final_decision.is_automated() {
            let fixed = verdict.remediated && matches!(remediation, Remediation::Succeeded);
            let clean = matches!(evidence, Evidence::Clean);
            assert!(
                fixed || (clean && verdict.final_decision == Decision::AutoClose),
                "{} at {confidence} with {evidence:?}/{remediation:?} → {}",
                entry.intent,
                verdict.final_decision
            );
        }
    });
}

#[test]
fn required_investigation_without_success_never_automates() {
    each_case(|entry, _, evidence, _, verdict| {
        if entry.requires_investigation() && matches!(evidence, Evidence::None | Evidence::AllFailed) {
            assert!(!verdict.remediated, "{}", entry.intent);
            assert!(!verdict.final_decision.is_automated(), "{}", entry.intent);
        }
    });
}

#[test]
fn scores_stay_in_unit_interval() {
    each_case(|_, _, _, _, verdict| {
        assert!((0.0..=1.0).contains(&verdict.policy.score));
    });
}

// ── Purity ──────────────────────────────────────────────────────────

#[test]
fn gates_are_idempotent() {
    let taxonomy = IntentTaxonomy::builtin();
    let gate = PreActionGate::new();
    let close = PreCloseGate::new();
    let policy = PolicyEngine::new();

    for entry in taxonomy.entries() {
        for &evidence in EVIDENCE {
            let classification = classification(&entry.intent, 0.8);
            let report = report(&entry.intent, evidence);
            let first = gate.evaluate_before_action(entry, &classification, &report);
            let second = gate.evaluate_before_action(entry, &classification, &report);
            assert_eq!(first, second);

            let actions = actions(Remediation::Succeeded);
            let decision =
                policy.apply_policy_decision(entry, &classification, &report, &actions, &first);
            assert_eq!(
                close.evaluate_before_close(&decision, &report, &actions),
                close.evaluate_before_close(&decision, &report, &actions)
            );
        }
    }
}

// ── Scenarios ───────────────────────────────────────────────────────

#[test]
fn glue_scenario_auto_closes() {
    let entry = IntentTaxonomy::builtin().resolve("glue_etl_failure");
    let verdict = decide(entry, 0.92, Evidence::Clean, Remediation::Succeeded);
    assert!(verdict.policy.score >= 0.8);
    assert_eq!(verdict.final_decision, Decision::AutoClose);
}

#[test]
fn mid_band_without_fix_is_human_review() {
    let entry = IntentTaxonomy::builtin().resolve("glue_etl_failure");
    let verdict = decide(entry, 0.92, Evidence::Clean, Remediation::Failed);
    // 0.4 * 0.92 + 0.3 * 1.0 + 0.3 * 0.0 = 0.668
    assert!(verdict.policy.score >= 0.5 && verdict.policy.score < 0.8);
    assert_eq!(verdict.final_decision, Decision::HumanReview);
}

#[test]
fn mid_band_with_fix_is_auto_retry() {
    let entry = IntentTaxonomy::builtin().resolve("glue_etl_failure");
    let verdict = decide(entry, 0.6, Evidence::Mixed, Remediation::Succeeded);
    // 0.4 * 0.6 + 0.3 * 0.5 + 0.3 * 1.0 = 0.69
    assert_eq!(verdict.policy.decision, Decision::AutoRetry);
    assert_eq!(verdict.final_decision, Decision::AutoRetry);
}

#[test]
fn gate_outcomes_match_builtin_overrides() {
    let taxonomy = IntentTaxonomy::builtin();
    let gate = PreActionGate::new();
    let report = InvestigationReport::new("any");

    let access = taxonomy.resolve("access_denied");
    let kafka = taxonomy.resolve("kafka_events_failed");
    assert_eq!(
        gate.evaluate_before_action(access, &classification("access_denied", 1.0), &report)
            .outcome,
        GateOutcome::SkipToEscalate
    );
    assert_eq!(
        gate.evaluate_before_action(kafka, &classification("kafka_events_failed", 1.0), &report)
            .outcome,
        GateOutcome::SkipToHumanReview
    );
}
