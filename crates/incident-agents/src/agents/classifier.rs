//! Intent classifiers.
//!
//! Both implementations normalize against the active taxonomy, so the
//! pipeline only ever sees intents it has an entry for.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coordination::{
    ClassificationResult, ClassificationSource, Incident, IntentTaxonomy, TriageError,
    TriageResult, UNKNOWN_INTENT,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::capabilities::{CapabilityError, CapabilityProvider};

/// Capability invoked by [`CapabilityClassifier`]
pub const CLASSIFY_CAPABILITY: &str = "classify_intent";

/// Confidence reported when no keyword rule matches
const NO_MATCH_CONFIDENCE: f64 = 0.2;
/// Confidence reported when the classifier payload fails validation
const INVALID_PAYLOAD_CONFIDENCE: f64 = 0.1;
/// Added when category/subcategory agree with the free text
const FIELD_AGREEMENT_BOOST: f64 = 0.05;
const KEYWORD_CONFIDENCE_CAP: f64 = 0.95;

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classify one incident.
    ///
    /// Fails with `InvalidIncident` for an empty short description and with
    /// `Classification` when the classifier itself is unavailable.
    async fn classify(&self, incident: &Incident) -> TriageResult<ClassificationResult>;
}

struct KeywordRule {
    intent: &'static str,
    pattern: Regex,
    confidence: f64,
}

impl KeywordRule {
    fn new(intent: &'static str, pattern: &str, confidence: f64) -> Option<Self> {
        match Regex::new(pattern) {
            Ok(pattern) => Some(Self {
                intent,
                pattern,
                confidence,
            }),
            Err(e) => {
                warn!(intent, error = %e, "dropping keyword rule with invalid pattern");
                None
            }
        }
    }
}

/// Ordered rules; on equal confidence the earlier rule wins.
static KEYWORD_RULES: Lazy<Vec<KeywordRule>> = Lazy::new(|| {
    [
        (
            "access_denied",
            r"(?i)\b(access denied|accessdenied|permission denied|unauthori[sz]ed|forbidden)\b",
            0.9,
        ),
        ("kafka_events_failed", r"(?i)\bkafka\b", 0.88),
        ("batch_auto_recovery_failed", r"(?i)\bauto[- ]?recovery\b", 0.85),
        ("dag_alarm", r"(?i)(\bdag\b.*\balarm\b|\balarm\b.*\bdag\b)", 0.87),
        ("mwaa_failure", r"(?i)\bmwaa\b", 0.86),
        ("dag_failure", r"(?i)\b(dag|airflow)\b", 0.85),
        ("glue_etl_failure", r"(?i)\b(glue|etl)\b", 0.9),
        ("emr_failure", r"(?i)\bemr\b", 0.88),
        ("athena_failure", r"(?i)\bathena\b", 0.85),
        ("source_zero_data", r"(?i)(\bzero (data|records|rows)\b|\b0 (records|rows)\b)", 0.84),
        ("data_not_available", r"(?i)\bnot available\b", 0.8),
        ("data_missing", r"(?i)\bmissing\b", 0.8),
    ]
    .into_iter()
    .filter_map(|(intent, pattern, confidence)| KeywordRule::new(intent, pattern, confidence))
    .collect()
});

/// Deterministic regex classifier over the incident's text fields.
pub struct KeywordClassifier {
    taxonomy: Arc<IntentTaxonomy>,
    unknown_cap: f64,
}

impl KeywordClassifier {
    pub fn new(taxonomy: Arc<IntentTaxonomy>, unknown_cap: f64) -> Self {
        Self {
            taxonomy,
            unknown_cap,
        }
    }

    fn best_match(incident: &Incident) -> Option<(&'static str, f64, Vec<&'static str>)> {
        let mut best: Option<(&'static str, f64, Vec<&'static str>)> = None;

        for rule in KEYWORD_RULES.iter() {
            let matched: Vec<&'static str> = incident
                .text_fields()
                .filter(|(_, text)| rule.pattern.is_match(text))
                .map(|(field, _)| field)
                .collect();
            if matched.is_empty() {
                continue;
            }

            let free_text = matched
                .iter()
                .any(|f| *f == "short_description" || *f == "description");
            let structured = matched
                .iter()
                .any(|f| *f == "category" || *f == "subcategory");

            let mut confidence = rule.confidence;
            if free_text && structured {
                confidence += FIELD_AGREEMENT_BOOST;
            } else if !free_text {
                // Category alone is weaker evidence than the ticket text.
                confidence -= FIELD_AGREEMENT_BOOST;
            }
            let confidence = confidence.min(KEYWORD_CONFIDENCE_CAP);

            if best.as_ref().map_or(true, |(_, c, _)| confidence > *c) {
                best = Some((rule.intent, confidence, matched));
            }
        }
        best
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, incident: &Incident) -> TriageResult<ClassificationResult> {
        incident.validate()?;

        let result = match Self::best_match(incident) {
            Some((intent, confidence, fields)) => ClassificationResult::normalize(
                intent,
                confidence,
                format!("keyword rule `{intent}` matched {}", fields.join(", ")),
                ClassificationSource::Keyword,
                &self.taxonomy,
                self.unknown_cap,
            ),
            None => ClassificationResult::normalize(
                UNKNOWN_INTENT,
                NO_MATCH_CONFIDENCE,
                "no keyword rule matched",
                ClassificationSource::Keyword,
                &self.taxonomy,
                self.unknown_cap,
            ),
        };
        debug!(
            incident_id = %incident.id,
            intent = %result.intent,
            confidence = result.confidence,
            "keyword classification"
        );
        Ok(result)
    }
}

#[derive(Debug, Deserialize)]
struct ClassifierPayload {
    intent: String,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

/// Classifier backed by the `classify_intent` capability.
pub struct CapabilityClassifier {
    provider: Arc<dyn CapabilityProvider>,
    taxonomy: Arc<IntentTaxonomy>,
    unknown_cap: f64,
    timeout: Duration,
}

impl CapabilityClassifier {
    pub fn new(
        provider: Arc<dyn CapabilityProvider>,
        taxonomy: Arc<IntentTaxonomy>,
        unknown_cap: f64,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            taxonomy,
            unknown_cap,
            timeout,
        }
    }

    fn parameters(&self, incident: &Incident) -> Value {
        let mut params = incident.capability_parameters("");
        if let Value::Object(ref mut map) = params {
            map.remove("intent");
            map.insert(
                "intents".into(),
                Value::from(self.taxonomy.intents().collect::<Vec<_>>()),
            );
        }
        params
    }

    fn interpret(&self, payload: Value) -> ClassificationResult {
        match serde_json::from_value::<ClassifierPayload>(payload) {
            Ok(p) => ClassificationResult::normalize(
                &p.intent,
                p.confidence,
                p.reasoning,
                ClassificationSource::Capability,
                &self.taxonomy,
                self.unknown_cap,
            ),
            Err(e) => {
                warn!(error = %e, "classifier payload failed validation");
                ClassificationResult {
                    intent: UNKNOWN_INTENT.to_string(),
                    confidence: INVALID_PAYLOAD_CONFIDENCE,
                    reasoning: format!("classifier payload failed validation: {e}"),
                    source: ClassificationSource::Capability,
                }
            }
        }
    }
}

#[async_trait]
impl IntentClassifier for CapabilityClassifier {
    async fn classify(&self, incident: &Incident) -> TriageResult<ClassificationResult> {
        incident.validate()?;

        let params = self.parameters(incident);
        let payload = tokio::time::timeout(
            self.timeout,
            self.provider.invoke(CLASSIFY_CAPABILITY, &params),
        )
        .await
        .unwrap_or(Err(CapabilityError::Timeout(self.timeout)))
        .map_err(|e| TriageError::classification(e.to_string()))?;

        Ok(self.interpret(payload))
    }
}
