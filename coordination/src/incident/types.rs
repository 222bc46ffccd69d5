//! Incident records and classification results

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{TriageError, TriageResult};
use crate::taxonomy::{IntentTaxonomy, UNKNOWN_INTENT};

/// An operational incident as delivered by the ticket source.
///
/// Immutable once it enters the pipeline; stages only ever borrow it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Opaque ticket identifier (`sys_id` in the ticketing system)
    #[serde(default, alias = "sys_id")]
    pub id: String,
    /// One-line summary; required for classification
    #[serde(default)]
    pub short_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    /// Free-form context forwarded verbatim to capabilities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<Value>,
}

impl Incident {
    pub fn new(id: &str, short_description: &str) -> Self {
        Self {
            id: id.to_string(),
            short_description: short_description.to_string(),
            description: None,
            category: None,
            subcategory: None,
            additional_info: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_subcategory(mut self, subcategory: &str) -> Self {
        self.subcategory = Some(subcategory.to_string());
        self
    }

    pub fn with_additional_info(mut self, info: Value) -> Self {
        self.additional_info = Some(info);
        self
    }

    /// Reject records the classifier cannot work with
    pub fn validate(&self) -> TriageResult<()> {
        if self.id.trim().is_empty() {
            return Err(TriageError::invalid_incident("incident id is empty"));
        }
        if self.short_description.trim().is_empty() {
            return Err(TriageError::invalid_incident(format!(
                "incident {} has an empty short_description",
                self.id
            )));
        }
        Ok(())
    }

    /// Free-text fields in classifier priority order
    pub fn text_fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("short_description", Some(self.short_description.as_str())),
            ("description", self.description.as_deref()),
            ("category", self.category.as_deref()),
            ("subcategory", self.subcategory.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }

    /// Parameters passed to every capability invoked for this incident
    pub fn capability_parameters(&self, intent: &str) -> Value {
        json!({
            "incident_id": self.id,
            "intent": intent,
            "short_description": self.short_description,
            "description": self.description,
            "category": self.category,
            "subcategory": self.subcategory,
            "additional_info": self.additional_info.clone().unwrap_or(Value::Null),
        })
    }
}

/// Parse incidents from a JSON document.
///
/// Accepts a bare incident object, an `{"incident": {...}}` envelope, or an
/// array of either.
pub fn parse_incidents(source: &str) -> TriageResult<Vec<Incident>> {
    let value: Value = serde_json::from_str(source)
        .map_err(|e| TriageError::invalid_incident(format!("malformed JSON: {e}")))?;

    match value {
        Value::Array(items) => items.into_iter().map(unwrap_envelope).collect(),
        other => Ok(vec![unwrap_envelope(other)?]),
    }
}

fn unwrap_envelope(value: Value) -> TriageResult<Incident> {
    let body = match value {
        Value::Object(mut map) => match map.remove("incident") {
            Some(inner @ Value::Object(_)) => inner,
            Some(_) => {
                return Err(TriageError::invalid_incident(
                    "`incident` envelope must hold an object",
                ))
            }
            None => Value::Object(map),
        },
        _ => {
            return Err(TriageError::invalid_incident(
                "incident must be a JSON object",
            ))
        }
    };
    serde_json::from_value(body).map_err(|e| TriageError::invalid_incident(e.to_string()))
}

/// Where a classification came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    /// Deterministic keyword rules
    Keyword,
    /// The `classify_intent` capability
    Capability,
    /// Classifier unavailable or returned an unusable payload
    Fallback,
}

impl std::fmt::Display for ClassificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyword => write!(f, "keyword"),
            Self::Capability => write!(f, "capability"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Intent label plus confidence, produced once per incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Always an intent present in the active taxonomy
    pub intent: String,
    /// Always in [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    pub source: ClassificationSource,
}

impl ClassificationResult {
    /// Normalize a raw classifier verdict against the taxonomy.
    ///
    /// Out-of-taxonomy intents become `unknown` with confidence capped at
    /// `unknown_cap`. NaN confidence is treated as zero.
    pub fn normalize(
        raw_intent: &str,
        raw_confidence: f64,
        reasoning: impl Into<String>,
        source: ClassificationSource,
        taxonomy: &IntentTaxonomy,
        unknown_cap: f64,
    ) -> Self {
        let confidence = if raw_confidence.is_nan() {
            0.0
        } else {
            raw_confidence.clamp(0.0, 1.0)
        };
        let intent = raw_intent.trim();
        let mut reasoning = reasoning.into();

        if taxonomy.contains(intent) && intent != UNKNOWN_INTENT {
            return Self {
                intent: intent.to_string(),
                confidence,
                reasoning,
                source,
            };
        }

        if intent != UNKNOWN_INTENT {
            let note = format!("intent `{intent}` not in taxonomy; normalized to unknown");
            reasoning = if reasoning.is_empty() {
                note
            } else {
                format!("{reasoning} ({note})")
            };
        }
        Self {
            intent: UNKNOWN_INTENT.to_string(),
            confidence: confidence.min(unknown_cap.clamp(0.0, 1.0)),
            reasoning,
            source,
        }
    }

    /// Result used when the classifier cannot produce a verdict
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            intent: UNKNOWN_INTENT.to_string(),
            confidence: 0.0,
            reasoning: reason.into(),
            source: ClassificationSource::Fallback,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.intent == UNKNOWN_INTENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_blank_short_description() {
        let incident = Incident::new("INC001", "   ");
        let err = incident.validate().unwrap_err();
        assert_eq!(err.kind(), "invalid_incident");
        assert!(Incident::new("", "Glue job failed").validate().is_err());
        assert!(Incident::new("INC001", "Glue job failed").validate().is_ok());
    }

    #[test]
    fn test_parse_accepts_sys_id_and_envelope() {
        let source = r#"{"incident": {"sys_id": "abc123", "short_description": "EMR step failed", "category": "emr"}}"#;
        let incidents = parse_incidents(source).unwrap();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].id, "abc123");
        assert_eq!(incidents[0].category.as_deref(), Some("emr"));
    }

    #[test]
    fn test_parse_array_of_mixed_envelopes() {
        let source = r#"[
            {"id": "1", "short_description": "a"},
            {"incident": {"id": "2", "short_description": "b", "additional_info": {"job_name": "etl"}}}
        ]"#;
        let incidents = parse_incidents(source).unwrap();
        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[1].additional_info, Some(json!({"job_name": "etl"})));
    }

    #[test]
    fn test_parse_missing_short_description_is_caught_by_validate() {
        let incidents = parse_incidents(r#"{"id": "INC9"}"#).unwrap();
        assert!(incidents[0].validate().is_err());
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse_incidents("42").is_err());
        assert!(parse_incidents(r#"{"incident": "nope"}"#).is_err());
        assert!(parse_incidents("{not json").is_err());
    }

    #[test]
    fn test_text_fields_skip_missing() {
        let incident = Incident::new("1", "Glue job failed").with_category("glue");
        let fields: Vec<_> = incident.text_fields().map(|(n, _)| n).collect();
        assert_eq!(fields, vec!["short_description", "category"]);
    }

    #[test]
    fn test_normalize_unknown_intent_caps_confidence() {
        let t = IntentTaxonomy::builtin();
        let c = ClassificationResult::normalize(
            "printer_on_fire",
            0.97,
            "",
            ClassificationSource::Capability,
            t,
            0.5,
        );
        assert_eq!(c.intent, UNKNOWN_INTENT);
        assert_eq!(c.confidence, 0.5);
        assert!(c.reasoning.contains("printer_on_fire"));

        let low = ClassificationResult::normalize(
            "printer_on_fire",
            0.2,
            "",
            ClassificationSource::Capability,
            t,
            0.5,
        );
        assert_eq!(low.confidence, 0.2);
    }

    #[test]
    fn test_normalize_clamps_and_handles_nan() {
        let t = IntentTaxonomy::builtin();
        let high = ClassificationResult::normalize(
            "glue_etl_failure",
            1.7,
            "r",
            ClassificationSource::Keyword,
            t,
            0.5,
        );
        assert_eq!(high.confidence, 1.0);
        assert_eq!(high.intent, "glue_etl_failure");

        let nan = ClassificationResult::normalize(
            "glue_etl_failure",
            f64::NAN,
            "r",
            ClassificationSource::Keyword,
            t,
            0.5,
        );
        assert_eq!(nan.confidence, 0.0);
    }

    #[test]
    fn test_unavailable_is_zero_confidence_unknown() {
        let c = ClassificationResult::unavailable("gateway down");
        assert!(c.is_unknown());
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.source, ClassificationSource::Fallback);
    }
}
