//! Intent table — which capabilities each intent authorizes
//!
//! The table is immutable once built. The built-in table is materialized once
//! per process behind a `Lazy` and shared by reference; custom tables are
//! loaded from TOML at startup and shared behind an `Arc`.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::decision::Decision;
use crate::error::{TriageError, TriageResult};

/// Fallback intent for anything the classifier cannot place
pub const UNKNOWN_INTENT: &str = "unknown";

/// A remediation capability an intent may invoke
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationCapability {
    /// Capability name as registered with the provider
    pub name: String,
    /// Whether the capability changes real system state (retries, restarts)
    #[serde(default)]
    pub destructive: bool,
}

impl RemediationCapability {
    pub fn destructive(name: &str) -> Self {
        Self {
            name: name.to_string(),
            destructive: true,
        }
    }

    pub fn read_only(name: &str) -> Self {
        Self {
            name: name.to_string(),
            destructive: false,
        }
    }
}

/// One row of the intent taxonomy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentEntry {
    /// Intent name (unique key)
    pub intent: String,
    /// Diagnostic capabilities, in declared (report) order
    #[serde(default)]
    pub investigation_capabilities: Vec<String>,
    /// Remediation capabilities, in declared (execution) order
    #[serde(default)]
    pub remediation_capabilities: Vec<RemediationCapability>,
    /// Decision that bypasses policy scoring entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_override: Option<Decision>,
    /// Investigation is skipped by design for this intent
    #[serde(default)]
    pub skip_investigation: bool,
    /// Free-text description for operators
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl IntentEntry {
    pub fn new(intent: &str) -> Self {
        Self {
            intent: intent.to_string(),
            investigation_capabilities: Vec::new(),
            remediation_capabilities: Vec::new(),
            forced_override: None,
            skip_investigation: false,
            description: String::new(),
        }
    }

    pub fn investigate(mut self, capabilities: &[&str]) -> Self {
        self.investigation_capabilities = capabilities.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn remediate(mut self, capabilities: Vec<RemediationCapability>) -> Self {
        self.remediation_capabilities = capabilities;
        self
    }

    pub fn forced(mut self, decision: Decision) -> Self {
        self.forced_override = Some(decision);
        self
    }

    pub fn skipping_investigation(mut self) -> Self {
        self.skip_investigation = true;
        self
    }

    pub fn described(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Whether the Pre-Action Gate should demand evidence for this intent
    pub fn requires_investigation(&self) -> bool {
        !self.skip_investigation && !self.investigation_capabilities.is_empty()
    }

    pub fn authorizes_investigation(&self, capability: &str) -> bool {
        self.investigation_capabilities.iter().any(|c| c == capability)
    }

    pub fn authorizes_remediation(&self, capability: &str) -> bool {
        self.remediation_capabilities
            .iter()
            .any(|c| c.name == capability)
    }

    pub fn remediation_names(&self) -> Vec<String> {
        self.remediation_capabilities
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    fn validate(&self) -> TriageResult<()> {
        if self.intent.trim().is_empty() {
            return Err(TriageError::taxonomy("intent name must not be empty"));
        }
        let mut seen = HashSet::new();
        for name in self
            .investigation_capabilities
            .iter()
            .chain(self.remediation_capabilities.iter().map(|c| &c.name))
        {
            if name.trim().is_empty() {
                return Err(TriageError::taxonomy(format!(
                    "intent `{}` declares an empty capability name",
                    self.intent
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(TriageError::taxonomy(format!(
                    "intent `{}` declares capability `{}` twice",
                    self.intent, name
                )));
            }
        }
        Ok(())
    }
}

/// On-disk shape of a taxonomy file (`[[intents]]` tables)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyFile {
    pub intents: Vec<IntentEntry>,
}

/// The immutable intent → capabilities table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "TaxonomyFile", try_from = "TaxonomyFile")]
pub struct IntentTaxonomy {
    entries: Vec<IntentEntry>,
    index: HashMap<String, usize>,
}

static BUILTIN: Lazy<IntentTaxonomy> = Lazy::new(IntentTaxonomy::builtin_table);

impl IntentTaxonomy {
    /// Build and validate a taxonomy from entries.
    ///
    /// Intent names must be unique and an `unknown` entry must exist.
    pub fn from_entries(entries: Vec<IntentEntry>) -> TriageResult<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            entry.validate()?;
            if index.insert(entry.intent.clone(), i).is_some() {
                return Err(TriageError::taxonomy(format!(
                    "duplicate intent `{}`",
                    entry.intent
                )));
            }
        }
        if !index.contains_key(UNKNOWN_INTENT) {
            return Err(TriageError::taxonomy(format!(
                "taxonomy must define the `{}` intent",
                UNKNOWN_INTENT
            )));
        }
        Ok(Self { entries, index })
    }

    /// Parse a TOML taxonomy document
    pub fn from_toml_str(source: &str) -> TriageResult<Self> {
        let file: TaxonomyFile =
            toml::from_str(source).map_err(|e| TriageError::taxonomy(e.to_string()))?;
        Self::from_entries(file.intents)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> TriageResult<String> {
        toml::to_string_pretty(&TaxonomyFile::from(self.clone()))
            .map_err(|e| TriageError::taxonomy(e.to_string()))
    }

    /// The process-wide built-in table
    pub fn builtin() -> &'static IntentTaxonomy {
        &BUILTIN
    }

    /// Look up an intent exactly
    pub fn get(&self, intent: &str) -> Option<&IntentEntry> {
        self.index.get(intent).map(|&i| &self.entries[i])
    }

    /// Look up an intent, falling back to `unknown`
    pub fn resolve(&self, intent: &str) -> &IntentEntry {
        self.get(intent)
            .or_else(|| self.get(UNKNOWN_INTENT))
            .unwrap_or(&self.entries[0])
    }

    pub fn contains(&self, intent: &str) -> bool {
        self.index.contains_key(intent)
    }

    pub fn entries(&self) -> &[IntentEntry] {
        &self.entries
    }

    pub fn intents(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.intent.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn builtin_table() -> Self {
        use RemediationCapability as R;

        let data_checks = ["verify_source_data", "get_s3_logs"];
        let entries = vec![
            IntentEntry::new("dag_failure")
                .investigate(&["get_mwaa_logs"])
                .remediate(vec![R::destructive("retry_airflow_dag")])
                .described("Airflow DAG run failed"),
            IntentEntry::new("dag_alarm")
                .investigate(&["get_mwaa_logs", "get_cloudwatch_alarm"])
                .described("DAG status alarm fired"),
            IntentEntry::new("mwaa_failure")
                .investigate(&["get_mwaa_logs"])
                .remediate(vec![R::destructive("retry_airflow_dag")])
                .described("Managed Airflow environment failure"),
            IntentEntry::new("glue_etl_failure")
                .investigate(&["get_glue_logs"])
                .remediate(vec![R::destructive("retry_glue_job")])
                .described("Glue ETL job run failed"),
            IntentEntry::new("athena_failure")
                .investigate(&["get_athena_query"])
                .remediate(vec![R::destructive("retry_athena_query")])
                .described("Athena query failed"),
            IntentEntry::new("emr_failure")
                .investigate(&["get_emr_logs"])
                .remediate(vec![R::destructive("retry_emr")])
                .described("EMR step or cluster failure"),
            IntentEntry::new("kafka_events_failed")
                .remediate(vec![R::destructive("retry_kafka")])
                .forced(Decision::HumanReview)
                .described("Kafka event delivery failed; replay needs an operator"),
            IntentEntry::new("data_missing")
                .investigate(&data_checks)
                .described("Expected data missing at destination"),
            IntentEntry::new("source_zero_data")
                .investigate(&data_checks)
                .described("Source system delivered zero records"),
            IntentEntry::new("data_not_available")
                .investigate(&data_checks)
                .described("Data not available for consumers"),
            IntentEntry::new("batch_auto_recovery_failed")
                .investigate(&["get_cloudwatch_alarm"])
                .described("Batch auto-recovery did not succeed"),
            IntentEntry::new("access_denied")
                .investigate(&["get_s3_logs", "get_cloudwatch_alarm"])
                .forced(Decision::Escalate)
                .skipping_investigation()
                .described("Access-control issue; never auto-remediated"),
            IntentEntry::new(UNKNOWN_INTENT).described("Unclassified incident"),
        ];

        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.intent.clone(), i))
            .collect();
        Self { entries, index }
    }
}

impl From<IntentTaxonomy> for TaxonomyFile {
    fn from(taxonomy: IntentTaxonomy) -> Self {
        Self {
            intents: taxonomy.entries,
        }
    }
}

impl TryFrom<TaxonomyFile> for IntentTaxonomy {
    type Error = TriageError;

    fn try_from(file: TaxonomyFile) -> Result<Self, Self::Error> {
        Self::from_entries(file.intents)
    }
}
