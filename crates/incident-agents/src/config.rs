use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use coordination::{GateConfig, IntentTaxonomy, PolicyConfig, TriageError, TriageResult};
use serde::{Deserialize, Serialize};

/// Capability provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityConfig {
    /// Per-invocation timeout in seconds
    pub timeout_secs: u64,
    /// Maximum in-flight investigation calls per incident
    pub max_concurrent_investigations: usize,
    /// Capability gateway base URL; unset means the simulated provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    /// Bearer token sent to the gateway
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_token: Option<String>,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_concurrent_investigations: 4,
            gateway_url: None,
            gateway_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Confidence ceiling for intents that fall back to `unknown`
    pub unknown_confidence_cap: f64,
    /// Classify through the `classify_intent` capability instead of keyword rules
    pub use_capability: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            unknown_confidence_cap: 0.5,
            use_capability: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Wall-clock budget for one incident, all stages included
    pub deadline_secs: u64,
    /// Incidents processed concurrently by `process_batch`
    pub max_concurrent_incidents: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 300,
            max_concurrent_incidents: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RcaConfig {
    pub dir: PathBuf,
    pub prefix: String,
    /// Upper bound on one store call; a slower store counts as unavailable
    pub store_timeout_secs: u64,
}

impl Default for RcaConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./rca"),
            prefix: "rca/".into(),
            store_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// JSONL file to append per-incident records to; unset disables the sink
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Top-level triage configuration.
///
/// Precedence: `TRIAGE_*` environment variables, then the TOML file, then
/// the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Custom taxonomy TOML; unset means the built-in table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy_path: Option<PathBuf>,
    pub gates: GateConfig,
    pub policy: PolicyConfig,
    pub capabilities: CapabilityConfig,
    pub classifier: ClassifierConfig,
    pub pipeline: PipelineConfig,
    pub rca: RcaConfig,
    pub telemetry: TelemetryConfig,
}

impl TriageConfig {
    /// Load from an explicit path (or `TRIAGE_CONFIG`), apply environment
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("TRIAGE_CONFIG").map(PathBuf::from));

        let mut config = match path {
            Some(ref p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `TRIAGE_*` overrides from a key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = parse_var(&get, "TRIAGE_MIN_CONFIDENCE")? {
            self.gates.min_confidence = v;
        }
        if let Some(v) = parse_var(&get, "TRIAGE_WEIGHT_CONFIDENCE")? {
            self.policy.weights.confidence = v;
        }
        if let Some(v) = parse_var(&get, "TRIAGE_WEIGHT_INVESTIGATION")? {
            self.policy.weights.investigation = v;
        }
        if let Some(v) = parse_var(&get, "TRIAGE_WEIGHT_REMEDIATION")? {
            self.policy.weights.remediation = v;
        }
        if let Some(v) = parse_var(&get, "TRIAGE_AUTO_CLOSE_THRESHOLD")? {
            self.policy.auto_close_threshold = v;
        }
        if let Some(v) = parse_var(&get, "TRIAGE_AUTO_RETRY_THRESHOLD")? {
            self.policy.auto_retry_threshold = v;
        }
        if let Some(v) = parse_var(&get, "TRIAGE_CAPABILITY_TIMEOUT_SECS")? {
            self.capabilities.timeout_secs = v;
        }
        if let Some(v) = parse_var(&get, "TRIAGE_MAX_CONCURRENT_INVESTIGATIONS")? {
            self.capabilities.max_concurrent_investigations = v;
        }
        if let Some(v) = get("TRIAGE_GATEWAY_URL") {
            self.capabilities.gateway_url = Some(v);
        }
        if let Some(v) = get("TRIAGE_GATEWAY_TOKEN") {
            self.capabilities.gateway_token = Some(v);
        }
        if let Some(v) = parse_var(&get, "TRIAGE_CLASSIFIER_CAPABILITY")? {
            self.classifier.use_capability = v;
        }
        if let Some(v) = parse_var(&get, "TRIAGE_PIPELINE_DEADLINE_SECS")? {
            self.pipeline.deadline_secs = v;
        }
        if let Some(v) = parse_var(&get, "TRIAGE_MAX_CONCURRENT_INCIDENTS")? {
            self.pipeline.max_concurrent_incidents = v;
        }
        if let Some(v) = get("TRIAGE_RCA_DIR") {
            self.rca.dir = PathBuf::from(v);
        }
        if let Some(v) = get("TRIAGE_RCA_PREFIX") {
            self.rca.prefix = v;
        }
        if let Some(v) = parse_var(&get, "TRIAGE_RCA_STORE_TIMEOUT_SECS")? {
            self.rca.store_timeout_secs = v;
        }
        if let Some(v) = get("TRIAGE_TELEMETRY_PATH") {
            self.telemetry.path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("TRIAGE_TAXONOMY") {
            self.taxonomy_path = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> TriageResult<()> {
        self.policy.validate()?;
        if !(0.0..=1.0).contains(&self.gates.min_confidence) {
            return Err(TriageError::config(format!(
                "gates.min_confidence must be within [0, 1], got {}",
                self.gates.min_confidence
            )));
        }
        if !(0.0..=1.0).contains(&self.classifier.unknown_confidence_cap) {
            return Err(TriageError::config(format!(
                "classifier.unknown_confidence_cap must be within [0, 1], got {}",
                self.classifier.unknown_confidence_cap
            )));
        }
        if self.capabilities.timeout_secs == 0 {
            return Err(TriageError::config("capabilities.timeout_secs must be > 0"));
        }
        if self.capabilities.max_concurrent_investigations == 0 {
            return Err(TriageError::config(
                "capabilities.max_concurrent_investigations must be > 0",
            ));
        }
        if self.rca.store_timeout_secs == 0 {
            return Err(TriageError::config("rca.store_timeout_secs must be > 0"));
        }
        if self.pipeline.deadline_secs == 0 {
            return Err(TriageError::config("pipeline.deadline_secs must be > 0"));
        }
        if self.pipeline.max_concurrent_incidents == 0 {
            return Err(TriageError::config(
                "pipeline.max_concurrent_incidents must be > 0",
            ));
        }
        Ok(())
    }

    pub fn capability_timeout(&self) -> Duration {
        Duration::from_secs(self.capabilities.timeout_secs)
    }

    pub fn rca_store_timeout(&self) -> Duration {
        Duration::from_secs(self.rca.store_timeout_secs)
    }

    pub fn pipeline_deadline(&self) -> Duration {
        Duration::from_secs(self.pipeline.deadline_secs)
    }

    /// Load the taxonomy once; shared read-only by every pipeline run.
    pub fn load_taxonomy(&self) -> Result<Arc<IntentTaxonomy>> {
        match self.taxonomy_path {
            Some(ref path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read taxonomy {}", path.display()))?;
                let taxonomy = IntentTaxonomy::from_toml_str(&text)
                    .with_context(|| format!("Invalid taxonomy {}", path.display()))?;
                Ok(Arc::new(taxonomy))
            }
            None => Ok(Arc::new(IntentTaxonomy::builtin().clone())),
        }
    }

    /// Copy safe to print: the gateway token is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.capabilities.gateway_token.is_some() {
            copy.capabilities.gateway_token = Some("***".into());
        }
        copy
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{key}={raw:?} is invalid: {e}")),
        None => Ok(None),
    }
}
