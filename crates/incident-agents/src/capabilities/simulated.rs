//! Simulated provider with deterministic canned payloads.
//!
//! Used when no gateway is configured, for dry runs and for tests. Every
//! payload echoes the incident id so RCA documents stay traceable.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{CapabilityError, CapabilityProvider, CapabilityRegistry};

/// (capability, payload) pairs served by default
fn canned_payloads() -> Vec<(&'static str, Value)> {
    vec![
        (
            "get_emr_logs",
            json!({
                "summary": "EMR step failed with OutOfMemoryError",
                "root_cause": "EMR step exceeded memory allocation",
                "cluster_id": "j-SIMCLUSTER",
            }),
        ),
        (
            "get_glue_logs",
            json!({
                "summary": "Glue job failed with timeout",
                "root_cause": "Glue job exceeded timeout threshold",
                "job_run_state": "TIMEOUT",
            }),
        ),
        (
            "get_mwaa_logs",
            json!({
                "summary": "DAG task failed after upstream sensor timed out",
                "root_cause": "Upstream sensor exceeded poke timeout",
                "dag_run_state": "failed",
            }),
        ),
        (
            "get_athena_query",
            json!({
                "summary": "Athena query exhausted resources at this scale factor",
                "root_cause": "Query exceeded resource limits",
                "query_state": "FAILED",
            }),
        ),
        (
            "get_cloudwatch_alarm",
            json!({
                "summary": "Alarm is in ALARM state",
                "state": "ALARM",
            }),
        ),
        (
            "get_s3_logs",
            json!({
                "summary": "No objects written under the expected prefix",
                "objects": 0,
            }),
        ),
        (
            "verify_source_data",
            json!({
                "summary": "Source data not found at expected path",
                "root_cause": "Upstream data pipeline did not produce output",
                "verified": false,
            }),
        ),
        (
            "retry_emr",
            json!({
                "status": "submitted",
                "resource_id": "j-SIMCLUSTER",
                "new_execution_id": "s-SIMNEWSTEP",
            }),
        ),
        (
            "retry_glue_job",
            json!({
                "status": "submitted",
                "resource_id": "sim-glue-job",
                "new_execution_id": "jr_sim123",
            }),
        ),
        (
            "retry_airflow_dag",
            json!({
                "status": "submitted",
                "resource_id": "sim_dag",
                "new_execution_id": "manual__2024-01-15T00:00:00+00:00",
            }),
        ),
        (
            "retry_athena_query",
            json!({
                "status": "submitted",
                "new_execution_id": "sim-query-exec",
            }),
        ),
        (
            "retry_kafka",
            json!({
                "status": "submitted",
                "message": "replay requested for failed events",
            }),
        ),
    ]
}

pub struct SimulatedProvider {
    registry: CapabilityRegistry,
}

impl SimulatedProvider {
    pub fn new() -> Self {
        let mut registry = CapabilityRegistry::new();
        for (name, payload) in canned_payloads() {
            registry.register_fn(name, move |params: Value| {
                let mut payload = payload.clone();
                let incident_id = params.get("incident_id").cloned().unwrap_or(Value::Null);
                async move {
                    if let Value::Object(ref mut map) = payload {
                        map.insert("incident_id".into(), incident_id);
                        map.insert("simulated".into(), Value::Bool(true));
                    }
                    Ok(payload)
                }
            });
        }
        Self { registry }
    }

    /// Make `capability` fail with a remote error
    pub fn failing(mut self, capability: &str, message: &str) -> Self {
        let message = message.to_string();
        self.registry.register_fn(capability, move |_| {
            let message = message.clone();
            async move { Err(CapabilityError::Remote(message)) }
        });
        self
    }

    /// Serve `payload` for `capability`
    pub fn responding(mut self, capability: &str, payload: Value) -> Self {
        self.registry.register_fn(capability, move |_| {
            let payload = payload.clone();
            async move { Ok(payload) }
        });
        self
    }

    pub fn capabilities(&self) -> Vec<&str> {
        self.registry.names()
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CapabilityProvider for SimulatedProvider {
    async fn invoke(&self, capability: &str, parameters: &Value) -> Result<Value, CapabilityError> {
        self.registry.invoke(capability, parameters).await
    }
}
