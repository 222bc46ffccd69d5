//! Capability gateway client.
//!
//! `POST <gateway>/invoke` with `{capability, parameters}`; the gateway
//! answers `{success, payload?, error?}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CapabilityError, CapabilityProvider};

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    capability: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    success: bool,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl InvokeResponse {
    fn into_result(self) -> Result<Value, CapabilityError> {
        if self.success {
            Ok(self.payload.unwrap_or(Value::Null))
        } else {
            Err(CapabilityError::Remote(
                self.error
                    .unwrap_or_else(|| "gateway reported failure without detail".into()),
            ))
        }
    }
}

pub struct HttpCapabilityProvider {
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpCapabilityProvider {
    /// `timeout` bounds the HTTP exchange; the pipeline applies its own
    /// per-capability timeout on top.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Self {
        Self {
            endpoint: format!("{}/invoke", base_url.trim_end_matches('/')),
            token,
            timeout,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CapabilityProvider for HttpCapabilityProvider {
    async fn invoke(&self, capability: &str, parameters: &Value) -> Result<Value, CapabilityError> {
        let mut request = self.client.post(&self.endpoint).json(&InvokeRequest {
            capability,
            parameters,
        });
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CapabilityError::Timeout(self.timeout)
            } else {
                CapabilityError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                CapabilityError::Transport(format!("gateway error ({status}): {body}"))
            } else {
                CapabilityError::Remote(format!("gateway rejected call ({status}): {body}"))
            });
        }

        let body: InvokeResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))?;
        body.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_normalizes_trailing_slash() {
        let p = HttpCapabilityProvider::new("http://gw:8080/", None, Duration::from_secs(1));
        assert_eq!(p.endpoint(), "http://gw:8080/invoke");
    }

    #[test]
    fn test_response_mapping() {
        let ok: InvokeResponse =
            serde_json::from_value(json!({"success": true, "payload": {"status": "FAILED"}})).unwrap();
        assert_eq!(ok.into_result().unwrap()["status"], "FAILED");

        let bad: InvokeResponse =
            serde_json::from_value(json!({"success": false, "error": "no such job"})).unwrap();
        assert_eq!(
            bad.into_result().unwrap_err(),
            CapabilityError::Remote("no such job".into())
        );
    }

    #[test]
    fn test_request_shape() {
        let params = json!({"incident_id": "INC1"});
        let body = serde_json::to_value(InvokeRequest {
            capability: "get_glue_logs",
            parameters: &params,
        })
        .unwrap();
        assert_eq!(body, json!({"capability": "get_glue_logs", "parameters": {"incident_id": "INC1"}}));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_an_error() {
        let p = HttpCapabilityProvider::new("http://127.0.0.1:9", None, Duration::from_millis(500));
        let err = p.invoke("get_glue_logs", &json!({})).await.unwrap_err();
        assert!(
            matches!(err, CapabilityError::Transport(_) | CapabilityError::Timeout(_)),
            "{err:?}"
        );
    }
}
