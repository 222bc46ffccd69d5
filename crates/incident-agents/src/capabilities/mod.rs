//! Capability Provider — the seam to diagnostic and remediation tools
//!
//! ```text
//!  Investigator ─┐                       ┌─ CapabilityRegistry (in-process handlers)
//!                ├─▶ AuthorizedProvider ─┼─ HttpCapabilityProvider (gateway)
//!  Executor ─────┘   (taxonomy check)    └─ SimulatedProvider (canned payloads)
//! ```
//!
//! Both stages share one invocation interface; the investigator fans calls
//! out concurrently while the executor issues them one at a time.

pub mod authorized;
pub mod http;
pub mod registry;
pub mod simulated;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use coordination::{CapabilityResult, ErrorKind};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub use authorized::{AuthorizedProvider, Scope};
pub use http::HttpCapabilityProvider;
pub use registry::{CapabilityHandler, CapabilityRegistry};
pub use simulated::SimulatedProvider;

/// Errors a capability provider can return
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CapabilityError {
    #[error("capability `{0}` is not registered")]
    NotRegistered(String),

    #[error("capability `{capability}` is not authorized for intent `{intent}`")]
    NotAuthorized { capability: String, intent: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote failure: {0}")]
    Remote(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl CapabilityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotRegistered(_) => ErrorKind::NotRegistered,
            Self::NotAuthorized { .. } => ErrorKind::NotAuthorized,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Remote(_) => ErrorKind::Remote,
            Self::Transport(_) => ErrorKind::Transport,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
        }
    }
}

/// Invokes named capabilities. Implementations own transport and auth.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    async fn invoke(&self, capability: &str, parameters: &Value) -> Result<Value, CapabilityError>;
}

/// Invoke one capability under its own timeout and record the outcome.
///
/// Never fails: timeouts and provider errors become failed results.
pub async fn invoke_timed(
    provider: &dyn CapabilityProvider,
    capability: &str,
    parameters: &Value,
    timeout: Duration,
) -> CapabilityResult {
    let start = Instant::now();
    let outcome = tokio::time::timeout(timeout, provider.invoke(capability, parameters))
        .await
        .unwrap_or(Err(CapabilityError::Timeout(timeout)));
    let latency_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(payload) => {
            debug!(capability, latency_ms, "capability succeeded");
            CapabilityResult::succeeded(capability, payload, latency_ms)
        }
        Err(e) => {
            let kind = e.kind();
            warn!(capability, latency_ms, %kind, error = %e, "capability failed, recorded as result");
            CapabilityResult::failed(capability, kind, e.to_string(), latency_ms)
        }
    }
}
