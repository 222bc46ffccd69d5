//! RCA Builder — assemble and durably store one document per incident.
//!
//! ```text
//!   RcaParts ──▶ RcaDocument::assemble ──▶ RcaStore::store ──▶ locator
//!                   (uuid + digest)         (fs / memory)
//! ```
//!
//! A storage failure never erases the decision: the builder hands the
//! assembled document back together with the error. A store that does not
//! answer within the store timeout is treated as unavailable.

pub mod fs_store;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coordination::{RcaDocument, RcaParts, TriageError};
use thiserror::Error;
use tracing::{error, info};

pub use fs_store::FsRcaStore;
pub use memory::MemoryRcaStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("RCA storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("RCA serialization failed: {0}")]
    Serialize(String),

    #[error("RCA storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for TriageError {
    fn from(e: StoreError) -> Self {
        TriageError::persistence(e.to_string())
    }
}

/// Durable document storage. Returns a locator for the stored document.
#[async_trait]
pub trait RcaStore: Send + Sync {
    async fn store(&self, document: &RcaDocument) -> Result<String, StoreError>;
}

/// Result of one build: the document is always present, the locator only
/// when storage succeeded.
#[derive(Debug, Clone)]
pub struct BuiltRca {
    pub document: Option<RcaDocument>,
    pub locator: Option<String>,
    pub error: Option<TriageError>,
}

impl BuiltRca {
    pub fn persisted(&self) -> bool {
        self.locator.is_some()
    }
}

/// Store timeout when none is configured
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RcaBuilder {
    store: Arc<dyn RcaStore>,
    timeout: Duration,
}

impl RcaBuilder {
    pub fn new(store: Arc<dyn RcaStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn build_rca_document(&self, parts: RcaParts) -> BuiltRca {
        let incident_id = parts.incident.id.clone();
        let document = match RcaDocument::assemble(parts) {
            Ok(doc) => doc,
            Err(e) => {
                error!(incident_id = %incident_id, error = %e, "RCA assembly failed");
                return BuiltRca {
                    document: None,
                    locator: None,
                    error: Some(e),
                };
            }
        };

        let stored = tokio::time::timeout(self.timeout, self.store.store(&document))
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::Unavailable(format!(
                    "no response within {:?}",
                    self.timeout
                )))
            });
        match stored {
            Ok(locator) => {
                info!(
                    incident_id = %incident_id,
                    document_id = %document.document_id,
                    rca_uri = %locator,
                    "RCA stored"
                );
                BuiltRca {
                    document: Some(document),
                    locator: Some(locator),
                    error: None,
                }
            }
            Err(e) => {
                error!(incident_id = %incident_id, error = %e, "RCA storage failed");
                BuiltRca {
                    document: Some(document),
                    locator: None,
                    error: Some(e.into()),
                }
            }
        }
    }
}
