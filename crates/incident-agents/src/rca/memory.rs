//! In-process RCA store for dry runs and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use coordination::RcaDocument;

use super::{RcaStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryRcaStore {
    documents: Mutex<HashMap<String, RcaDocument>>,
}

impl MemoryRcaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, locator: &str) -> Option<RcaDocument> {
        self.documents
            .lock()
            .ok()
            .and_then(|docs| docs.get(locator).cloned())
    }

    /// All stored documents for one incident
    pub fn for_incident(&self, incident_id: &str) -> Vec<RcaDocument> {
        self.documents
            .lock()
            .map(|docs| {
                docs.values()
                    .filter(|d| d.incident_id == incident_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RcaStore for MemoryRcaStore {
    async fn store(&self, document: &RcaDocument) -> Result<String, StoreError> {
        let locator = format!("mem://rca/{}/{}", document.incident_id, document.document_id);
        let mut docs = self
            .documents
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        docs.insert(locator.clone(), document.clone());
        Ok(locator)
    }
}
