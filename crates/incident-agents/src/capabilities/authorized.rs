//! Taxonomy-scoped provider wrapper.
//!
//! Whatever a stage asks for, only capabilities the taxonomy lists for the
//! current intent ever reach the underlying provider.

use std::sync::Arc;

use async_trait::async_trait;
use coordination::IntentEntry;
use serde_json::Value;
use tracing::warn;

use super::{CapabilityError, CapabilityProvider};

/// Which half of the taxonomy entry authorizes calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Investigation,
    Remediation,
}

pub struct AuthorizedProvider {
    inner: Arc<dyn CapabilityProvider>,
    entry: IntentEntry,
    scope: Scope,
}

impl AuthorizedProvider {
    pub fn new(inner: Arc<dyn CapabilityProvider>, entry: &IntentEntry, scope: Scope) -> Self {
        Self {
            inner,
            entry: entry.clone(),
            scope,
        }
    }

    pub fn is_authorized(&self, capability: &str) -> bool {
        match self.scope {
            Scope::Investigation => self.entry.authorizes_investigation(capability),
            Scope::Remediation => self.entry.authorizes_remediation(capability),
        }
    }
}

#[async_trait]
impl CapabilityProvider for AuthorizedProvider {
    async fn invoke(&self, capability: &str, parameters: &Value) -> Result<Value, CapabilityError> {
        if !self.is_authorized(capability) {
            warn!(
                capability,
                intent = %self.entry.intent,
                scope = ?self.scope,
                "blocked unauthorized capability"
            );
            return Err(CapabilityError::NotAuthorized {
                capability: capability.to_string(),
                intent: self.entry.intent.clone(),
            });
        }
        self.inner.invoke(capability, parameters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::MockCapabilityProvider;
    use coordination::IntentTaxonomy;
    use serde_json::json;

    #[tokio::test]
    async fn test_authorized_call_passes_through() {
        let mut mock = MockCapabilityProvider::new();
        mock.expect_invoke()
            .times(1)
            .returning(|_, _| Ok(json!({"ok": true})));
        let entry = IntentTaxonomy::builtin().resolve("glue_etl_failure");
        let provider = AuthorizedProvider::new(Arc::new(mock), entry, Scope::Investigation);

        assert!(provider.invoke("get_glue_logs", &json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_unauthorized_call_never_reaches_provider() {
        let mut mock = MockCapabilityProvider::new();
        mock.expect_invoke().times(0);
        let entry = IntentTaxonomy::builtin().resolve("glue_etl_failure");
        let provider = AuthorizedProvider::new(Arc::new(mock), entry, Scope::Remediation);

        let err = provider.invoke("retry_emr", &json!({})).await.unwrap_err();
        assert!(matches!(err, CapabilityError::NotAuthorized { .. }));
    }

    #[tokio::test]
    async fn test_scope_separates_investigation_from_remediation() {
        let mut mock = MockCapabilityProvider::new();
        mock.expect_invoke().times(0);
        let entry = IntentTaxonomy::builtin().resolve("glue_etl_failure");
        let provider = AuthorizedProvider::new(Arc::new(mock), entry, Scope::Investigation);

        assert!(!provider.is_authorized("retry_glue_job"));
        assert!(provider.invoke("retry_glue_job", &json!({})).await.is_err());
    }
}
