//! In-process capability registry: name → handler.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{CapabilityError, CapabilityProvider};

/// One named capability implementation.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn call(&self, parameters: &Value) -> Result<Value, CapabilityError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CapabilityHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, CapabilityError>> + Send + 'static,
{
    async fn call(&self, parameters: &Value) -> Result<Value, CapabilityError> {
        (self.0)(parameters.clone()).await
    }
}

/// Registry of handlers; also a [`CapabilityProvider`].
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    handlers: HashMap<String, Arc<dyn CapabilityHandler>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one with the same name.
    pub fn register(&mut self, name: &str, handler: Arc<dyn CapabilityHandler>) -> &mut Self {
        self.handlers.insert(name.to_string(), handler);
        self
    }

    /// Register an async closure as a handler.
    pub fn register_fn<F, Fut>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CapabilityError>> + Send + 'static,
    {
        self.register(name, Arc::new(FnHandler(f)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl CapabilityProvider for CapabilityRegistry {
    async fn invoke(&self, capability: &str, parameters: &Value) -> Result<Value, CapabilityError> {
        let handler = self
            .handlers
            .get(capability)
            .cloned()
            .ok_or_else(|| CapabilityError::NotRegistered(capability.to_string()))?;
        handler.call(parameters).await
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_registered_handler_receives_parameters() {
        let mut registry = CapabilityRegistry::new();
        registry.register_fn("echo", |params| async move { Ok(json!({ "echo": params })) });

        let out = registry.invoke("echo", &json!({"incident_id": "INC1"})).await.unwrap();
        assert_eq!(out["echo"]["incident_id"], "INC1");
    }

    #[tokio::test]
    async fn test_unknown_capability_not_registered() {
        let registry = CapabilityRegistry::new();
        let err = registry.invoke("get_glue_logs", &json!({})).await.unwrap_err();
        assert_eq!(err, CapabilityError::NotRegistered("get_glue_logs".into()));
    }

    #[test]
    fn test_names_sorted() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_fn("b", |_| async { Ok(Value::Null) })
            .register_fn("a", |_| async { Ok(Value::Null) });
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert!(registry.contains("a"));
    }
}
