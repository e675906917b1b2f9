//! Mock resource store for testing error propagation.

use super::{ObjectKey, ResourceError, ResourceStore};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Store that fails every call with [`ResourceError::Backend`].
#[derive(Debug)]
pub struct FailingStore {
    message: String,
    call_count: AtomicUsize,
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new("Mock store error")
    }
}

impl FailingStore {
    /// Create a store failing with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, ResourceError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Err(ResourceError::Backend(self.message.clone()))
    }
}

#[async_trait::async_trait]
impl ResourceStore for FailingStore {
    async fn create(&self, _key: ObjectKey, _object: Value) -> Result<(), ResourceError> {
        self.fail()
    }

    async fn get(&self, _key: &ObjectKey) -> Result<Value, ResourceError> {
        self.fail()
    }

    async fn list(&self, _kind: &str, _namespace: Option<&str>) -> Result<Vec<Value>, ResourceError> {
        self.fail()
    }

    async fn delete(&self, _key: &ObjectKey) -> Result<(), ResourceError> {
        self.fail()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_store_fails_and_counts_calls() {
        let store = FailingStore::default();
        let key = ObjectKey::new("Pod", Some("default"), "web");

        let err = store.get(&key).await.expect_err("always fails");
        assert!(err.to_string().contains("Mock store error"));
        store.list("Pod", None).await.expect_err("always fails");

        assert_eq!(store.call_count(), 2);
    }
}
