//! In-memory resource store for simulated clusters.

use super::{ObjectKey, ResourceError, ResourceStore};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::trace;

/// Resource store backed by an ordered map.
///
/// Listing returns objects in key order (kind, namespace, name).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: RwLock<BTreeMap<ObjectKey, Value>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Whether an object with this key exists.
    pub async fn contains(&self, key: &ObjectKey) -> bool {
        self.objects.read().await.contains_key(key)
    }
}

#[async_trait::async_trait]
impl ResourceStore for InMemoryStore {
    async fn create(&self, key: ObjectKey, object: Value) -> Result<(), ResourceError> {
        let mut objects = self.objects.write().await;
        if objects.contains_key(&key) {
            return Err(ResourceError::AlreadyExists(key));
        }
        trace!(target: "e2e.resources.memory", key = %key, "Stored object");
        objects.insert(key, object);
        Ok(())
    }

    async fn get(&self, key: &ObjectKey) -> Result<Value, ResourceError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(key.clone()))
    }

    async fn list(&self, kind: &str, namespace: Option<&str>) -> Result<Vec<Value>, ResourceError> {
        let objects = self.objects.read().await;
        Ok(objects
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .filter(|(key, _)| namespace.map_or(true, |ns| key.namespace.as_deref() == Some(ns)))
            .map(|(_, value)| value.clone())
            .collect())
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), ResourceError> {
        let removed = self.objects.write().await.remove(key);
        match removed {
            Some(_) => {
                trace!(target: "e2e.resources.memory", key = %key, "Removed object");
                Ok(())
            }
            None => Err(ResourceError::NotFound(key.clone())),
        }
    }
}
