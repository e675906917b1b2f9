//! Cluster resource capability.
//!
//! Steps talk to the cluster through a [`Client`] obtained from
//! [`crate::Config::new_client`]. The client is a typed facade over an
//! object-safe [`ResourceStore`]; payloads are any serde type implementing
//! [`Resource`]. The framework never interprets or retries store errors: they
//! are returned to the calling step as [`ResourceError`].
//!
//! [`InMemoryStore`] backs simulated clusters; [`mock::FailingStore`] is a
//! test double that fails every call.

mod memory;
pub mod mock;

pub use memory::InMemoryStore;

use crate::context::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

/// Resource operation errors.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{0} not found")]
    NotFound(ObjectKey),

    #[error("{0} already exists")]
    AlreadyExists(ObjectKey),

    #[error("{kind} '{name}' requires a namespace")]
    MissingNamespace { kind: String, name: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Context cancelled before {operation}")]
    Cancelled { operation: &'static str },

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Identity of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    /// Resource kind, e.g. `Deployment`.
    pub kind: String,
    /// Namespace; `None` for cluster-scoped kinds.
    pub namespace: Option<String>,
    /// Object name.
    pub name: String,
}

impl ObjectKey {
    /// Build a key.
    pub fn new(kind: impl Into<String>, namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} \"{}/{}\"", self.kind, ns, self.name),
            None => write!(f, "{} \"{}\"", self.kind, self.name),
        }
    }
}

/// Object metadata shared by every resource payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object name.
    pub name: String,
    /// Namespace, for namespaced kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Object labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Metadata with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Metadata with a name and namespace.
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }
}

/// A typed resource payload.
///
/// Payloads serialize with their metadata under a top-level `metadata` field.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync {
    /// Kind name the store files the object under.
    const KIND: &'static str;

    /// Whether objects of this kind live in a namespace.
    const NAMESPACED: bool = true;

    /// Object metadata.
    fn metadata(&self) -> &ObjectMeta;
}

/// Cluster-scoped namespace object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Namespace metadata.
    pub metadata: ObjectMeta,
}

impl Namespace {
    /// Namespace with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
        }
    }
}

impl Resource for Namespace {
    const KIND: &'static str = "Namespace";
    const NAMESPACED: bool = false;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

/// Object-safe storage capability behind a [`Client`].
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync {
    /// Store a new object. Fails with [`ResourceError::AlreadyExists`] when
    /// the key is taken.
    async fn create(&self, key: ObjectKey, object: Value) -> Result<(), ResourceError>;

    /// Fetch an object.
    async fn get(&self, key: &ObjectKey) -> Result<Value, ResourceError>;

    /// List objects of a kind, in one namespace or (with `None`) all of them.
    async fn list(&self, kind: &str, namespace: Option<&str>) -> Result<Vec<Value>, ResourceError>;

    /// Remove an object.
    async fn delete(&self, key: &ObjectKey) -> Result<(), ResourceError>;
}

/// Cluster client handed to steps.
#[derive(Clone)]
pub struct Client {
    store: Arc<dyn ResourceStore>,
    namespace: String,
}

impl Client {
    /// Create a client whose default namespace is `namespace`.
    pub fn new(store: Arc<dyn ResourceStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Default namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Resources scoped to the default namespace.
    #[must_use]
    pub fn resources(&self) -> Resources {
        self.resources_in(self.namespace.clone())
    }

    /// Resources scoped to `namespace`.
    #[must_use]
    pub fn resources_in(&self, namespace: impl Into<String>) -> Resources {
        Resources {
            store: Arc::clone(&self.store),
            namespace: Some(namespace.into()),
        }
    }

    /// Resources across all namespaces.
    #[must_use]
    pub fn all_namespaces(&self) -> Resources {
        Resources {
            store: Arc::clone(&self.store),
            namespace: None,
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Typed operations against the store, scoped to a namespace.
#[derive(Clone)]
pub struct Resources {
    store: Arc<dyn ResourceStore>,
    namespace: Option<String>,
}

impl Resources {
    /// Scope namespace, `None` for all namespaces.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn check(ctx: &Context, operation: &'static str) -> Result<(), ResourceError> {
        if ctx.is_cancelled() {
            return Err(ResourceError::Cancelled { operation });
        }
        Ok(())
    }

    fn key_for<R: Resource>(&self, meta: &ObjectMeta) -> Result<ObjectKey, ResourceError> {
        if !R::NAMESPACED {
            return Ok(ObjectKey::new(R::KIND, None, meta.name.clone()));
        }
        let namespace = meta
            .namespace
            .as_deref()
            .or(self.namespace.as_deref())
            .ok_or_else(|| ResourceError::MissingNamespace {
                kind: R::KIND.to_string(),
                name: meta.name.clone(),
            })?;
        Ok(ObjectKey::new(R::KIND, Some(namespace), meta.name.clone()))
    }

    /// Create an object. Namespaced objects without a namespace land in the
    /// scope namespace.
    #[instrument(skip_all, name = "e2e.resources.create", fields(kind = R::KIND))]
    pub async fn create<R: Resource>(&self, ctx: &Context, object: &R) -> Result<(), ResourceError> {
        Self::check(ctx, "create")?;
        let key = self.key_for::<R>(object.metadata())?;

        let mut value = serde_json::to_value(object)?;
        if let (Some(ns), Some(meta)) = (
            &key.namespace,
            value.get_mut("metadata").and_then(Value::as_object_mut),
        ) {
            meta.insert("namespace".to_string(), Value::String(ns.clone()));
        }

        debug!(target: "e2e.resources", key = %key, "Creating object");
        self.store.create(key, value).await
    }

    /// Fetch an object by name. `namespace` is ignored for cluster-scoped
    /// kinds; an empty `namespace` means the scope namespace.
    #[instrument(skip_all, name = "e2e.resources.get", fields(kind = R::KIND, object = %name))]
    pub async fn get<R: Resource>(
        &self,
        ctx: &Context,
        name: &str,
        namespace: &str,
    ) -> Result<R, ResourceError> {
        Self::check(ctx, "get")?;
        let meta = ObjectMeta {
            name: name.to_string(),
            namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
            ..ObjectMeta::default()
        };
        let key = self.key_for::<R>(&meta)?;

        let value = self.store.get(&key).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// List objects of a kind in the scope namespace.
    #[instrument(skip_all, name = "e2e.resources.list", fields(kind = R::KIND))]
    pub async fn list<R: Resource>(&self, ctx: &Context) -> Result<Vec<R>, ResourceError> {
        Self::check(ctx, "list")?;
        let namespace = if R::NAMESPACED {
            self.namespace.as_deref()
        } else {
            None
        };

        let values = self.store.list(R::KIND, namespace).await?;
        debug!(target: "e2e.resources", count = values.len(), "Listed objects");
        values
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(ResourceError::from))
            .collect()
    }

    /// Delete an object.
    #[instrument(skip_all, name = "e2e.resources.delete", fields(kind = R::KIND))]
    pub async fn delete<R: Resource>(&self, ctx: &Context, object: &R) -> Result<(), ResourceError> {
        Self::check(ctx, "delete")?;
        let key = self.key_for::<R>(object.metadata())?;

        debug!(target: "e2e.resources", key = %key, "Deleting object");
        self.store.delete(&key).await
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resources")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
