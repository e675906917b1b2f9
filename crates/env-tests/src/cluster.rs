//! Simulated cluster for integration tests.
//!
//! [`SimulatedCluster`] owns an in-memory resource store seeded the way a
//! fresh kind cluster looks: `default` and `kube-system` namespaces plus the
//! control-plane pods. Tests build their framework [`Config`] from it.

use crate::fixtures::{new_pod, Deployment, DeploymentStatus, Pod};
use e2e_framework::resources::{InMemoryStore, Namespace};
use e2e_framework::{Client, Config, ConfigError, Context, ResourceError, ResourceStore};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Namespace holding the control-plane pods.
pub const SYSTEM_NAMESPACE: &str = "kube-system";

/// Pods every simulated cluster starts with.
pub const SYSTEM_PODS: &[&str] = &[
    "coredns",
    "etcd-control-plane",
    "kube-apiserver-control-plane",
    "kube-controller-manager-control-plane",
    "kube-scheduler-control-plane",
];

/// Simulated cluster errors.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Failed to seed cluster: {0}")]
    Seed(#[source] ResourceError),

    #[error("Cluster health check failed: {message}")]
    HealthCheckFailed { message: String },

    #[error("Resource operation failed: {0}")]
    Resource(#[from] ResourceError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// In-memory stand-in for a kind cluster.
pub struct SimulatedCluster {
    store: Arc<InMemoryStore>,
}

impl SimulatedCluster {
    /// Create a cluster with the default namespaces and system pods.
    pub async fn new() -> Result<Self, ClusterError> {
        let store = Arc::new(InMemoryStore::new());
        let client = Client::new(Arc::clone(&store) as Arc<dyn ResourceStore>, SYSTEM_NAMESPACE);
        let ctx = Context::new();

        for namespace in ["default", SYSTEM_NAMESPACE] {
            client
                .resources()
                .create(&ctx, &Namespace::new(namespace))
                .await
                .map_err(ClusterError::Seed)?;
        }

        for name in SYSTEM_PODS {
            client
                .resources()
                .create(&ctx, &new_pod(SYSTEM_NAMESPACE, name))
                .await
                .map_err(ClusterError::Seed)?;
        }

        debug!(target: "env_tests.cluster", pods = SYSTEM_PODS.len(), "Seeded simulated cluster");
        Ok(Self { store })
    }

    /// The backing store.
    pub fn store(&self) -> Arc<InMemoryStore> {
        Arc::clone(&self.store)
    }

    /// Default framework configuration bound to this cluster.
    pub fn config(&self) -> Config {
        Config::default().with_store(self.store())
    }

    /// Configuration parsed from `E2E_*` variables, bound to this cluster.
    pub fn config_from_vars(&self, vars: &[(&str, &str)]) -> Result<Config, ClusterError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Ok(Config::from_vars(&vars)?.with_store(self.store()))
    }

    /// Client scoped to `namespace`.
    pub fn client(&self, namespace: &str) -> Client {
        Client::new(self.store() as Arc<dyn ResourceStore>, namespace)
    }

    /// Verify the control plane is present.
    pub async fn check_health(&self) -> Result<(), ClusterError> {
        let pods: Vec<Pod> = self
            .client(SYSTEM_NAMESPACE)
            .resources()
            .list(&Context::new())
            .await?;

        let missing: Vec<&str> = SYSTEM_PODS
            .iter()
            .copied()
            .filter(|name| !pods.iter().any(|p| p.metadata.name == *name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ClusterError::HealthCheckFailed {
                message: format!("missing system pods: {}", missing.join(", ")),
            })
        }
    }

    /// Act as the deployment controller: report every desired replica of the
    /// deployment as ready.
    pub async fn mark_ready(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let resources = self.client(namespace).resources();
        let ctx = Context::new();

        let mut deployment: Deployment = resources.get(&ctx, name, namespace).await?;
        resources.delete(&ctx, &deployment).await?;
        deployment.status = Some(DeploymentStatus {
            ready_replicas: deployment.spec.replicas,
        });
        resources.create(&ctx, &deployment).await?;

        debug!(target: "env_tests.cluster", namespace, name, "Deployment marked ready");
        Ok(())
    }
}
