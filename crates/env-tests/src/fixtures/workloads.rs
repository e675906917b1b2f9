//! Workload resource payloads.
//!
//! Trimmed-down Deployment and Pod shapes: enough structure for features to
//! create, read back and compare objects through the framework client.

use e2e_framework::{ObjectMeta, Resource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default container image for fixture workloads.
pub const DEFAULT_IMAGE: &str = "nginx";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub replicas: u32,
    /// Labels the deployment selects its pods by.
    pub selector: BTreeMap<String, String>,
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    pub ready_replicas: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub metadata: ObjectMeta,
    pub spec: DeploymentSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeploymentStatus>,
}

impl Deployment {
    /// Ready replica count, zero before the controller reports status.
    pub fn ready_replicas(&self) -> u32 {
        self.status.map_or(0, |s| s.ready_replicas)
    }
}

impl Resource for Deployment {
    const KIND: &'static str = "Deployment";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub metadata: ObjectMeta,
    pub containers: Vec<Container>,
}

impl Resource for Pod {
    const KIND: &'static str = "Pod";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

/// Deployment `name` in `namespace` running `replicas` copies of
/// [`DEFAULT_IMAGE`], labelled and selected by `app=<name>`.
pub fn new_deployment(namespace: &str, name: &str, replicas: u32) -> Deployment {
    let labels: BTreeMap<String, String> =
        [("app".to_string(), name.to_string())].into_iter().collect();

    Deployment {
        metadata: ObjectMeta {
            labels: labels.clone(),
            ..ObjectMeta::namespaced(namespace, name)
        },
        spec: DeploymentSpec {
            replicas,
            selector: labels,
            containers: vec![Container {
                name: name.to_string(),
                image: DEFAULT_IMAGE.to_string(),
            }],
        },
        status: None,
    }
}

/// Single-container pod `name` in `namespace`.
pub fn new_pod(namespace: &str, name: &str) -> Pod {
    Pod {
        metadata: ObjectMeta::namespaced(namespace, name),
        containers: vec![Container {
            name: name.to_string(),
            image: DEFAULT_IMAGE.to_string(),
        }],
    }
}
