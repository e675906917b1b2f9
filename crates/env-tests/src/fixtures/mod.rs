//! Test fixtures: workload payloads and call recorders.

pub mod recorder;
pub mod workloads;

pub use recorder::CallLog;
pub use workloads::{new_deployment, new_pod, Deployment, DeploymentSpec, DeploymentStatus, Pod};
