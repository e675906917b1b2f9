//! Environment Integration Test Suite
//!
//! Integration tests for the `e2e-framework` engine. Features run against a
//! simulated cluster: an in-memory resource store seeded with the
//! `kube-system` namespace and its control-plane pods, so every scenario is
//! self-contained and needs no live cluster.
//!
//! # Layout
//!
//! - `tests/00_cluster_health.rs`: the simulated cluster itself
//! - `tests/10_skip_labels.rs`: label selection through `E2E_*` variables
//! - `tests/20_lifecycle.rs`: step ordering, context threading, teardown on failure
//! - `tests/30_environment_hooks.rs`: setup/finish hooks and exit codes
//! - `tests/40_selection.rs`: feature/assessment filters, fail-fast, parallel
//! - `tests/50_resources.rs`: resource errors, namespace env funcs, waits
//!
//! # Usage
//!
//! ```bash
//! cargo test -p env-tests
//!
//! # With framework logs
//! RUST_LOG=e2e=debug cargo test -p env-tests -- --nocapture
//! ```

pub mod cluster;
pub mod fixtures;
