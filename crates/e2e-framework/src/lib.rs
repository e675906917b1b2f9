//! Feature-oriented end-to-end test framework.
//!
//! A test author declares [`Feature`]s made of ordered lifecycle [`Step`]s
//! (setup, assess, teardown), labels them for selective execution, and runs
//! them inside a shared [`Environment`] with process-wide and per-feature
//! hooks.
//!
//! # Example
//!
//! ```rust,ignore
//! use e2e_framework::{Config, Context, Environment, FeatureBuilder, FeatureSuite};
//!
//! let feature = FeatureBuilder::new("pod list")
//!     .with_label("env", "prod")
//!     .assess("pods from kube-system", |ctx, t, cfg| async move {
//!         let client = cfg.new_client().map_err(|e| t.fatal(e))?;
//!         let pods: Vec<Pod> = client
//!             .resources_in("kube-system")
//!             .list(&ctx)
//!             .await
//!             .map_err(|e| t.fatal(e))?;
//!         t.log(format!("found {} pods", pods.len()));
//!         Ok(ctx)
//!     })
//!     .feature();
//!
//! let env = Environment::new(Config::from_env()?);
//! let code = env.run(Context::new(), FeatureSuite::new(vec![feature])).await;
//! ```

#![warn(clippy::pedantic)]

/// Module for execution contexts threaded through hooks and steps
pub mod context;

/// Module for framework configuration loaded from the environment
pub mod config;

/// Module for the environment: hook registry and feature execution
pub mod env;

/// Module for ready-made environment hooks
pub mod envfuncs;

/// Module for features and the feature builder
pub mod feature;

/// Module for the per-feature test handle
pub mod handle;

/// Module for feature labels
pub mod labels;

/// Module for tracing initialisation
pub mod observability;

/// Module for execution outcome reports
pub mod report;

/// Module for the cluster resource capability
pub mod resources;

/// Module for the feature selection filter
pub mod selection;

/// Module for the label selector expression language
pub mod selector;

/// Module for lifecycle levels and steps
pub mod step;

/// Module for the suite driver
pub mod suite;

/// Module for polling helpers
pub mod wait;

pub use config::{Config, ConfigError};
pub use context::Context;
pub use env::{env_func, EnvFunc, Environment, Phase, RunSummary};
pub use feature::{Feature, FeatureBuilder};
pub use handle::{Halt, TestHandle};
pub use labels::Labels;
pub use report::{FeatureReport, Outcome, StepReport, SuiteReport};
pub use resources::{Client, ObjectMeta, Resource, ResourceError, ResourceStore, Resources};
pub use selection::{Decision, Selection};
pub use selector::{Selector, SelectorError};
pub use step::{Level, Step, StepFunc, StepResult};
pub use suite::{FeatureSuite, TestSuite};
