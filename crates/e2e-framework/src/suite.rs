//! Suite drivers.
//!
//! A [`TestSuite`] decides which features to hand to
//! [`Environment::test`] and in what order. [`FeatureSuite`] is the stock
//! driver: a fixed list run sequentially or concurrently, honouring
//! `fail_fast`.

use crate::env::Environment;
use crate::feature::Feature;
use crate::handle::TestHandle;
use crate::report::FeatureReport;
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{info, warn};

/// Drives features through an environment.
///
/// Feature outcomes are tallied by the environment itself; an `Err` here means
/// the driver could not do its job and fails the run.
#[async_trait]
pub trait TestSuite: Send + Sync {
    async fn run(&self, env: &Environment) -> anyhow::Result<()>;
}

/// Fixed list of features.
#[derive(Debug, Clone, Default)]
pub struct FeatureSuite {
    features: Vec<Feature>,
}

impl FeatureSuite {
    #[must_use]
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Append a feature.
    #[must_use]
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    async fn run_sequential(&self, env: &Environment) {
        let fail_fast = env.config().fail_fast();

        for (i, feature) in self.features.iter().enumerate() {
            let report = run_one(env, feature).await;

            if fail_fast && report.failed() {
                let remaining = self.features.get(i + 1..).unwrap_or_default();
                warn!(
                    target: "e2e.suite",
                    feature = %feature.name(),
                    remaining = remaining.len(),
                    "Fail-fast: skipping remaining features"
                );
                for skipped in remaining {
                    env.record_skipped(
                        skipped.name(),
                        format!("fail-fast after '{}' failed", feature.name()),
                    );
                }
                break;
            }
        }
    }

    async fn run_parallel(&self, env: &Environment) {
        // Features started together cannot be cancelled by fail-fast; every
        // one of them runs to completion.
        join_all(self.features.iter().map(|feature| run_one(env, feature))).await;
    }
}

async fn run_one(env: &Environment, feature: &Feature) -> FeatureReport {
    let t = TestHandle::new(feature.name());
    env.test(env.context(), &t, feature).await
}

#[async_trait]
impl TestSuite for FeatureSuite {
    async fn run(&self, env: &Environment) -> anyhow::Result<()> {
        let parallel = env.config().parallel();
        info!(
            target: "e2e.suite",
            features = self.features.len(),
            parallel,
            "Running feature suite"
        );

        if parallel {
            self.run_parallel(env).await;
        } else {
            self.run_sequential(env).await;
        }
        Ok(())
    }
}
