//! Features and the feature builder.
//!
//! [`FeatureBuilder`] accumulates labels and steps; [`FeatureBuilder::feature`]
//! snapshots them into an immutable [`Feature`]. Later builder calls never
//! affect a feature that was already produced.

use crate::config::Config;
use crate::context::Context;
use crate::handle::TestHandle;
use crate::labels::Labels;
use crate::step::{Level, Step, StepResult};
use std::future::Future;
use std::sync::Arc;

/// A named, labeled bundle of lifecycle steps.
#[derive(Debug, Clone)]
pub struct Feature {
    name: String,
    labels: Labels,
    steps: Arc<[Step]>,
}

impl Feature {
    /// Feature name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feature labels.
    #[must_use]
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// All steps in declaration order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Steps at one level, in declaration order.
    pub fn steps_at(&self, level: Level) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.level() == level)
    }

    /// Steps in execution order: all setup, then assess, then teardown.
    pub fn execution_order(&self) -> impl Iterator<Item = &Step> {
        Level::ALL.into_iter().flat_map(|level| self.steps_at(level))
    }
}

/// Fluent accumulator for a [`Feature`].
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    name: String,
    labels: Labels,
    steps: Vec<Step>,
}

impl FeatureBuilder {
    /// Start a feature.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: Labels::new(),
            steps: Vec::new(),
        }
    }

    /// Set a label; a repeated key replaces the earlier value.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key, value);
        self
    }

    /// Append an unnamed setup step, named `setup-<n>`.
    #[must_use]
    pub fn setup<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Context, TestHandle, Arc<Config>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        let name = self.generated_name(Level::Setup);
        self.with_step(name, Level::Setup, f)
    }

    /// Append a named setup step.
    #[must_use]
    pub fn with_setup<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Context, TestHandle, Arc<Config>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        self.with_step(name, Level::Setup, f)
    }

    /// Append a named assessment.
    #[must_use]
    pub fn assess<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Context, TestHandle, Arc<Config>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        self.with_step(name, Level::Assess, f)
    }

    /// Append an unnamed teardown step, named `teardown-<n>`.
    #[must_use]
    pub fn teardown<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Context, TestHandle, Arc<Config>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        let name = self.generated_name(Level::Teardown);
        self.with_step(name, Level::Teardown, f)
    }

    /// Append a named teardown step.
    #[must_use]
    pub fn with_teardown<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Context, TestHandle, Arc<Config>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        self.with_step(name, Level::Teardown, f)
    }

    /// Append a named step at an explicit level.
    #[must_use]
    pub fn with_step<F, Fut>(mut self, name: impl Into<String>, level: Level, f: F) -> Self
    where
        F: Fn(Context, TestHandle, Arc<Config>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        self.steps.push(Step::new(name, level, f));
        self
    }

    /// Append a pre-built step.
    #[must_use]
    pub fn push_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Snapshot the accumulated state into an immutable feature.
    #[must_use]
    pub fn feature(&self) -> Feature {
        Feature {
            name: self.name.clone(),
            labels: self.labels.clone(),
            steps: self.steps.clone().into(),
        }
    }

    fn generated_name(&self, level: Level) -> String {
        let n = self.steps.iter().filter(|s| s.level() == level).count() + 1;
        format!("{level}-{n}")
    }
}
