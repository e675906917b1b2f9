//! Lifecycle levels and steps.
//!
//! A [`Step`] is one named unit of work tagged with a [`Level`]. Steps are
//! immutable once built and cheap to clone: the function is held behind an
//! `Arc` so a finalized [`crate::Feature`] can be shared freely.

use crate::config::Config;
use crate::context::Context;
use crate::handle::{Halt, TestHandle};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Lifecycle phase of a step.
///
/// The derived ordering is the execution order: every `Setup` step of a
/// feature runs before any `Assess` step, and every `Assess` step before any
/// `Teardown` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Prepares state the assessments depend on.
    Setup,
    /// Checks the behaviour under test.
    Assess,
    /// Releases whatever setup created.
    Teardown,
}

impl Level {
    /// All levels in execution order.
    pub const ALL: [Level; 3] = [Level::Setup, Level::Assess, Level::Teardown];

    /// Lowercase name used in logs and generated step names.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Setup => "setup",
            Level::Assess => "assess",
            Level::Teardown => "teardown",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a step hands back: the context for the next unit, or [`Halt`] when it
/// stopped through [`TestHandle::fatal`].
pub type StepResult = Result<Context, Halt>;

/// Type-erased step function.
///
/// Receives the context produced by the previous unit, the feature's test
/// handle and the shared configuration.
pub type StepFunc =
    Arc<dyn Fn(Context, TestHandle, Arc<Config>) -> BoxFuture<'static, StepResult> + Send + Sync>;

/// Box a closure returning a future into a [`StepFunc`].
pub(crate) fn step_func<F, Fut>(f: F) -> StepFunc
where
    F: Fn(Context, TestHandle, Arc<Config>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    Arc::new(move |ctx, t, cfg| Box::pin(f(ctx, t, cfg)))
}

/// A named operation at a lifecycle level.
#[derive(Clone)]
pub struct Step {
    name: String,
    level: Level,
    func: StepFunc,
}

impl Step {
    /// Create a step from an async closure.
    pub fn new<F, Fut>(name: impl Into<String>, level: Level, f: F) -> Self
    where
        F: Fn(Context, TestHandle, Arc<Config>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        Self::from_func(name, level, step_func(f))
    }

    /// Create a step from an already boxed function.
    pub fn from_func(name: impl Into<String>, level: Level, func: StepFunc) -> Self {
        Self {
            name: name.into(),
            level,
            func,
        }
    }

    /// Step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Step level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Step function.
    #[must_use]
    pub fn func(&self) -> StepFunc {
        Arc::clone(&self.func)
    }

    /// Invoke the step function.
    pub(crate) async fn call(&self, ctx: Context, t: TestHandle, cfg: Arc<Config>) -> StepResult {
        (self.func)(ctx, t, cfg).await
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}
