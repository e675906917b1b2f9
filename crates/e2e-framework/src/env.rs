//! Test environment.
//!
//! An [`Environment`] owns the configuration and the current context, holds
//! the hook lists (`setup`, `before_test`, `after_test`, `finish`), executes
//! single features through [`Environment::test`] and drives a whole suite
//! through [`Environment::run`].
//!
//! # Lifecycle
//!
//! ```text
//! Registering --test/run--> Ready --run: setup ok--> Running --run: done--> Finished
//! ```
//!
//! Hooks may be registered while `Registering` or `Ready`. `run` consumes the
//! environment, so nothing can be registered once it is `Running`.
//!
//! # Failure policy
//!
//! - A failing step or `before_test` hook fails only its feature; `after_test`
//!   hooks still run.
//! - A failing `setup` hook is global: no feature runs, `finish` hooks still
//!   run, the exit code is non-zero.
//! - Every `finish` hook runs even when an earlier one fails.

use crate::config::Config;
use crate::context::Context;
use crate::feature::Feature;
use crate::handle::TestHandle;
use crate::report::{FeatureReport, Outcome, StepReport, SuiteReport};
use crate::selection::Decision;
use crate::step::Level;
use crate::suite::TestSuite;
use chrono::Utc;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Type-erased environment hook.
pub type EnvFunc =
    Arc<dyn Fn(Context, Arc<Config>) -> BoxFuture<'static, anyhow::Result<Context>> + Send + Sync>;

/// Exit code for a successful run.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for a run with any failed hook or feature.
pub const EXIT_FAILURE: i32 = 1;

/// Environment lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting hook registrations and config setters.
    Registering,
    /// Accepting hook registrations; features may be tested.
    Ready,
    /// `run` is executing the suite.
    Running,
    /// `run` has completed.
    Finished,
}

#[derive(Clone)]
struct Hook {
    name: String,
    func: EnvFunc,
}

impl Hook {
    async fn call(&self, ctx: Context, cfg: Arc<Config>) -> anyhow::Result<Context> {
        (self.func)(ctx, cfg).await
    }
}

/// Result of [`Environment::run_with_report`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Process exit code.
    pub exit_code: i32,
    /// Every feature the suite handed to [`Environment::test`].
    pub report: SuiteReport,
    /// Whether a setup hook failed (the suite was not run).
    pub setup_failed: bool,
    /// Whether the suite driver itself reported an error.
    pub suite_failed: bool,
    /// Whether a finish hook failed.
    pub finish_failed: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared execution environment for a batch of features.
pub struct Environment {
    config: Arc<Config>,
    context: Mutex<Context>,
    phase: Mutex<Phase>,
    setup: Vec<Hook>,
    before_test: Vec<Hook>,
    after_test: Vec<Hook>,
    finish: Vec<Hook>,
    report: Mutex<SuiteReport>,
}

impl Environment {
    /// Create an environment with an empty base context.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_context(Context::new(), config)
    }

    /// Create an environment with the given base context.
    #[must_use]
    pub fn with_context(ctx: Context, config: Config) -> Self {
        Self {
            config: Arc::new(config),
            context: Mutex::new(ctx),
            phase: Mutex::new(Phase::Registering),
            setup: Vec::new(),
            before_test: Vec::new(),
            after_test: Vec::new(),
            finish: Vec::new(),
            report: Mutex::new(SuiteReport::default()),
        }
    }

    /// Load configuration from environment variables and create an
    /// environment.
    pub fn from_env() -> Result<Self, crate::config::ConfigError> {
        Ok(Self::new(Config::from_env()?))
    }

    /// Shared configuration.
    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Current context: the base context, or whatever the last executed
    /// feature or hook returned.
    #[must_use]
    pub fn context(&self) -> Context {
        lock(&self.context).clone()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        *lock(&self.phase)
    }

    /// Snapshot of the outcome tally so far.
    #[must_use]
    pub fn report(&self) -> SuiteReport {
        lock(&self.report).clone()
    }

    /// Set the default namespace. Only honoured while `Registering`.
    pub fn set_namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        let namespace = namespace.into();
        if self.phase() == Phase::Registering {
            Arc::make_mut(&mut self.config).set_namespace(namespace);
        } else {
            warn!(
                target: "e2e.env",
                namespace = %namespace,
                phase = ?self.phase(),
                "Ignoring namespace change outside registration"
            );
        }
        self
    }

    /// Register a hook that runs once before any feature.
    pub fn setup<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Context, Arc<Config>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Context>> + Send + 'static,
    {
        self.register(HookKind::Setup, env_func(f))
    }

    /// Register a hook that runs before every executed feature.
    pub fn before_test<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Context, Arc<Config>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Context>> + Send + 'static,
    {
        self.register(HookKind::BeforeTest, env_func(f))
    }

    /// Register a hook that runs after every executed feature, even a failed
    /// one.
    pub fn after_test<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Context, Arc<Config>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Context>> + Send + 'static,
    {
        self.register(HookKind::AfterTest, env_func(f))
    }

    /// Register a hook that runs once at the end of [`Environment::run`].
    pub fn finish<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Context, Arc<Config>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Context>> + Send + 'static,
    {
        self.register(HookKind::Finish, env_func(f))
    }

    fn register(&mut self, kind: HookKind, func: EnvFunc) -> &mut Self {
        let phase = self.phase();
        if !matches!(phase, Phase::Registering | Phase::Ready) {
            warn!(
                target: "e2e.env",
                hook = kind.as_str(),
                phase = ?phase,
                "Ignoring hook registered outside registration"
            );
            return self;
        }

        let hooks = match kind {
            HookKind::Setup => &mut self.setup,
            HookKind::BeforeTest => &mut self.before_test,
            HookKind::AfterTest => &mut self.after_test,
            HookKind::Finish => &mut self.finish,
        };
        let name = format!("{}-{}", kind.as_str(), hooks.len() + 1);
        hooks.push(Hook { name, func });
        self
    }

    /// Tally a feature the driver decided not to start.
    pub(crate) fn record_skipped(&self, name: &str, reason: String) {
        info!(target: "e2e.env", feature = %name, reason = %reason, "Skipping feature");
        lock(&self.report).record(FeatureReport::skipped(name, reason));
    }

    fn advance_to(&self, next: Phase) {
        let mut phase = lock(&self.phase);
        debug!(target: "e2e.env", from = ?*phase, to = ?next, "Phase transition");
        *phase = next;
    }

    /// Execute one feature.
    ///
    /// Consults the selection filter, runs `before_test` hooks, the feature's
    /// steps in level order, then `after_test` hooks. The final context
    /// becomes the environment's current context.
    #[instrument(skip_all, name = "e2e.env.test", fields(feature = %feature.name()))]
    pub async fn test(&self, ctx: Context, t: &TestHandle, feature: &Feature) -> FeatureReport {
        if self.phase() == Phase::Registering {
            self.advance_to(Phase::Ready);
        }

        let report = match self.config.selection().decide(feature) {
            Decision::Skip(reason) => {
                info!(target: "e2e.env", feature = %feature.name(), reason = %reason, "Skipping feature");
                FeatureReport::skipped(feature.name(), reason)
            }
            Decision::Run => self.execute(ctx, t, feature).await,
        };

        lock(&self.report).record(report.clone());
        report
    }

    async fn execute(&self, mut ctx: Context, t: &TestHandle, feature: &Feature) -> FeatureReport {
        let started_at = Utc::now();
        let start = Instant::now();
        info!(target: "e2e.env", feature = %feature.name(), labels = %feature.labels(), "Running feature");

        for hook in &self.before_test {
            if ctx.is_cancelled() {
                t.fail(format!("context cancelled before hook {}", hook.name));
                break;
            }
            match hook.call(ctx.clone(), self.config()).await {
                Ok(next) => ctx = next,
                Err(e) => {
                    t.fail(format!("hook {} failed: {e:#}", hook.name));
                    break;
                }
            }
        }

        let selection = self.config.selection();
        let mut halted = t.failed();
        let mut steps = Vec::with_capacity(feature.steps().len());

        for step in feature.execution_order() {
            let mut record = |outcome| {
                steps.push(StepReport {
                    name: step.name().to_string(),
                    level: step.level(),
                    outcome,
                });
            };

            if halted {
                record(Outcome::Skipped);
                continue;
            }

            if step.level() == Level::Assess && !selection.runs_assessment(step.name()) {
                debug!(target: "e2e.env", step = %step.name(), "Assessment filtered out");
                record(Outcome::Skipped);
                continue;
            }

            if ctx.is_cancelled() {
                t.fail(format!("context cancelled before step '{}'", step.name()));
                halted = true;
                record(Outcome::Skipped);
                continue;
            }

            debug!(target: "e2e.env", step = %step.name(), level = %step.level(), "Running step");
            match step.call(ctx.clone(), t.clone(), self.config()).await {
                Ok(next) => ctx = next,
                Err(_) if !t.failed() => t.fail(format!("step '{}' halted", step.name())),
                Err(_) => {}
            }

            if t.failed() {
                warn!(target: "e2e.env", step = %step.name(), level = %step.level(), "Step failed");
                halted = true;
                record(Outcome::Failed);
            } else {
                record(Outcome::Passed);
            }
        }

        for hook in &self.after_test {
            match hook.call(ctx.clone(), self.config()).await {
                Ok(next) => ctx = next,
                Err(e) => t.fail(format!("hook {} failed: {e:#}", hook.name)),
            }
        }

        *lock(&self.context) = ctx;

        let outcome = if t.failed() {
            Outcome::Failed
        } else {
            Outcome::Passed
        };
        let duration = start.elapsed();
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        if outcome == Outcome::Failed {
            error!(target: "e2e.env", feature = %feature.name(), duration_ms, "Feature failed");
        } else {
            info!(target: "e2e.env", feature = %feature.name(), duration_ms, "Feature passed");
        }

        FeatureReport {
            name: feature.name().to_string(),
            outcome,
            skip_reason: None,
            steps,
            messages: t.messages(),
            started_at,
            duration,
        }
    }

    /// Run setup hooks, the suite, then finish hooks, and return the process
    /// exit code.
    pub async fn run<S>(self, ctx: Context, suite: S) -> i32
    where
        S: TestSuite,
    {
        self.run_with_report(ctx, suite).await.exit_code
    }

    /// [`Environment::run`], also returning the outcome tally.
    #[instrument(skip_all, name = "e2e.env.run")]
    pub async fn run_with_report<S>(self, ctx: Context, suite: S) -> RunSummary
    where
        S: TestSuite,
    {
        self.advance_to(Phase::Ready);
        info!(
            target: "e2e.env",
            namespace = %self.config.namespace(),
            setup_hooks = self.setup.len(),
            finish_hooks = self.finish.len(),
            "Starting environment"
        );

        let (ctx, setup_failed) = self.run_setup(ctx).await;
        *lock(&self.context) = ctx;

        let mut suite_failed = false;
        if setup_failed {
            error!(target: "e2e.env", "Environment setup failed, no features will run");
        } else {
            self.advance_to(Phase::Running);
            if let Err(e) = suite.run(&self).await {
                error!(target: "e2e.env", error = %format!("{e:#}"), "Suite driver failed");
                suite_failed = true;
            }
        }

        let finish_failed = self.run_finish(self.context()).await;
        self.advance_to(Phase::Finished);

        let report = self.report();
        let exit_code = if setup_failed || suite_failed || finish_failed || !report.success() {
            EXIT_FAILURE
        } else {
            EXIT_SUCCESS
        };

        info!(
            target: "e2e.env",
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped(),
            exit_code,
            "Environment finished"
        );

        RunSummary {
            exit_code,
            report,
            setup_failed,
            suite_failed,
            finish_failed,
        }
    }

    async fn run_setup(&self, mut ctx: Context) -> (Context, bool) {
        for hook in &self.setup {
            if ctx.is_cancelled() {
                error!(target: "e2e.env", hook = %hook.name, "Context cancelled before setup hook");
                return (ctx, true);
            }
            debug!(target: "e2e.env", hook = %hook.name, "Running setup hook");
            match hook.call(ctx.clone(), self.config()).await {
                Ok(next) => ctx = next,
                Err(e) => {
                    error!(target: "e2e.env", hook = %hook.name, error = %format!("{e:#}"), "Setup hook failed");
                    return (ctx, true);
                }
            }
        }
        (ctx, false)
    }

    async fn run_finish(&self, mut ctx: Context) -> bool {
        let mut failed = false;
        for hook in &self.finish {
            debug!(target: "e2e.env", hook = %hook.name, "Running finish hook");
            match hook.call(ctx.clone(), self.config()).await {
                Ok(next) => ctx = next,
                Err(e) => {
                    error!(target: "e2e.env", hook = %hook.name, error = %format!("{e:#}"), "Finish hook failed");
                    failed = true;
                }
            }
        }
        *lock(&self.context) = ctx;
        failed
    }
}

#[derive(Debug, Clone, Copy)]
enum HookKind {
    Setup,
    BeforeTest,
    AfterTest,
    Finish,
}

impl HookKind {
    fn as_str(self) -> &'static str {
        match self {
            HookKind::Setup => "setup",
            HookKind::BeforeTest => "before-test",
            HookKind::AfterTest => "after-test",
            HookKind::Finish => "finish",
        }
    }
}

/// Box a closure returning a future into an [`EnvFunc`].
pub fn env_func<F, Fut>(f: F) -> EnvFunc
where
    F: Fn(Context, Arc<Config>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Context>> + Send + 'static,
{
    Arc::new(move |ctx, cfg| Box::pin(f(ctx, cfg)))
}
