//! Feature Lifecycle
//!
//! Level ordering, context threading between steps and hooks, and teardown
//! behaviour when a feature fails part-way.

use e2e_framework::{
    Config, Context, Environment, Feature, FeatureBuilder, FeatureSuite, Level, Outcome,
    TestHandle,
};
use env_tests::cluster::SimulatedCluster;
use env_tests::fixtures::{new_deployment, CallLog, Deployment};
use std::sync::Arc;

/// Step that records `label` and passes the context through.
fn record(
    log: &CallLog,
    label: &'static str,
) -> impl Fn(Context, TestHandle, Arc<Config>) -> std::future::Ready<Result<Context, e2e_framework::Halt>>
       + Send
       + Sync
       + 'static {
    let log = log.clone();
    move |ctx, _t, _cfg| {
        log.record(label);
        std::future::ready(Ok(ctx))
    }
}

/// Hook that records `label` and passes the context through.
fn record_hook(
    log: &CallLog,
    label: &'static str,
) -> impl Fn(Context, Arc<Config>) -> std::future::Ready<anyhow::Result<Context>> + Send + Sync + 'static
{
    let log = log.clone();
    move |ctx, _cfg| {
        log.record(label);
        std::future::ready(Ok(ctx))
    }
}

fn shuffled_feature(log: &CallLog) -> Feature {
    FeatureBuilder::new("shuffled")
        .teardown(record(log, "teardown-1"))
        .assess("assess-1", record(log, "assess-1"))
        .setup(record(log, "setup-1"))
        .teardown(record(log, "teardown-2"))
        .assess("assess-2", record(log, "assess-2"))
        .setup(record(log, "setup-2"))
        .feature()
}

#[tokio::test]
async fn test_levels_run_in_order_regardless_of_declaration() {
    let log = CallLog::new();
    let feature = shuffled_feature(&log);

    let code = Environment::new(Config::default())
        .run(Context::new(), FeatureSuite::new(vec![feature]))
        .await;

    assert_eq!(code, 0);
    assert_eq!(
        log.entries(),
        vec!["setup-1", "setup-2", "assess-1", "assess-2", "teardown-1", "teardown-2"]
    );
}

#[tokio::test]
async fn test_steps_at_preserves_declaration_order() {
    let feature = shuffled_feature(&CallLog::new());

    let assessments: Vec<&str> = feature.steps_at(Level::Assess).map(|s| s.name()).collect();
    assert_eq!(assessments, vec!["assess-1", "assess-2"]);
    assert_eq!(feature.steps_at(Level::Teardown).count(), 2);
}

#[tokio::test]
async fn test_builder_snapshot_is_isolated() {
    let log = CallLog::new();
    let builder = FeatureBuilder::new("snapshot").assess("first", record(&log, "first"));
    let snapshot = builder.feature();
    let extended = builder.assess("second", record(&log, "second")).feature();

    assert_eq!(snapshot.steps().len(), 1);
    assert_eq!(extended.steps().len(), 2);
}

#[tokio::test]
async fn test_setup_creates_and_assess_reads_back() {
    let cluster = SimulatedCluster::new().await.unwrap();
    let feature = FeatureBuilder::new("create then read")
        .setup(|ctx: Context, t: TestHandle, cfg: Arc<Config>| async move {
            let client = cfg.new_client().map_err(|e| t.fatal(e))?;
            client
                .resources()
                .create(&ctx, &new_deployment(cfg.namespace(), "web", 2))
                .await
                .map_err(|e| t.fatal(e))?;
            Ok(ctx)
        })
        .assess("read back", |ctx: Context, t: TestHandle, cfg: Arc<Config>| async move {
            let client = cfg.new_client().map_err(|e| t.fatal(e))?;
            let dep: Deployment = client
                .resources()
                .get(&ctx, "web", "")
                .await
                .map_err(|e| t.fatal(e))?;
            if dep.spec.replicas != 2 {
                return Err(t.fatal(format!("expected 2 replicas, got {}", dep.spec.replicas)));
            }
            Ok(ctx)
        })
        .feature();

    let summary = Environment::new(cluster.config())
        .run_with_report(Context::new(), FeatureSuite::new(vec![feature]))
        .await;

    assert_eq!(summary.exit_code, 0);
    assert_eq!(summary.report.passed(), 1);
}

#[tokio::test]
async fn test_context_flows_from_hooks_through_steps() {
    let mut env = Environment::new(Config::default());
    env.before_test(|ctx: Context, _cfg| async move { Ok(ctx.with_value("trace", "before".to_string())) })
        .after_test(|ctx: Context, _cfg| async move {
            let trace = ctx.value::<String>("trace").cloned().unwrap_or_default();
            Ok(ctx.with_value("trace", format!("{trace}>after")))
        });

    let append = |step: &'static str| {
        move |ctx: Context, _t: TestHandle, _cfg: Arc<Config>| async move {
            let trace = ctx.value::<String>("trace").cloned().unwrap_or_default();
            Ok(ctx.with_value("trace", format!("{trace}>{step}")))
        }
    };
    let feature = FeatureBuilder::new("threaded")
        .setup(append("setup"))
        .assess("assess", append("assess"))
        .teardown(append("teardown"))
        .feature();

    let report = env
        .test(Context::new(), &TestHandle::new("threaded"), &feature)
        .await;

    assert_eq!(report.outcome, Outcome::Passed);
    assert_eq!(
        env.context().value::<String>("trace").map(String::as_str),
        Some("before>setup>assess>teardown>after")
    );
}

#[tokio::test]
async fn test_after_test_sees_context_given_to_failed_step() {
    let seen = CallLog::new();
    let seen_hook = seen.clone();
    let mut env = Environment::new(Config::default());
    env.after_test(move |ctx: Context, _cfg| {
        let seen = seen_hook.clone();
        async move {
            seen.record(ctx.value::<String>("marker").cloned().unwrap_or_default());
            Ok(ctx)
        }
    });

    let feature = FeatureBuilder::new("halts")
        .setup(|ctx: Context, _t, _cfg| async move { Ok(ctx.with_value("marker", "from-setup".to_string())) })
        .assess("fails", |ctx: Context, t: TestHandle, _cfg| async move {
            let _discarded = ctx.with_value("marker", "from-failed-step".to_string());
            Err::<Context, _>(t.fatal("assessment failed"))
        })
        .feature();

    let report = env
        .test(Context::new(), &TestHandle::new("halts"), &feature)
        .await;

    assert_eq!(report.outcome, Outcome::Failed);
    assert_eq!(seen.entries(), vec!["from-setup"]);
}

#[tokio::test]
async fn test_failed_assessment_skips_teardown_steps_not_hooks() {
    let log = CallLog::new();
    let mut env = Environment::new(Config::default());
    env.after_test(record_hook(&log, "after-test"));

    let feature = FeatureBuilder::new("partial")
        .setup(record(&log, "setup"))
        .assess("fails", |_ctx, t: TestHandle, _cfg| async move { Err::<Context, _>(t.fatal("boom")) })
        .teardown(record(&log, "teardown"))
        .feature();

    let summary = env
        .run_with_report(Context::new(), FeatureSuite::new(vec![feature]))
        .await;

    assert_eq!(summary.exit_code, 1);
    assert_eq!(log.entries(), vec!["setup", "after-test"]);
    let report = summary.report.feature("partial").unwrap();
    let outcomes: Vec<Outcome> = report.steps.iter().map(|s| s.outcome).collect();
    assert_eq!(outcomes, vec![Outcome::Passed, Outcome::Failed, Outcome::Skipped]);
}

#[tokio::test]
async fn test_failure_does_not_affect_sibling_feature() {
    let log = CallLog::new();
    let failing = FeatureBuilder::new("failing")
        .assess("fails", |_ctx, t: TestHandle, _cfg| async move { Err::<Context, _>(t.fatal("boom")) })
        .feature();
    let passing = FeatureBuilder::new("passing")
        .assess("runs", record(&log, "sibling"))
        .feature();

    let summary = Environment::new(Config::default())
        .run_with_report(Context::new(), FeatureSuite::new(vec![failing, passing]))
        .await;

    assert_eq!(summary.exit_code, 1);
    assert_eq!(log.entries(), vec!["sibling"]);
    assert_eq!(summary.report.failed(), 1);
    assert_eq!(summary.report.passed(), 1);
}

#[tokio::test]
async fn test_cancelled_context_fails_before_first_step() {
    let log = CallLog::new();
    let feature = FeatureBuilder::new("cancelled")
        .setup(record(&log, "setup"))
        .feature();

    let ctx = Context::new();
    ctx.cancel();
    let env = Environment::new(Config::default());
    let report = env.test(ctx, &TestHandle::new("cancelled"), &feature).await;

    assert_eq!(report.outcome, Outcome::Failed);
    assert!(log.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_passed_mid_feature_stops_steps() {
    let log = CallLog::new();
    let feature = FeatureBuilder::new("slow")
        .setup(|ctx: Context, _t, _cfg| async move {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(ctx)
        })
        .assess("after deadline", record(&log, "assess"))
        .feature();

    let ctx = Context::new().with_timeout(std::time::Duration::from_secs(1));
    let env = Environment::new(Config::default());
    let report = env.test(ctx, &TestHandle::new("slow"), &feature).await;

    assert_eq!(report.outcome, Outcome::Failed);
    assert!(log.is_empty());
}
