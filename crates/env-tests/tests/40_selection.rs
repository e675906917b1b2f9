//! Selection, Fail-Fast and Parallel Execution
//!
//! Feature-name and assessment-name filters read from `E2E_*` variables,
//! plus the suite driver's fail-fast and parallel modes.

use e2e_framework::{
    Config, ConfigError, Context, Environment, Feature, FeatureBuilder, FeatureSuite, Outcome,
    TestHandle,
};
use env_tests::cluster::{ClusterError, SimulatedCluster};
use env_tests::fixtures::CallLog;
use std::time::Duration;

fn feature(name: &str, labels: &[(&str, &str)], assessments: &[&'static str], log: &CallLog) -> Feature {
    let mut builder = FeatureBuilder::new(name);
    for (k, v) in labels {
        builder = builder.with_label(*k, *v);
    }
    for assessment in assessments {
        let log = log.clone();
        let label = *assessment;
        builder = builder.assess(label, move |ctx, _t, _cfg| {
            let log = log.clone();
            async move {
                log.record(label);
                Ok(ctx)
            }
        });
    }
    builder.feature()
}

fn failing(name: &str) -> Feature {
    FeatureBuilder::new(name)
        .assess("fails", |_ctx, t: TestHandle, _cfg| async move {
            Err::<Context, _>(t.fatal("intentional failure"))
        })
        .feature()
}

async fn run(config: Config, features: Vec<Feature>) -> e2e_framework::RunSummary {
    Environment::new(config)
        .run_with_report(Context::new(), FeatureSuite::new(features))
        .await
}

#[tokio::test]
async fn test_feature_regex_selects_by_name() {
    let cluster = SimulatedCluster::new().await.unwrap();
    let log = CallLog::new();
    let config = cluster
        .config_from_vars(&[("E2E_FEATURE", "^deployment")])
        .unwrap();

    let summary = run(
        config,
        vec![
            feature("deployment rollout", &[], &["rollout"], &log),
            feature("service routing", &[], &["routing"], &log),
        ],
    )
    .await;

    assert_eq!(summary.exit_code, 0);
    assert_eq!(log.entries(), vec!["rollout"]);
    assert_eq!(
        summary.report.feature("service routing").unwrap().outcome,
        Outcome::Skipped
    );
}

#[tokio::test]
async fn test_skip_features_regex() {
    let cluster = SimulatedCluster::new().await.unwrap();
    let log = CallLog::new();
    let config = cluster
        .config_from_vars(&[("E2E_SKIP_FEATURES", "flaky")])
        .unwrap();

    let summary = run(
        config,
        vec![
            feature("stable", &[], &["stable"], &log),
            feature("flaky network", &[], &["flaky"], &log),
        ],
    )
    .await;

    assert_eq!(summary.report.skipped(), 1);
    assert_eq!(log.entries(), vec!["stable"]);
}

#[tokio::test]
async fn test_assessment_filters() {
    let cluster = SimulatedCluster::new().await.unwrap();
    let log = CallLog::new();
    let config = cluster
        .config_from_vars(&[("E2E_ASSESS", "pods"), ("E2E_SKIP_ASSESSMENT", "slow")])
        .unwrap();

    let summary = run(
        config,
        vec![feature(
            "checks",
            &[],
            &["pods ready", "pods slow drain", "services ready"],
            &log,
        )],
    )
    .await;

    assert_eq!(summary.exit_code, 0);
    assert_eq!(log.entries(), vec!["pods ready"]);
    let report = summary.report.feature("checks").unwrap();
    assert_eq!(report.outcome, Outcome::Passed);
    assert_eq!(report.executed_steps(), vec!["pods ready"]);
}

#[tokio::test]
async fn test_label_selector_with_or_groups() {
    let cluster = SimulatedCluster::new().await.unwrap();
    let log = CallLog::new();
    let config = cluster
        .config_from_vars(&[("E2E_LABELS", "tier=db || env=dev,!slow")])
        .unwrap();

    run(
        config,
        vec![
            feature("database", &[("tier", "db")], &["db"], &log),
            feature("dev fast", &[("env", "dev")], &["dev-fast"], &log),
            feature("dev slow", &[("env", "dev"), ("slow", "true")], &["dev-slow"], &log),
            feature("unlabelled", &[], &["unlabelled"], &log),
        ],
    )
    .await;

    assert_eq!(log.entries(), vec!["db", "dev-fast"]);
}

#[tokio::test]
async fn test_malformed_expressions_rejected_before_running() {
    let cluster = SimulatedCluster::new().await.unwrap();

    let err = cluster
        .config_from_vars(&[("E2E_SKIP_LABELS", "env notin")])
        .unwrap_err();
    assert!(matches!(
        err,
        ClusterError::Config(ConfigError::InvalidSelector { var: "E2E_SKIP_LABELS", .. })
    ));

    let err = cluster
        .config_from_vars(&[("E2E_FEATURE", "(unclosed")])
        .unwrap_err();
    assert!(matches!(
        err,
        ClusterError::Config(ConfigError::InvalidRegex { var: "E2E_FEATURE", .. })
    ));
}

#[tokio::test]
async fn test_fail_fast_tallies_remaining_as_skipped() {
    let cluster = SimulatedCluster::new().await.unwrap();
    let log = CallLog::new();
    let config = cluster
        .config_from_vars(&[("E2E_FAIL_FAST", "true")])
        .unwrap();

    let summary = run(
        config,
        vec![
            feature("first", &[], &["first"], &log),
            failing("second"),
            feature("third", &[], &["third"], &log),
        ],
    )
    .await;

    assert_eq!(summary.exit_code, 1);
    assert_eq!(log.entries(), vec!["first"]);
    assert_eq!(summary.report.passed(), 1);
    assert_eq!(summary.report.failed(), 1);
    let third = summary.report.feature("third").unwrap();
    assert_eq!(third.outcome, Outcome::Skipped);
    assert!(third.skip_reason.as_deref().unwrap().contains("fail-fast"));
}

#[tokio::test]
async fn test_without_fail_fast_every_feature_runs() {
    let log = CallLog::new();

    let summary = run(
        Config::default(),
        vec![failing("first"), feature("second", &[], &["second"], &log)],
    )
    .await;

    assert_eq!(summary.exit_code, 1);
    assert_eq!(log.entries(), vec!["second"]);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_features_overlap() {
    let cluster = SimulatedCluster::new().await.unwrap();
    let config = cluster.config_from_vars(&[("E2E_PARALLEL", "1")]).unwrap();
    let log = CallLog::new();

    let slow = |name: &'static str| {
        let log = log.clone();
        FeatureBuilder::new(name)
            .assess("sleep", move |ctx, _t, _cfg| {
                let log = log.clone();
                async move {
                    log.record(format!("{name}:start"));
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    log.record(format!("{name}:end"));
                    Ok(ctx)
                }
            })
            .feature()
    };

    let summary = run(config, vec![slow("a"), slow("b")]).await;

    assert_eq!(summary.exit_code, 0);
    let entries = log.entries();
    assert_eq!(&entries[..2], &["a:start", "b:start"]);
}

#[tokio::test]
async fn test_parallel_failure_reported_per_feature() {
    let log = CallLog::new();
    let config = Config::default().with_parallel(true);

    let summary = run(
        config,
        vec![failing("bad"), feature("good", &[], &["good"], &log)],
    )
    .await;

    assert_eq!(summary.exit_code, 1);
    assert_eq!(summary.report.failed(), 1);
    assert_eq!(summary.report.passed(), 1);
    assert_eq!(log.entries(), vec!["good"]);
}
