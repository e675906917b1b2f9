//! Resource Client, Namespace Env Funcs and Waits
//!
//! Store errors reach the calling step unchanged, namespace hooks create and
//! remove per-run namespaces, and steps poll for controller-driven state.

use e2e_framework::config::random_name;
use e2e_framework::envfuncs::{create_namespace, delete_namespace};
use e2e_framework::resources::mock::FailingStore;
use e2e_framework::resources::{Namespace, ObjectKey};
use e2e_framework::wait::{for_condition, WaitError, WaitOptions};
use e2e_framework::{
    Config, ConfigError, Context, Environment, FeatureBuilder, FeatureSuite, Outcome, Resource,
    ResourceError, TestHandle,
};
use env_tests::cluster::SimulatedCluster;
use env_tests::fixtures::{new_deployment, Deployment};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_store_error_fails_step_with_message() {
    let store = Arc::new(FailingStore::new("apiserver unavailable"));
    let config = Config::default().with_store(Arc::clone(&store) as Arc<dyn e2e_framework::ResourceStore>);

    let feature = FeatureBuilder::new("store down")
        .assess("list deployments", |ctx, t: TestHandle, cfg: Arc<Config>| async move {
            let client = cfg.new_client().map_err(|e| t.fatal(e))?;
            let _deployments: Vec<Deployment> = client
                .resources()
                .list(&ctx)
                .await
                .map_err(|e| t.fatal(e))?;
            Ok(ctx)
        })
        .feature();

    let summary = Environment::new(config)
        .run_with_report(Context::new(), FeatureSuite::new(vec![feature]))
        .await;

    assert_eq!(summary.exit_code, 1);
    let report = summary.report.feature("store down").unwrap();
    assert!(report
        .messages
        .iter()
        .any(|m| m.contains("apiserver unavailable")));
    assert_eq!(store.call_count(), 1);
}

#[tokio::test]
async fn test_missing_store_is_config_error() {
    let err = Config::default().new_client().unwrap_err();
    assert!(matches!(err, ConfigError::NoResourceStore));
}

#[tokio::test]
async fn test_cancelled_context_rejects_resource_calls() {
    let cluster = SimulatedCluster::new().await.unwrap();
    let ctx = Context::new();
    ctx.cancel();

    let err = cluster
        .client("default")
        .resources()
        .create(&ctx, &new_deployment("default", "web", 1))
        .await
        .unwrap_err();

    assert!(matches!(err, ResourceError::Cancelled { operation: "create" }));
}

#[tokio::test]
async fn test_duplicate_create_and_missing_get() {
    let cluster = SimulatedCluster::new().await.unwrap();
    let resources = cluster.client("default").resources();
    let ctx = Context::new();
    let deployment = new_deployment("default", "web", 1);

    resources.create(&ctx, &deployment).await.unwrap();
    let err = resources.create(&ctx, &deployment).await.unwrap_err();
    assert!(matches!(err, ResourceError::AlreadyExists(_)));

    let err = resources
        .get::<Deployment>(&ctx, "absent", "")
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::NotFound(_)));
}

#[tokio::test]
async fn test_namespace_env_funcs_wrap_the_run() {
    let cluster = SimulatedCluster::new().await.unwrap();
    let namespace = random_name("e2e");
    let key = ObjectKey::new(Namespace::KIND, None, namespace.clone());

    let mut env = Environment::new(cluster.config());
    env.setup(create_namespace(&namespace))
        .finish(delete_namespace(&namespace));

    let store = cluster.store();
    let probe_key = key.clone();
    let feature = FeatureBuilder::new("namespace exists")
        .assess("recorded in context", move |ctx: Context, t: TestHandle, _cfg| {
            let store = Arc::clone(&store);
            let key = probe_key.clone();
            async move {
                if ctx.namespace() != Some(key.name.as_str()) {
                    return Err(t.fatal("namespace not recorded in context"));
                }
                if !store.contains(&key).await {
                    return Err(t.fatal("namespace not created"));
                }
                Ok(ctx)
            }
        })
        .feature();

    let code = env
        .run(Context::new(), FeatureSuite::new(vec![feature]))
        .await;

    assert_eq!(code, 0);
    assert!(!cluster.store().contains(&key).await);
}

#[tokio::test]
async fn test_namespace_create_failure_aborts_run() {
    let config = Config::default().with_store(Arc::new(FailingStore::default()));
    let mut env = Environment::new(config);
    env.setup(create_namespace("e2e-broken"));

    let summary = env
        .run_with_report(
            Context::new(),
            FeatureSuite::new(vec![FeatureBuilder::new("never").feature()]),
        )
        .await;

    assert_eq!(summary.exit_code, 1);
    assert!(summary.setup_failed);
}

#[tokio::test(start_paused = true)]
async fn test_assess_waits_for_ready_replicas() {
    let cluster = Arc::new(SimulatedCluster::new().await.unwrap());

    let controller = Arc::clone(&cluster);
    let feature = FeatureBuilder::new("deployment becomes ready")
        .setup(|ctx: Context, t: TestHandle, cfg: Arc<Config>| async move {
            let client = cfg.new_client().map_err(|e| t.fatal(e))?;
            client
                .resources()
                .create(&ctx, &new_deployment("default", "web", 3))
                .await
                .map_err(|e| t.fatal(e))?;
            Ok(ctx)
        })
        .with_setup("controller", move |ctx: Context, _t, _cfg| {
            let controller = Arc::clone(&controller);
            async move {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    controller
                        .mark_ready("default", "web")
                        .await
                        .expect("mark ready");
                });
                Ok(ctx)
            }
        })
        .assess("replicas ready", |ctx: Context, t: TestHandle, cfg: Arc<Config>| async move {
            let client = cfg.new_client().map_err(|e| t.fatal(e))?;
            let resources = client.resources();
            let ready = for_condition(&ctx, WaitOptions::with_timeout(Duration::from_secs(30)), || {
                let resources = &resources;
                let ctx = &ctx;
                async move {
                    resources
                        .get::<Deployment>(ctx, "web", "")
                        .await
                        .is_ok_and(|d| d.ready_replicas() == 3)
                }
            })
            .await;

            ready.map_err(|e| t.fatal(e))?;
            Ok(ctx)
        })
        .feature();

    let summary = Environment::new(cluster.config())
        .run_with_report(Context::new(), FeatureSuite::new(vec![feature]))
        .await;

    let report = summary.report.feature("deployment becomes ready").unwrap();
    assert_eq!(report.outcome, Outcome::Passed, "messages: {:?}", report.messages);
}

#[tokio::test(start_paused = true)]
async fn test_wait_times_out_when_never_ready() {
    let cluster = SimulatedCluster::new().await.unwrap();
    let resources = cluster.client("default").resources();
    let ctx = Context::new();
    resources
        .create(&ctx, &new_deployment("default", "stuck", 1))
        .await
        .unwrap();

    let err = for_condition(&ctx, WaitOptions::with_timeout(Duration::from_secs(5)), || async {
        resources
            .get::<Deployment>(&ctx, "stuck", "")
            .await
            .is_ok_and(|d| d.ready_replicas() == 1)
    })
    .await
    .unwrap_err();

    assert_eq!(err, WaitError::Timeout(Duration::from_secs(5)));
}
