//! Ready-made environment hooks.
//!
//! Each function returns a hook closure that can be passed straight to
//! [`Environment::setup`](crate::Environment::setup),
//! [`Environment::finish`](crate::Environment::finish) or the per-feature
//! registrations.

use crate::config::Config;
use crate::context::{Context, NAMESPACE_KEY};
use crate::resources::Namespace;
use anyhow::Context as _;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::info;

/// Hook closure returned by the functions in this module.
pub trait Hook:
    Fn(Context, Arc<Config>) -> BoxFuture<'static, anyhow::Result<Context>> + Send + Sync + 'static
{
}

impl<F> Hook for F where
    F: Fn(Context, Arc<Config>) -> BoxFuture<'static, anyhow::Result<Context>>
        + Send
        + Sync
        + 'static
{
}

/// Create a namespace through the configured store and record its name
/// under [`NAMESPACE_KEY`].
pub fn create_namespace(name: &str) -> impl Hook {
    let name = name.to_string();
    move |ctx: Context, cfg: Arc<Config>| {
        let name = name.clone();
        Box::pin(async move {
            let client = cfg.new_client()?;
            client
                .resources()
                .create(&ctx, &Namespace::new(&name))
                .await
                .with_context(|| format!("failed to create namespace {name}"))?;

            info!(target: "e2e.envfuncs", namespace = %name, "Created namespace");
            Ok(ctx.with_value(NAMESPACE_KEY, name))
        }) as BoxFuture<'static, anyhow::Result<Context>>
    }
}

/// Delete a namespace through the configured store.
///
/// An empty `name` deletes the namespace recorded under [`NAMESPACE_KEY`],
/// so a `finish` hook can undo whatever `create_namespace` made.
pub fn delete_namespace(name: &str) -> impl Hook {
    let name = name.to_string();
    move |ctx: Context, cfg: Arc<Config>| {
        let name = name.clone();
        Box::pin(async move {
            let target = if name.is_empty() {
                ctx.namespace()
                    .map(str::to_string)
                    .context("no namespace recorded in context")?
            } else {
                name
            };

            let client = cfg.new_client()?;
            client
                .resources()
                .delete(&ctx, &Namespace::new(&target))
                .await
                .with_context(|| format!("failed to delete namespace {target}"))?;

            info!(target: "e2e.envfuncs", namespace = %target, "Deleted namespace");
            Ok(ctx)
        }) as BoxFuture<'static, anyhow::Result<Context>>
    }
}
