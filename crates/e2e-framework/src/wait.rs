//! Polling helpers for conditions that become true eventually.
//!
//! Cluster state converges asynchronously: a Deployment exists before its
//! replicas are ready, a namespace lingers while it terminates. Steps use
//! [`for_condition`] to poll with exponential backoff until the condition
//! holds, the timeout elapses, or the context is cancelled.

use crate::context::Context;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Default upper bound on a wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WaitError {
    #[error("condition not met within {0:?}")]
    Timeout(Duration),

    #[error("context cancelled while waiting")]
    Cancelled,
}

/// Backoff parameters.
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub initial_delay: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl WaitOptions {
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Poll `condition` until it returns `true`.
///
/// The delay starts at `initial_delay` and doubles after every miss, capped
/// at the time remaining. The effective timeout is the smaller of
/// `options.timeout` and the context's remaining time. The condition is
/// always evaluated at least once.
///
/// # Errors
///
/// - [`WaitError::Cancelled`] if the context is cancelled.
/// - [`WaitError::Timeout`] if the condition never held in time.
pub async fn for_condition<F, Fut>(
    ctx: &Context,
    options: WaitOptions,
    mut condition: F,
) -> Result<(), WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let timeout = ctx
        .remaining()
        .map_or(options.timeout, |left| left.min(options.timeout));
    let start = Instant::now();
    let mut delay = options.initial_delay;
    let mut attempts: u32 = 0;

    loop {
        if ctx.cancel_token().is_cancelled() {
            return Err(WaitError::Cancelled);
        }

        attempts += 1;
        if condition().await {
            debug!(target: "e2e.wait", attempts, "Condition met");
            return Ok(());
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            debug!(target: "e2e.wait", attempts, ?timeout, "Condition timed out");
            return Err(WaitError::Timeout(timeout));
        }

        let remaining = timeout.saturating_sub(elapsed);
        delay = delay.min(remaining);

        let token = ctx.cancel_token();
        tokio::select! {
            () = token.cancelled() => return Err(WaitError::Cancelled),
            () = sleep(delay) => {}
        }

        delay = next_delay(delay);
    }
}

fn next_delay(delay: Duration) -> Duration {
    delay.saturating_mul(2)
}
