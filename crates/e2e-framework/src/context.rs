//! Execution context threaded through hooks and steps.
//!
//! A [`Context`] is passed by value into every hook and step and returned by
//! value for the next one. It carries typed values, a cancellation token and
//! an optional deadline. The engine never holds on to a context while a step
//! owns it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Context key under which the namespace env funcs record the namespace they
/// created.
pub const NAMESPACE_KEY: &str = "e2e.namespace";

/// Single-owner execution context.
#[derive(Clone)]
pub struct Context {
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
    cancel_token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Create an empty context with a fresh cancellation token and no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            cancel_token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Create a context cancelled through the given token.
    #[must_use]
    pub fn with_cancel_token(cancel_token: CancellationToken) -> Self {
        Self {
            cancel_token,
            ..Self::new()
        }
    }

    /// Return the context with `key` bound to `value`, replacing any earlier
    /// binding of the same key.
    #[must_use]
    pub fn with_value<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.values.insert(key.into(), Arc::new(value));
        self
    }

    /// Look up a value by key and type.
    ///
    /// Returns `None` when the key is unbound or bound to another type.
    #[must_use]
    pub fn value<T>(&self, key: &str) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Whether `key` is bound.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Namespace recorded by [`crate::envfuncs::create_namespace`], if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.value::<String>(NAMESPACE_KEY).map(String::as_str)
    }

    /// Derive a context whose token is a child of this one.
    ///
    /// Cancelling the returned token cancels the derived context only;
    /// cancelling this context's token cancels both.
    #[must_use]
    pub fn with_cancel(&self) -> (Self, CancellationToken) {
        let child = self.cancel_token.child_token();
        let ctx = Self {
            values: self.values.clone(),
            cancel_token: child.clone(),
            deadline: self.deadline,
        };
        (ctx, child)
    }

    /// Return the context with a deadline, keeping an earlier existing one.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Return the context with a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The deadline, if one is set.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` without a deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Clone of the cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Cancel this context (and every context derived from it).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Whether the context was cancelled or its deadline has passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.cancel_token.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel_token.cancelled().await,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("Context")
            .field("keys", &keys)
            .field("cancelled", &self.cancel_token.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}
