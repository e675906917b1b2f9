//! Per-feature test handle.
//!
//! Steps and hooks report through a [`TestHandle`]: [`TestHandle::log`] for
//! diagnostics, [`TestHandle::fail`] to mark the feature failed, and
//! [`TestHandle::fatal`] to mark it failed and stop the current step:
//!
//! ```rust,ignore
//! let client = cfg.new_client().map_err(|e| t.fatal(e))?;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// Marker returned by a step that stopped through [`TestHandle::fatal`].
///
/// The failure message is already recorded on the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Halt;

impl fmt::Display for Halt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("step halted")
    }
}

impl std::error::Error for Halt {}

#[derive(Debug)]
struct HandleState {
    name: String,
    failed: AtomicBool,
    messages: Mutex<Vec<String>>,
}

/// Shared handle for one feature execution.
///
/// Clones refer to the same state.
#[derive(Debug, Clone)]
pub struct TestHandle {
    state: Arc<HandleState>,
}

impl TestHandle {
    /// Create a handle for the named feature.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: Arc::new(HandleState {
                name: name.into(),
                failed: AtomicBool::new(false),
                messages: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Name of the feature this handle reports for.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Record a non-fatal diagnostic.
    pub fn log(&self, message: impl fmt::Display) {
        let message = message.to_string();
        info!(target: "e2e.test", feature = %self.state.name, "{}", message);
        self.push(message);
    }

    /// Mark the feature failed. The caller may keep going; the engine stops
    /// the step sequence once the current step returns.
    pub fn fail(&self, message: impl fmt::Display) {
        let message = message.to_string();
        error!(target: "e2e.test", feature = %self.state.name, "{}", message);
        self.state.failed.store(true, Ordering::SeqCst);
        self.push(message);
    }

    /// Mark the feature failed and return the [`Halt`] marker for the step to
    /// return immediately.
    #[must_use = "return the Halt from the step to stop it"]
    pub fn fatal(&self, message: impl fmt::Display) -> Halt {
        self.fail(message);
        Halt
    }

    /// Whether the feature has been marked failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.state.failed.load(Ordering::SeqCst)
    }

    /// Snapshot of everything logged so far, failures included.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self.state.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, message: String) {
        match self.state.messages.lock() {
            Ok(mut messages) => messages.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
    }
}
