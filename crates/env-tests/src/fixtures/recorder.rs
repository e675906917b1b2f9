//! Shared call log for asserting hook and step order.

use std::sync::{Arc, Mutex};

/// Append-only record of labelled events, shareable across hooks and steps.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, label: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(label.into());
    }

    /// Everything recorded so far, in order.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Number of entries equal to `label`.
    pub fn count(&self, label: &str) -> usize {
        self.entries().iter().filter(|e| *e == label).count()
    }
}
