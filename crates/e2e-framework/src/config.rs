//! Framework configuration.
//!
//! Configuration is loaded from environment variables, or built
//! programmatically with the `with_*` setters. The selection expressions are
//! parsed while loading, so a malformed expression is reported before any
//! feature executes.
//!
//! | Variable              | Meaning                                   | Default   |
//! |-----------------------|-------------------------------------------|-----------|
//! | `E2E_NAMESPACE`       | Default namespace for resource clients    | `default` |
//! | `E2E_LABELS`          | Selector features must match              | (all)     |
//! | `E2E_SKIP_LABELS`     | Selector of features to skip              | (none)    |
//! | `E2E_FEATURE`         | Regex feature names must match            | (all)     |
//! | `E2E_SKIP_FEATURES`   | Regex of feature names to skip            | (none)    |
//! | `E2E_ASSESS`          | Regex assessment names must match         | (all)     |
//! | `E2E_SKIP_ASSESSMENT` | Regex of assessment names to skip         | (none)    |
//! | `E2E_FAIL_FAST`       | Stop after the first failed feature       | `false`   |
//! | `E2E_PARALLEL`        | Run features concurrently                 | `false`   |

use crate::resources::{Client, ResourceStore};
use crate::selection::Selection;
use crate::selector::{Selector, SelectorError};
use regex::Regex;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Default namespace for resource clients.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid label selector in {var}: {source}")]
    InvalidSelector {
        var: &'static str,
        #[source]
        source: SelectorError,
    },

    #[error("Invalid regex in {var}: {source}")]
    InvalidRegex {
        var: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid boolean in {var}: expected true/false/1/0, got '{value}'")]
    InvalidBool { var: &'static str, value: String },

    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("No resource store configured")]
    NoResourceStore,
}

/// Framework configuration shared by every hook and step.
#[derive(Clone)]
pub struct Config {
    namespace: String,
    selection: Selection,
    fail_fast: bool,
    parallel: bool,
    store: Option<Arc<dyn ResourceStore>>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("namespace", &self.namespace)
            .field("selection", &self.selection)
            .field("fail_fast", &self.fail_fast)
            .field("parallel", &self.parallel)
            .field("store", &self.store.as_ref().map(|_| "[configured]"))
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            selection: Selection::default(),
            fail_fast: false,
            parallel: false,
            store: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let namespace = match vars.get("E2E_NAMESPACE") {
            Some(ns) => validate_namespace(ns)?,
            None => DEFAULT_NAMESPACE.to_string(),
        };

        let selection = Selection {
            labels: parse_selector(vars, "E2E_LABELS")?,
            skip_labels: parse_selector(vars, "E2E_SKIP_LABELS")?,
            feature: parse_regex(vars, "E2E_FEATURE")?,
            skip_features: parse_regex(vars, "E2E_SKIP_FEATURES")?,
            assess: parse_regex(vars, "E2E_ASSESS")?,
            skip_assessment: parse_regex(vars, "E2E_SKIP_ASSESSMENT")?,
        };

        Ok(Self {
            namespace,
            selection,
            fail_fast: parse_bool(vars, "E2E_FAIL_FAST")?,
            parallel: parse_bool(vars, "E2E_PARALLEL")?,
            store: None,
        })
    }

    /// Set the default namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the selection filter.
    #[must_use]
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Set the include label selector.
    #[must_use]
    pub fn with_labels(mut self, labels: Selector) -> Self {
        self.selection.labels = labels;
        self
    }

    /// Set the skip label selector.
    #[must_use]
    pub fn with_skip_labels(mut self, skip_labels: Selector) -> Self {
        self.selection.skip_labels = skip_labels;
        self
    }

    /// Stop after the first failed feature.
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Run features concurrently.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the resource store behind [`Config::new_client`].
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ResourceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Default namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Active selection filter.
    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Whether the suite stops after the first failed feature.
    #[must_use]
    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }

    /// Whether features run concurrently.
    #[must_use]
    pub fn parallel(&self) -> bool {
        self.parallel
    }

    /// Build a resource client scoped to the default namespace.
    pub fn new_client(&self) -> Result<Client, ConfigError> {
        let store = self.store.as_ref().ok_or(ConfigError::NoResourceStore)?;
        Ok(Client::new(Arc::clone(store), self.namespace.clone()))
    }

    pub(crate) fn set_namespace(&mut self, namespace: String) {
        self.namespace = namespace;
    }
}

/// Generate `prefix-xxxxxxxx` with a random suffix, for namespaces and other
/// per-run object names.
#[must_use]
pub fn random_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let suffix: String = id.chars().take(8).collect();
    format!("{prefix}-{suffix}")
}

fn validate_namespace(value: &str) -> Result<String, ConfigError> {
    let valid = !value.is_empty()
        && value.len() <= 63
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-');

    if valid {
        Ok(value.to_string())
    } else {
        Err(ConfigError::InvalidNamespace(format!(
            "E2E_NAMESPACE must be a DNS-1123 label, got '{value}'"
        )))
    }
}

fn parse_selector(
    vars: &HashMap<String, String>,
    var: &'static str,
) -> Result<Selector, ConfigError> {
    match vars.get(var) {
        Some(value) => {
            Selector::parse(value).map_err(|source| ConfigError::InvalidSelector { var, source })
        }
        None => Ok(Selector::everything()),
    }
}

fn parse_regex(
    vars: &HashMap<String, String>,
    var: &'static str,
) -> Result<Option<Regex>, ConfigError> {
    match vars.get(var).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Regex::new(value)
            .map(Some)
            .map_err(|source| ConfigError::InvalidRegex { var, source }),
        _ => Ok(None),
    }
}

fn parse_bool(vars: &HashMap<String, String>, var: &'static str) -> Result<bool, ConfigError> {
    match vars.get(var).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(value) => match value.as_str() {
            "" | "false" | "0" => Ok(false),
            "true" | "1" => Ok(true),
            _ => Err(ConfigError::InvalidBool { var, value }),
        },
    }
}
