//! Execution outcome reports.

use crate::step::Level;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Outcome of a feature or step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

/// Outcome of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    #[serde(serialize_with = "serialize_level")]
    pub level: Level,
    pub outcome: Outcome,
}

fn serialize_level<S: serde::Serializer>(level: &Level, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(level.as_str())
}

/// Outcome of one feature execution.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureReport {
    pub name: String,
    pub outcome: Outcome,
    /// Why the feature was skipped, when it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Steps in execution order, including those skipped after a failure.
    pub steps: Vec<StepReport>,
    /// Everything logged through the test handle, failures included.
    pub messages: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl FeatureReport {
    /// Report for a feature the selection filter skipped.
    pub(crate) fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::Skipped,
            skip_reason: Some(reason.into()),
            steps: Vec::new(),
            messages: Vec::new(),
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    /// Whether the feature failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }

    /// Names of steps that actually executed, in order.
    #[must_use]
    pub fn executed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.outcome != Outcome::Skipped)
            .map(|s| s.name.as_str())
            .collect()
    }
}

/// Outcome tally for a batch of features.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteReport {
    pub features: Vec<FeatureReport>,
}

impl SuiteReport {
    /// Add a feature report.
    pub fn record(&mut self, report: FeatureReport) {
        self.features.push(report);
    }

    /// Number of features that passed.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.count(Outcome::Passed)
    }

    /// Number of features that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(Outcome::Failed)
    }

    /// Number of features that were skipped.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(Outcome::Skipped)
    }

    /// Whether no executed feature failed. Skipped features do not count.
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed() == 0
    }

    /// Report for the named feature.
    #[must_use]
    pub fn feature(&self, name: &str) -> Option<&FeatureReport> {
        self.features.iter().find(|f| f.name == name)
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.features.iter().filter(|f| f.outcome == outcome).count()
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}
