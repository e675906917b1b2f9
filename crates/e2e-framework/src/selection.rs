//! Feature selection filter.
//!
//! Decides, before any hook or step runs, whether a feature executes. A
//! feature runs when its labels match the include selector, do not match the
//! skip selector, and its name passes the feature name filters. Assessment
//! filters apply to individual `Assess` steps of features that do run.

use crate::feature::Feature;
use crate::selector::Selector;
use regex::Regex;

/// Outcome of the selection filter for one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Execute the feature.
    Run,
    /// Do not execute the feature.
    Skip(String),
}

impl Decision {
    /// Whether the decision is [`Decision::Run`].
    #[must_use]
    pub fn is_run(&self) -> bool {
        matches!(self, Decision::Run)
    }
}

/// Active selection configuration.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Features must match this selector. Empty matches everything.
    pub labels: Selector,
    /// Features matching this selector are skipped. Empty skips nothing.
    pub skip_labels: Selector,
    /// Only features whose name matches run.
    pub feature: Option<Regex>,
    /// Features whose name matches are skipped.
    pub skip_features: Option<Regex>,
    /// Only assessments whose name matches run.
    pub assess: Option<Regex>,
    /// Assessments whose name matches are skipped.
    pub skip_assessment: Option<Regex>,
}

impl Selection {
    /// Selection that runs everything.
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    /// Decide whether a feature runs.
    #[must_use]
    pub fn decide(&self, feature: &Feature) -> Decision {
        let labels = feature.labels();

        if !self.labels.matches(labels) {
            return Decision::Skip(format!(
                "labels [{}] do not match selector '{}'",
                labels, self.labels
            ));
        }

        if !self.skip_labels.is_empty() && self.skip_labels.matches(labels) {
            return Decision::Skip(format!(
                "labels [{}] match skip selector '{}'",
                labels, self.skip_labels
            ));
        }

        if let Some(pattern) = &self.feature {
            if !pattern.is_match(feature.name()) {
                return Decision::Skip(format!(
                    "feature name does not match '{}'",
                    pattern.as_str()
                ));
            }
        }

        if let Some(pattern) = &self.skip_features {
            if pattern.is_match(feature.name()) {
                return Decision::Skip(format!(
                    "feature name matches skip pattern '{}'",
                    pattern.as_str()
                ));
            }
        }

        Decision::Run
    }

    /// Whether an assessment with this name runs.
    #[must_use]
    pub fn runs_assessment(&self, name: &str) -> bool {
        let included = self.assess.as_ref().map_or(true, |p| p.is_match(name));
        let skipped = self
            .skip_assessment
            .as_ref()
            .is_some_and(|p| p.is_match(name));
        included && !skipped
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::feature::FeatureBuilder;

    fn feature(name: &str, labels: &[(&str, &str)]) -> Feature {
        labels
            .iter()
            .fold(FeatureBuilder::new(name), |b, (k, v)| b.with_label(*k, *v))
            .feature()
    }

    #[test]
    fn test_everything_runs_everything() {
        let selection = Selection::everything();
        assert!(selection.decide(&feature("pod list", &[])).is_run());
        assert!(selection.runs_assessment("anything"));
    }

    #[test]
    fn test_prod_feature_skipped_by_dev_selector() {
        let selection = Selection {
            labels: Selector::parse("env=dev").unwrap(),
            ..Selection::default()
        };

        assert!(matches!(
            selection.decide(&feature("pod list", &[("env", "prod")])),
            Decision::Skip(_)
        ));
        assert!(selection
            .decide(&feature("appsv1/deployment", &[("env", "dev")]))
            .is_run());
    }

    #[test]
    fn test_skip_labels() {
        let selection = Selection {
            skip_labels: Selector::parse("env=prod").unwrap(),
            ..Selection::default()
        };

        assert!(!selection
            .decide(&feature("pod list", &[("env", "prod")]))
            .is_run());
        assert!(selection
            .decide(&feature("appsv1/deployment", &[("env", "dev")]))
            .is_run());
        assert!(selection.decide(&feature("unlabeled", &[])).is_run());
    }

    #[test]
    fn test_feature_name_filters() {
        let selection = Selection {
            feature: Some(Regex::new("^appsv1/").unwrap()),
            skip_features: Some(Regex::new("statefulset").unwrap()),
            ..Selection::default()
        };

        assert!(selection.decide(&feature("appsv1/deployment", &[])).is_run());
        assert!(!selection.decide(&feature("pod list", &[])).is_run());
        assert!(!selection
            .decide(&feature("appsv1/statefulset", &[]))
            .is_run());
    }

    #[test]
    fn test_assessment_filters() {
        let selection = Selection {
            assess: Some(Regex::new("creation").unwrap()),
            skip_assessment: Some(Regex::new("slow").unwrap()),
            ..Selection::default()
        };

        assert!(selection.runs_assessment("deployment creation"));
        assert!(!selection.runs_assessment("deployment deletion"));
        assert!(!selection.runs_assessment("slow creation"));
    }
}
