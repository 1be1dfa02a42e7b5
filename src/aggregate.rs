//! Roll-up of classified steps into scenario, feature and report statistics.
//!
//! Every step is classified once up front; all counts are then recomputed
//! from those outcomes on demand instead of being cached and patched.
use crate::classify::{classify, EscalationPolicy, Status, StepOutcome};
use crate::model::{Feature, Scenario, Step};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;

pub mod duration;
pub mod thresholds;

pub use duration::format_duration;

/// Per-status step counts plus summed duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pending: usize,
    pub undefined: usize,
    pub missing: usize,
    pub total: usize,
    pub duration_ns: u64,
}

impl AggregateStats {
    pub fn from_statuses(items: impl IntoIterator<Item = (Status, u64)>) -> Self {
        let mut stats = AggregateStats::default();
        for (status, duration_ns) in items {
            match status {
                Status::Passed => stats.passed += 1,
                Status::Failed => stats.failed += 1,
                Status::Skipped => stats.skipped += 1,
                Status::Pending => stats.pending += 1,
                Status::Undefined => stats.undefined += 1,
                Status::Missing => stats.missing += 1,
            }
            stats.total += 1;
            stats.duration_ns = stats.duration_ns.saturating_add(duration_ns);
        }
        stats
    }

    pub fn count(&self, status: Status) -> usize {
        match status {
            Status::Passed => self.passed,
            Status::Failed => self.failed,
            Status::Skipped => self.skipped,
            Status::Pending => self.pending,
            Status::Undefined => self.undefined,
            Status::Missing => self.missing,
        }
    }

    /// Binary roll-up: any failed step fails the whole group.
    pub fn status(&self) -> Status {
        if self.failed > 0 {
            Status::Failed
        } else {
            Status::Passed
        }
    }

    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration_ns)
    }
}

#[derive(Debug, Clone)]
pub struct ClassifiedStep<'a> {
    pub step: &'a Step,
    pub outcome: StepOutcome,
}

impl ClassifiedStep<'_> {
    pub fn display_error(&self) -> Option<&str> {
        self.outcome.display_error(self.step.error_message())
    }
}

#[derive(Debug, Clone)]
pub struct ClassifiedScenario<'a> {
    pub scenario: &'a Scenario,
    pub steps: Vec<ClassifiedStep<'a>>,
}

impl ClassifiedScenario<'_> {
    pub fn stats(&self) -> AggregateStats {
        AggregateStats::from_statuses(
            self.steps
                .iter()
                .map(|step| (step.outcome.final_status, step.step.duration_ns())),
        )
    }

    pub fn internal_stats(&self) -> AggregateStats {
        AggregateStats::from_statuses(
            self.steps
                .iter()
                .map(|step| (step.outcome.internal, step.step.duration_ns())),
        )
    }

    pub fn status(&self) -> Status {
        self.stats().status()
    }
}

#[derive(Debug, Clone)]
pub struct ClassifiedFeature<'a> {
    pub feature: &'a Feature,
    pub scenarios: Vec<ClassifiedScenario<'a>>,
}

impl<'a> ClassifiedFeature<'a> {
    fn outcomes(&self) -> impl Iterator<Item = &ClassifiedStep<'a>> + '_ {
        self.scenarios.iter().flat_map(|scenario| scenario.steps.iter())
    }

    pub fn stats(&self) -> AggregateStats {
        AggregateStats::from_statuses(
            self.outcomes()
                .map(|step| (step.outcome.final_status, step.step.duration_ns())),
        )
    }

    pub fn internal_stats(&self) -> AggregateStats {
        AggregateStats::from_statuses(
            self.outcomes()
                .map(|step| (step.outcome.internal, step.step.duration_ns())),
        )
    }

    /// FAILED if any step's final status is FAILED, else PASSED.
    pub fn status(&self) -> Status {
        self.stats().status()
    }

    pub fn failed_scenarios(&self) -> usize {
        self.scenarios
            .iter()
            .filter(|scenario| scenario.status().is_failed())
            .count()
    }
}

/// Classify every step of every feature, preserving input order.
pub fn classify_features<'a>(
    features: &'a [Feature],
    policy: &EscalationPolicy,
) -> Result<Vec<ClassifiedFeature<'a>>> {
    features
        .iter()
        .map(|feature| {
            let scenarios = feature
                .elements
                .iter()
                .map(|scenario| classify_scenario(feature, scenario, policy))
                .collect::<Result<Vec<_>>>()?;
            Ok(ClassifiedFeature { feature, scenarios })
        })
        .collect()
}

fn classify_scenario<'a>(
    feature: &Feature,
    scenario: &'a Scenario,
    policy: &EscalationPolicy,
) -> Result<ClassifiedScenario<'a>> {
    let steps = scenario
        .steps
        .iter()
        .map(|step| {
            let outcome = classify(step.raw_status(), policy).with_context(|| {
                format!(
                    "feature {:?}, scenario {:?}, step {:?}",
                    feature.uri(),
                    scenario.name,
                    step.name
                )
            })?;
            Ok(ClassifiedStep { step, outcome })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ClassifiedScenario { scenario, steps })
}

/// Cross-feature totals for the overview page and the threshold verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub features: usize,
    pub failed_features: usize,
    pub scenarios: usize,
    pub failed_scenarios: usize,
    /// Counts by final (post-escalation) status.
    pub steps: AggregateStats,
    /// Counts by the status the runner reported.
    pub internal_steps: AggregateStats,
    pub duration: String,
}

impl ReportSummary {
    pub fn status(&self) -> Status {
        self.steps.status()
    }
}

pub fn summarize(features: &[ClassifiedFeature<'_>]) -> ReportSummary {
    let all_steps = || {
        features
            .iter()
            .flat_map(|feature| feature.scenarios.iter())
            .flat_map(|scenario| scenario.steps.iter())
    };
    let steps = AggregateStats::from_statuses(
        all_steps().map(|step| (step.outcome.final_status, step.step.duration_ns())),
    );
    let internal_steps = AggregateStats::from_statuses(
        all_steps().map(|step| (step.outcome.internal, step.step.duration_ns())),
    );
    ReportSummary {
        features: features.len(),
        failed_features: features
            .iter()
            .filter(|feature| feature.status().is_failed())
            .count(),
        scenarios: features.iter().map(|feature| feature.scenarios.len()).sum(),
        failed_scenarios: features.iter().map(|feature| feature.failed_scenarios()).sum(),
        steps,
        internal_steps,
        duration: format_duration(steps.duration_ns),
    }
}

/// Combine features sharing a name into the first occurrence, appending the
/// scenarios of later ones in input order.
pub fn merge_features_by_name(features: Vec<Feature>) -> Vec<Feature> {
    merge_features_by(features, |feature| feature.name.clone())
}

/// Combine features that map to the same report page, which happens when
/// several result shards ran scenarios of one feature file.
pub fn merge_features_by_uri(features: Vec<Feature>) -> Vec<Feature> {
    merge_features_by(features, Feature::file_name)
}

fn merge_features_by(features: Vec<Feature>, key: impl Fn(&Feature) -> String) -> Vec<Feature> {
    let mut merged: Vec<Feature> = Vec::with_capacity(features.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for feature in features {
        let feature_key = key(&feature);
        match seen.get(&feature_key) {
            Some(&idx) => {
                tracing::debug!(key = %feature_key, "combining feature with earlier occurrence");
                merged[idx].elements.extend(feature.elements);
            }
            None => {
                seen.insert(feature_key, merged.len());
                merged.push(feature);
            }
        }
    }
    merged
}

#[cfg(test)]
#[path = "aggregate_tests.rs"]
mod tests;
