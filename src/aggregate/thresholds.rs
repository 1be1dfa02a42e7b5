//! Run verdict against configured limits.
//!
//! Failed steps are counted after escalation; skipped, pending and undefined
//! limits look at what the runner reported.
use super::ReportSummary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    pub failed_steps: usize,
    pub skipped_steps: usize,
    pub pending_steps: usize,
    pub undefined_steps: usize,
    pub failed_scenarios: usize,
    pub failed_features: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breach {
    pub limit: &'static str,
    pub found: usize,
    pub allowed: usize,
}

impl Breach {
    pub fn message(&self) -> String {
        format!(
            "found {} {}, while expected not more than {}",
            self.found, self.limit, self.allowed
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub breaches: Vec<Breach>,
}

impl Verdict {
    pub fn failed(&self) -> bool {
        !self.breaches.is_empty()
    }
}

pub fn evaluate(summary: &ReportSummary, thresholds: &Thresholds) -> Verdict {
    let checks = [
        ("failed steps", summary.steps.failed, thresholds.failed_steps),
        (
            "skipped steps",
            summary.internal_steps.skipped,
            thresholds.skipped_steps,
        ),
        (
            "pending steps",
            summary.internal_steps.pending,
            thresholds.pending_steps,
        ),
        (
            "undefined steps",
            summary.internal_steps.undefined,
            thresholds.undefined_steps,
        ),
        (
            "failed scenarios",
            summary.failed_scenarios,
            thresholds.failed_scenarios,
        ),
        (
            "failed features",
            summary.failed_features,
            thresholds.failed_features,
        ),
    ];
    let breaches = checks
        .into_iter()
        .filter(|(_, found, allowed)| found > allowed)
        .map(|(limit, found, allowed)| Breach {
            limit,
            found,
            allowed,
        })
        .collect();
    Verdict { breaches }
}
