//! Step status classification.
//!
//! Raw status strings map onto a canonical [`Status`]; the escalation policy
//! then decides which non-failing outcomes count as failures for health
//! decisions. Both the internal and the final status stay queryable.
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
    Pending,
    Undefined,
    Missing,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Passed,
        Status::Failed,
        Status::Skipped,
        Status::Pending,
        Status::Undefined,
        Status::Missing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
            Status::Pending => "pending",
            Status::Undefined => "undefined",
            Status::Missing => "missing",
        }
    }

    pub fn is_failed(&self) -> bool {
        *self == Status::Failed
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| anyhow!("unrecognized step status {raw:?}"))
    }
}

/// Statuses that additionally count as FAILED for aggregate health.
///
/// `Passed` and `Failed` are never stored; escalation only moves toward FAILED.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EscalationPolicy {
    escalated: BTreeSet<Status>,
}

impl EscalationPolicy {
    pub fn treat_skipped_as_failing(mut self, enabled: bool) -> Self {
        self.set(Status::Skipped, enabled);
        self
    }

    pub fn treat_undefined_as_failing(mut self, enabled: bool) -> Self {
        self.set(Status::Undefined, enabled);
        self
    }

    pub fn treat_pending_as_failing(mut self, enabled: bool) -> Self {
        self.set(Status::Pending, enabled);
        self
    }

    pub fn treat_missing_as_failing(mut self, enabled: bool) -> Self {
        self.set(Status::Missing, enabled);
        self
    }

    pub fn escalates(&self, status: Status) -> bool {
        self.escalated.contains(&status)
    }

    pub fn statuses(&self) -> impl Iterator<Item = Status> + '_ {
        self.escalated.iter().copied()
    }

    fn set(&mut self, status: Status, enabled: bool) {
        if enabled {
            self.escalated.insert(status);
        } else {
            self.escalated.remove(&status);
        }
    }
}

/// Classification of one step: what the runner reported and what counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub internal: Status,
    pub final_status: Status,
}

impl StepOutcome {
    pub fn escalated(&self) -> bool {
        self.internal != self.final_status
    }

    /// Error text to show next to the step. Escalated steps get a synthetic
    /// explanation when the runner recorded none.
    pub fn display_error<'a>(&self, raw: Option<&'a str>) -> Option<&'a str> {
        if let Some(message) = raw.filter(|message| !message.trim().is_empty()) {
            return Some(message);
        }
        if !self.escalated() {
            return None;
        }
        match self.internal {
            Status::Skipped => Some("this step was skipped"),
            Status::Undefined => Some("this step is not implemented"),
            Status::Pending => Some("this step is pending"),
            Status::Missing => Some("this step has no result"),
            Status::Passed | Status::Failed => None,
        }
    }
}

pub fn classify(raw: &str, policy: &EscalationPolicy) -> Result<StepOutcome> {
    let internal: Status = raw.parse()?;
    let final_status = if policy.escalates(internal) {
        Status::Failed
    } else {
        internal
    };
    Ok(StepOutcome {
        internal,
        final_status,
    })
}
