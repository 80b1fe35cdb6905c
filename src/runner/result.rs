//! Types for scenario run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use super::error::StepError;

/// What happened to one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    /// Not executed because an earlier step failed
    Skipped { reason: String },
    Failed { error: StepError },
}

/// What a step observed on the page, when it observes anything
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Observation {
    /// A native dialog appeared and was accepted
    Dialog { message: String },

    /// No dialog appeared: client-side validation blocked the submission.
    /// `first_invalid` names the first `:invalid` form field, if one was found.
    ValidationBlocked { first_invalid: Option<String> },

    Title { title: String },
}

/// Result of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Position in the scenario (0-based)
    pub index: usize,

    /// The step in compact notation
    pub step: String,

    pub outcome: StepOutcome,

    /// Files written by this step
    pub artifacts: BTreeSet<PathBuf>,

    pub observation: Option<Observation>,

    pub duration_ms: u64,
}

impl StepResult {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, StepOutcome::Failed { .. })
    }

    pub fn error(&self) -> Option<&StepError> {
        match &self.outcome {
            StepOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Success,
    Failed,
}

/// Result of one scenario execution; read-only once produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    scenario: String,
    target_page: String,
    status: ScenarioStatus,
    steps: Vec<StepResult>,
    started_at: DateTime<Utc>,
    duration_ms: u64,
}

impl ScenarioResult {
    pub(crate) fn new(
        scenario: String,
        target_page: String,
        steps: Vec<StepResult>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        let status = if steps.iter().any(StepResult::is_failed) {
            ScenarioStatus::Failed
        } else {
            ScenarioStatus::Success
        };
        Self {
            scenario,
            target_page,
            status,
            steps,
            started_at,
            duration_ms,
        }
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn target_page(&self) -> &str {
        &self.target_page
    }

    pub fn status(&self) -> ScenarioStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == ScenarioStatus::Success
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn first_failure(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.is_failed())
    }

    /// All artifact paths of the scenario, in step order
    pub fn artifacts(&self) -> impl Iterator<Item = &PathBuf> {
        self.steps.iter().flat_map(|s| s.artifacts.iter())
    }
}

impl fmt::Display for ScenarioResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.first_failure() {
            None => write!(
                f,
                "PASS {} ({} steps, {} ms)",
                self.scenario,
                self.steps.len(),
                self.duration_ms
            ),
            Some(failed) => {
                let reason = failed
                    .error()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                write!(
                    f,
                    "FAIL {}: step {} {}: {}",
                    self.scenario, failed.index, failed.step, reason
                )
            }
        }
    }
}

/// Results of a batch of scenarios run on one driver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<ScenarioResult>,
}

impl BatchResult {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    /// True when every scenario passed
    pub fn success(&self) -> bool {
        self.failed() == 0
    }

    /// Process exit code for the batch: 0 if all passed, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.success() { 0 } else { 1 }
    }
}
