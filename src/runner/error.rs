use serde::{Deserialize, Serialize};

/// Why a step failed.
///
/// Every variant is recovered at the step boundary and recorded in the
/// step's result; none escapes the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepError {
    #[error("navigation to '{target}' failed: {reason}")]
    NavigationError { target: String, reason: String },

    #[error("no element matches '{selector}'")]
    ElementNotFound { selector: String },

    #[error("selector '{selector}' matches {count} elements")]
    AmbiguousSelector { selector: String, count: usize },

    #[error("interaction with '{selector}' failed: {reason}")]
    InteractionError { selector: String, reason: String },

    #[error("{subject}: expected '{expected}', got '{actual}'")]
    AssertionFailed {
        subject: String,
        expected: String,
        actual: String,
    },

    #[error("step timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("screenshot failed: {reason}")]
    ArtifactError { reason: String },

    /// No dialog within the wait budget. Only used to tell "validation
    /// blocked submission" apart from a dialog; never recorded as a failure.
    #[error("no dialog within {timeout_ms} ms")]
    DialogTimeout { timeout_ms: u64 },
}
