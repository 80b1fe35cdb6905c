use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One declarative UI action or check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Load a page (file relative to the site root, or a URL)
    Navigate(String),

    /// Clear the located element and type `value` into it
    Fill { selector: String, value: String },

    /// Click the located element
    Click(String),

    /// Wait for a native dialog; no dialog means client-side validation blocked submission
    ExpectDialogOrValidation { timeout_ms: u64 },

    /// Capture the viewport under a label
    Screenshot(String),

    /// Compare the element's current `value` with `expected`
    AssertValue { selector: String, expected: String },

    /// Let the page settle for a fixed time
    Pause(u64),

    /// Check the document title; `None` only requires it to be non-empty
    AssertTitle(Option<String>),

    /// Check that the document title contains the given text
    AssertTitleContains(String),

    /// Check that at least one element matches the selector
    AssertPresent(String),
}

impl Step {
    pub fn navigate(target: impl Into<String>) -> Self {
        Step::Navigate(target.into())
    }

    pub fn fill(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Step::Fill {
            selector: selector.into(),
            value: value.into(),
        }
    }

    pub fn click(selector: impl Into<String>) -> Self {
        Step::Click(selector.into())
    }

    pub fn expect_dialog_or_validation(timeout_ms: u64) -> Self {
        Step::ExpectDialogOrValidation { timeout_ms }
    }

    pub fn screenshot(label: impl Into<String>) -> Self {
        Step::Screenshot(label.into())
    }

    pub fn assert_value(selector: impl Into<String>, expected: impl Into<String>) -> Self {
        Step::AssertValue {
            selector: selector.into(),
            expected: expected.into(),
        }
    }

    /// Short step kind, used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Navigate(_) => "navigate",
            Step::Fill { .. } => "fill",
            Step::Click(_) => "click",
            Step::ExpectDialogOrValidation { .. } => "expect_dialog_or_validation",
            Step::Screenshot(_) => "screenshot",
            Step::AssertValue { .. } => "assert_value",
            Step::Pause(_) => "pause",
            Step::AssertTitle(_) => "assert_title",
            Step::AssertTitleContains(_) => "assert_title_contains",
            Step::AssertPresent(_) => "assert_present",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Navigate(target) => write!(f, "Navigate('{}')", target),
            Step::Fill { selector, value } => write!(f, "Fill('{}', '{}')", selector, value),
            Step::Click(selector) => write!(f, "Click('{}')", selector),
            Step::ExpectDialogOrValidation { timeout_ms } => {
                write!(f, "ExpectDialogOrValidation({})", timeout_ms)
            }
            Step::Screenshot(label) => write!(f, "Screenshot('{}')", label),
            Step::AssertValue { selector, expected } => {
                write!(f, "AssertValue('{}', '{}')", selector, expected)
            }
            Step::Pause(ms) => write!(f, "Pause({})", ms),
            Step::AssertTitle(Some(expected)) => write!(f, "AssertTitle('{}')", expected),
            Step::AssertTitle(None) => write!(f, "AssertTitle()"),
            Step::AssertTitleContains(text) => write!(f, "AssertTitleContains('{}')", text),
            Step::AssertPresent(selector) => write!(f, "AssertPresent('{}')", selector),
        }
    }
}

/// A named, ordered list of UI steps against one page.
///
/// A scenario always holds at least one step; the constructor and the
/// deserializer both reject empty step lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawScenario")]
pub struct Scenario {
    name: String,
    target_page: String,
    steps: Vec<Step>,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        target_page: impl Into<String>,
        steps: Vec<Step>,
    ) -> DefinitionResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ScenarioError::EmptyName);
        }
        if steps.is_empty() {
            return Err(ScenarioError::Empty(name));
        }
        Ok(Self {
            name,
            target_page: target_page.into(),
            steps,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_page(&self) -> &str {
        &self.target_page
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

/// Unvalidated scenario shape as it appears in scenario files
#[derive(Debug, Deserialize)]
struct RawScenario {
    name: String,
    #[serde(default)]
    target_page: String,
    #[serde(default)]
    steps: Vec<Step>,
}

impl TryFrom<RawScenario> for Scenario {
    type Error = ScenarioError;

    fn try_from(raw: RawScenario) -> Result<Self, Self::Error> {
        Scenario::new(raw.name, raw.target_page, raw.steps)
    }
}

/// Result type for scenario definition and loading
pub type DefinitionResult<T> = Result<T, ScenarioError>;

/// Errors raised while defining or loading scenarios
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("scenario '{0}' has no steps; a scenario needs at least one step")]
    Empty(String),

    #[error("scenario name must not be empty")]
    EmptyName,

    #[error("scenario '{name}' not found (looked for {})", searched.display())]
    NotFound { name: String, searched: PathBuf },

    #[error("failed to read scenario file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
