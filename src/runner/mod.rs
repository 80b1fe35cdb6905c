//! Scenario runner.
//!
//! Executes the steps of a [`Scenario`] strictly in order against a
//! [`BrowserDriver`]. Each step runs under its own timeout; the first
//! failure stops the scenario and the remaining steps are recorded as
//! skipped. Errors never escape [`Runner::run`]; they are captured in the
//! returned [`ScenarioResult`].

pub mod error;
pub mod result;

pub use error::StepError;
pub use result::{BatchResult, Observation, ScenarioResult, ScenarioStatus, StepOutcome, StepResult};

use chrono::Utc;
use std::collections::BTreeSet;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::{self, Config};
use crate::driver::{BrowserDriver, DriverError, ElementHandle};
use crate::scenario::{Scenario, Step};
use crate::session::ArtifactStore;
use crate::target::resolve_target;

/// Query for the first field blocking submission under HTML5 validation
const INVALID_FIELD_QUERY: &str = "form :invalid";

/// Properties tried, in order, to name an invalid field
const FIELD_NAME_PROPERTIES: [&str; 3] = ["name", "id", "tagName"];

/// Interval between document-ready checks after navigation
const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Execution settings for a runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Root directory relative navigation targets resolve against
    pub site_root: PathBuf,
    /// Budget for a `Navigate` step, including the wait for document ready
    pub navigation_timeout: Duration,
    /// Budget for element steps (fill, click, assert, screenshot)
    pub action_timeout: Duration,
    /// Delay before the single retry of a not-clickable element
    pub click_retry_backoff: Duration,
    /// Fail instead of using the first match when a selector is ambiguous
    pub strict_selectors: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from_config(config::get())
    }
}

impl RunnerConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            site_root: cfg.paths.site_root.clone(),
            navigation_timeout: cfg.steps.navigation_timeout(),
            action_timeout: cfg.steps.action_timeout(),
            click_retry_backoff: Duration::from_millis(config::clamp_backoff(
                cfg.steps.click_retry_backoff_ms,
            )),
            strict_selectors: cfg.steps.strict_selectors,
        }
    }

    pub fn site_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.site_root = root.into();
        self
    }

    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    pub fn action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Set the click retry backoff (clamped to the permitted maximum)
    pub fn click_retry_backoff(mut self, backoff: Duration) -> Self {
        let ms = config::clamp_backoff(u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX));
        self.click_retry_backoff = Duration::from_millis(ms);
        self
    }

    pub fn strict_selectors(mut self, strict: bool) -> Self {
        self.strict_selectors = strict;
        self
    }
}

/// What a successful step produced
#[derive(Debug, Default)]
struct StepOutput {
    artifact: Option<PathBuf>,
    observation: Option<Observation>,
}

impl StepOutput {
    fn observed(observation: Observation) -> Self {
        Self {
            artifact: None,
            observation: Some(observation),
        }
    }
}

/// Runs scenarios, writing artifacts to a store
pub struct Runner<'a> {
    store: &'a dyn ArtifactStore,
    config: RunnerConfig,
}

impl<'a> Runner<'a> {
    pub fn new(store: &'a dyn ArtifactStore, config: RunnerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run one scenario to completion (or first failure)
    pub async fn run(&self, scenario: &Scenario, driver: &mut dyn BrowserDriver) -> ScenarioResult {
        let span = info_span!("scenario", scenario = scenario.name());
        self.run_steps(scenario, driver).instrument(span).await
    }

    /// Run scenarios one after another on the same driver
    pub async fn run_batch(
        &self,
        scenarios: &[Scenario],
        driver: &mut dyn BrowserDriver,
    ) -> BatchResult {
        let mut batch = BatchResult::default();
        for scenario in scenarios {
            let result = self.run(scenario, driver).await;
            batch.results.push(result);
        }
        info!(
            passed = batch.passed(),
            failed = batch.failed(),
            "batch complete"
        );
        batch
    }

    async fn run_steps(&self, scenario: &Scenario, driver: &mut dyn BrowserDriver) -> ScenarioResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(target_page = scenario.target_page(), steps = scenario.steps().len(), "scenario started");

        let mut results = Vec::with_capacity(scenario.steps().len());
        let mut failed_at: Option<usize> = None;

        for (index, step) in scenario.steps().iter().enumerate() {
            if let Some(failed) = failed_at {
                results.push(StepResult {
                    index,
                    step: step.to_string(),
                    outcome: StepOutcome::Skipped {
                        reason: format!("step {} failed", failed),
                    },
                    artifacts: BTreeSet::new(),
                    observation: None,
                    duration_ms: 0,
                });
                continue;
            }

            let step_clock = Instant::now();
            let budget = self.budget_for(step);
            let executed = tokio::time::timeout(budget, self.execute(scenario, step, driver)).await;

            let (outcome, output) = match executed {
                Ok(Ok(output)) => (StepOutcome::Success, output),
                Ok(Err(error)) => (StepOutcome::Failed { error }, StepOutput::default()),
                Err(_) => (
                    StepOutcome::Failed {
                        error: Self::timeout_error(step, budget),
                    },
                    StepOutput::default(),
                ),
            };

            match &outcome {
                StepOutcome::Failed { error } => {
                    warn!(index, kind = step.kind(), step = %step, %error, "step failed");
                    failed_at = Some(index);
                }
                _ => debug!(index, kind = step.kind(), "step passed"),
            }

            results.push(StepResult {
                index,
                step: step.to_string(),
                outcome,
                artifacts: output.artifact.into_iter().collect(),
                observation: output.observation,
                duration_ms: step_clock.elapsed().as_millis() as u64,
            });
        }

        let result = ScenarioResult::new(
            scenario.name().to_string(),
            scenario.target_page().to_string(),
            results,
            started_at,
            clock.elapsed().as_millis() as u64,
        );
        info!(status = ?result.status(), duration_ms = result.duration_ms(), "scenario finished");
        result
    }

    /// Time budget for a step; exceeding it cancels only that step
    fn budget_for(&self, step: &Step) -> Duration {
        match step {
            Step::Navigate(_) => self.config.navigation_timeout,
            Step::Click(_) => self.config.action_timeout + self.config.click_retry_backoff,
            Step::ExpectDialogOrValidation { timeout_ms } | Step::Pause(timeout_ms) => {
                Duration::from_millis(*timeout_ms) + self.config.action_timeout
            }
            _ => self.config.action_timeout,
        }
    }

    fn timeout_error(step: &Step, budget: Duration) -> StepError {
        let timeout_ms = budget.as_millis() as u64;
        match step {
            Step::Navigate(target) => StepError::NavigationError {
                target: target.clone(),
                reason: format!("page did not load within {} ms", timeout_ms),
            },
            _ => StepError::Timeout { timeout_ms },
        }
    }

    async fn execute(
        &self,
        scenario: &Scenario,
        step: &Step,
        driver: &mut dyn BrowserDriver,
    ) -> Result<StepOutput, StepError> {
        match step {
            Step::Navigate(target) => {
                self.navigate(driver, target).await?;
                Ok(StepOutput::default())
            }
            Step::Fill { selector, value } => {
                let element = self.locate_one(driver, selector).await?;
                driver
                    .clear(&element)
                    .await
                    .map_err(|e| interaction(selector, e))?;
                driver
                    .type_into(&element, value)
                    .await
                    .map_err(|e| interaction(selector, e))?;
                Ok(StepOutput::default())
            }
            Step::Click(selector) => {
                self.click(driver, selector).await?;
                Ok(StepOutput::default())
            }
            Step::ExpectDialogOrValidation { timeout_ms } => {
                let observation = self
                    .expect_dialog_or_validation(driver, Duration::from_millis(*timeout_ms))
                    .await?;
                Ok(StepOutput::observed(observation))
            }
            Step::Screenshot(label) => {
                let path = self.screenshot(driver, scenario.name(), label).await?;
                Ok(StepOutput {
                    artifact: Some(path),
                    observation: None,
                })
            }
            Step::AssertValue { selector, expected } => {
                let element = self.locate_one(driver, selector).await?;
                let actual = driver
                    .get_property(&element, "value")
                    .await
                    .map_err(|e| interaction(selector, e))?
                    .unwrap_or_default();
                if &actual == expected {
                    Ok(StepOutput::default())
                } else {
                    Err(StepError::AssertionFailed {
                        subject: format!("value of '{}'", selector),
                        expected: expected.clone(),
                        actual,
                    })
                }
            }
            Step::Pause(ms) => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(StepOutput::default())
            }
            Step::AssertTitle(expected) => {
                let title = driver
                    .title()
                    .await
                    .map_err(|e| interaction("document", e))?;
                let matches = match expected {
                    Some(expected) => &title == expected,
                    None => !title.trim().is_empty(),
                };
                if matches {
                    Ok(StepOutput::observed(Observation::Title { title }))
                } else {
                    Err(StepError::AssertionFailed {
                        subject: "document title".to_string(),
                        expected: expected.clone().unwrap_or_else(|| "<non-empty>".to_string()),
                        actual: title,
                    })
                }
            }
            Step::AssertTitleContains(text) => {
                let title = driver
                    .title()
                    .await
                    .map_err(|e| interaction("document", e))?;
                if title.contains(text.as_str()) {
                    Ok(StepOutput::observed(Observation::Title { title }))
                } else {
                    Err(StepError::AssertionFailed {
                        subject: "document title".to_string(),
                        expected: format!("contains '{}'", text),
                        actual: title,
                    })
                }
            }
            Step::AssertPresent(selector) => {
                // Any number of matches passes; the ambiguity policy does not apply
                let found = driver
                    .locate(selector)
                    .await
                    .map_err(|e| interaction(selector, e))?;
                if found.is_empty() {
                    return Err(StepError::ElementNotFound {
                        selector: selector.clone(),
                    });
                }
                debug!(selector = %selector, count = found.len(), "element present");
                Ok(StepOutput::default())
            }
        }
    }

    async fn navigate(&self, driver: &mut dyn BrowserDriver, target: &str) -> Result<(), StepError> {
        let failed = |reason: String| StepError::NavigationError {
            target: target.to_string(),
            reason,
        };

        let url = resolve_target(target, &self.config.site_root).map_err(failed)?;
        info!(%url, "navigating");
        driver
            .navigate(url.as_str())
            .await
            .map_err(|e| failed(e.to_string()))?;

        // Cancelled by the step timeout if the document never becomes ready
        while !driver
            .document_ready()
            .await
            .map_err(|e| failed(e.to_string()))?
        {
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
        Ok(())
    }

    /// Locate exactly one element, applying the ambiguity policy
    async fn locate_one(
        &self,
        driver: &mut dyn BrowserDriver,
        selector: &str,
    ) -> Result<ElementHandle, StepError> {
        let mut found = driver
            .locate(selector)
            .await
            .map_err(|e| interaction(selector, e))?;

        match found.len() {
            0 => Err(StepError::ElementNotFound {
                selector: selector.to_string(),
            }),
            1 => Ok(found.remove(0)),
            count if self.config.strict_selectors => Err(StepError::AmbiguousSelector {
                selector: selector.to_string(),
                count,
            }),
            count => {
                warn!(selector, count, "selector matches several elements, using the first");
                Ok(found.remove(0))
            }
        }
    }

    /// Click with a single bounded retry on a transient not-clickable failure
    async fn click(&self, driver: &mut dyn BrowserDriver, selector: &str) -> Result<(), StepError> {
        let element = self.locate_one(driver, selector).await?;
        match driver.click(&element).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_transient_click_failure() => {
                debug!(selector, error = %e, "click rejected, retrying once");
                tokio::time::sleep(self.config.click_retry_backoff).await;
                driver
                    .click(&element)
                    .await
                    .map_err(|e| interaction(selector, e))
            }
            Err(e) => Err(interaction(selector, e)),
        }
    }

    /// Race a native dialog against the timeout; exactly one observation results
    async fn expect_dialog_or_validation(
        &self,
        driver: &mut dyn BrowserDriver,
        timeout: Duration,
    ) -> Result<Observation, StepError> {
        match Self::await_dialog(driver, timeout).await {
            Ok(message) => {
                driver
                    .accept_dialog()
                    .await
                    .map_err(|e| interaction("dialog", e))?;
                info!(%message, "dialog accepted");
                Ok(Observation::Dialog { message })
            }
            Err(StepError::DialogTimeout { .. }) => {
                let first_invalid = Self::first_invalid_field(driver).await;
                info!(first_invalid = ?first_invalid, "no dialog, validation blocked submission");
                Ok(Observation::ValidationBlocked { first_invalid })
            }
            Err(e) => Err(e),
        }
    }

    async fn await_dialog(
        driver: &mut dyn BrowserDriver,
        timeout: Duration,
    ) -> Result<String, StepError> {
        match driver.wait_for_dialog(timeout).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(StepError::DialogTimeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
            Err(e) => Err(interaction("dialog", e)),
        }
    }

    /// Name of the first `:invalid` form field; `None` when it cannot be determined
    async fn first_invalid_field(driver: &mut dyn BrowserDriver) -> Option<String> {
        let invalid = match driver.locate(INVALID_FIELD_QUERY).await {
            Ok(found) => found.into_iter().next()?,
            Err(e) => {
                debug!(error = %e, "could not query invalid fields");
                return None;
            }
        };

        for property in FIELD_NAME_PROPERTIES {
            if let Ok(Some(value)) = driver.get_property(&invalid, property).await {
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
        None
    }

    async fn screenshot(
        &self,
        driver: &mut dyn BrowserDriver,
        scenario: &str,
        label: &str,
    ) -> Result<PathBuf, StepError> {
        let bytes = driver.screenshot().await.map_err(|e| StepError::ArtifactError {
            reason: format!("capture failed: {}", e),
        })?;

        let (width, height) = image::io::Reader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| StepError::ArtifactError {
                reason: e.to_string(),
            })?
            .into_dimensions()
            .map_err(|e| StepError::ArtifactError {
                reason: format!("captured data is not an image: {}", e),
            })?;

        let path = self.store.artifact_path(scenario, label);
        let saved = self
            .store
            .save(&bytes, &path)
            .map_err(|e| StepError::ArtifactError {
                reason: format!("{}: {}", path.display(), e),
            })?;
        info!(path = %saved.display(), width, height, "screenshot saved");
        Ok(saved)
    }
}

fn interaction(selector: &str, error: DriverError) -> StepError {
    StepError::InteractionError {
        selector: selector.to_string(),
        reason: error.to_string(),
    }
}

/// Run one scenario with a fresh [`Runner`]
pub async fn run(
    scenario: &Scenario,
    driver: &mut dyn BrowserDriver,
    store: &dyn ArtifactStore,
    config: &RunnerConfig,
) -> ScenarioResult {
    Runner::new(store, config.clone()).run(scenario, driver).await
}
