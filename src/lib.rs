//! ui-scenario - declarative browser UI scenarios.
//!
//! This crate provides:
//! - A scenario model: named, ordered steps against one page
//! - A runner that executes steps fail-fast against any [`BrowserDriver`]
//! - Native dialog vs. HTML5 validation detection as an explicit observation
//! - Collision-free screenshot artifacts in per-run sessions
//! - A W3C WebDriver client and an in-memory mock browser
//!
//! # Example
//!
//! ```rust,no_run
//! use ui_scenario::{Runner, RunnerConfig, Scenario, Session, Step, WebDriverClient, browser_capabilities};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let scenario = Scenario::new(
//!     "register-empty",
//!     "register.html",
//!     vec![
//!         Step::navigate("register.html"),
//!         Step::click("input[type=submit]"),
//!         Step::expect_dialog_or_validation(1500),
//!         Step::screenshot("after-submit"),
//!     ],
//! )?;
//!
//! let mut driver =
//!     WebDriverClient::connect("http://localhost:4444", browser_capabilities("chrome", true)).await?;
//! let session = Session::in_dir("./screenshots/smoke");
//! session.init()?;
//!
//! let result = Runner::new(&session, RunnerConfig::default()).run(&scenario, &mut driver).await;
//! println!("{}", result);
//! driver.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod driver;
pub mod logging;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod target;

// Re-export scenario types
pub use scenario::{Scenario, ScenarioError, Step};

// Re-export driver types
pub use driver::{
    BrowserDriver, DriverError, DriverResult, ElementHandle, MockBrowser, MockElement, MockPage,
    WebDriverClient, browser_capabilities,
};

// Re-export runner types
pub use runner::{
    BatchResult, Observation, Runner, RunnerConfig, ScenarioResult, ScenarioStatus, StepError,
    StepOutcome, StepResult, run,
};

// Re-export session management
pub use session::{ArtifactStore, Session, cleanup_old_sessions, list_sessions};
