//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for ui-scenario, supporting:
//! - Environment variables for all configurable values
//! - Sensible defaults matching the browser test suites the runner replaces
//! - Builder pattern for programmatic configuration (see [`crate::runner::RunnerConfig`])
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `UI_SCENARIO_WEBDRIVER_URL` | WebDriver endpoint | `http://localhost:4444` |
//! | `UI_SCENARIO_BROWSER` | Browser name (`chrome`, `firefox`, `edge`) | `chrome` |
//! | `UI_SCENARIO_HEADLESS` | Run the browser headless | `false` |
//! | `UI_SCENARIO_SITE_ROOT` | Root directory for relative page targets | `.` |
//! | `UI_SCENARIO_SCENARIO_DIR` | Directory searched for scenarios by name | `./scenarios` |
//! | `UI_SCENARIO_ARTIFACT_DIR` | Base directory for screenshot sessions | `./screenshots` |
//! | `UI_SCENARIO_NAVIGATION_TIMEOUT_MS` | Page load budget | `30000` |
//! | `UI_SCENARIO_ACTION_TIMEOUT_MS` | Budget for element steps | `10000` |
//! | `UI_SCENARIO_CLICK_RETRY_BACKOFF_MS` | Delay before the single click retry | `250` |
//! | `UI_SCENARIO_STRICT_SELECTORS` | Fail when a selector matches several elements | `false` |
//!
//! The legacy `BROWSER` variable is honoured when `UI_SCENARIO_BROWSER` is unset.
//!
//! # Example
//!
//! ```bash
//! export UI_SCENARIO_WEBDRIVER_URL="http://127.0.0.1:9515"
//! export UI_SCENARIO_BROWSER="firefox"
//! export UI_SCENARIO_HEADLESS=1
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Default Values
// ============================================================================

/// Default WebDriver endpoint (selenium-server / geckodriver style port)
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

/// Default browser name
pub const DEFAULT_BROWSER: &str = "chrome";

/// Default site root for relative targets
pub const DEFAULT_SITE_ROOT: &str = ".";

/// Default directory searched for named scenarios
pub const DEFAULT_SCENARIO_DIR: &str = "./scenarios";

/// Default base directory for artifact sessions
pub const DEFAULT_ARTIFACT_DIR: &str = "./screenshots";

/// Default navigation timeout (milliseconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Default timeout for element steps (milliseconds)
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 10_000;

/// Default backoff before the click retry (milliseconds)
pub const DEFAULT_CLICK_RETRY_BACKOFF_MS: u64 = 250;

/// Upper bound for the click retry backoff (milliseconds)
pub const MAX_CLICK_RETRY_BACKOFF_MS: u64 = 500;

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_WEBDRIVER_URL: &str = "UI_SCENARIO_WEBDRIVER_URL";
pub const ENV_BROWSER: &str = "UI_SCENARIO_BROWSER";
pub const ENV_HEADLESS: &str = "UI_SCENARIO_HEADLESS";
pub const ENV_SITE_ROOT: &str = "UI_SCENARIO_SITE_ROOT";
pub const ENV_SCENARIO_DIR: &str = "UI_SCENARIO_SCENARIO_DIR";
pub const ENV_ARTIFACT_DIR: &str = "UI_SCENARIO_ARTIFACT_DIR";
pub const ENV_NAVIGATION_TIMEOUT_MS: &str = "UI_SCENARIO_NAVIGATION_TIMEOUT_MS";
pub const ENV_ACTION_TIMEOUT_MS: &str = "UI_SCENARIO_ACTION_TIMEOUT_MS";
pub const ENV_CLICK_RETRY_BACKOFF_MS: &str = "UI_SCENARIO_CLICK_RETRY_BACKOFF_MS";
pub const ENV_STRICT_SELECTORS: &str = "UI_SCENARIO_STRICT_SELECTORS";

/// Legacy browser selector used by the old Selenium scripts
pub const ENV_BROWSER_LEGACY: &str = "BROWSER";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for ui-scenario
#[derive(Debug, Clone)]
pub struct Config {
    /// Browser session settings
    pub browser: BrowserSettings,
    /// Filesystem locations
    pub paths: PathSettings,
    /// Step timing and selector policy
    pub steps: StepSettings,
}

/// Browser session settings
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// WebDriver endpoint URL
    pub webdriver_url: String,
    /// Browser name
    pub browser: String,
    /// Whether to request a headless browser
    pub headless: bool,
}

/// Filesystem locations
#[derive(Debug, Clone)]
pub struct PathSettings {
    /// Root directory relative page targets resolve against
    pub site_root: PathBuf,
    /// Directory searched for scenarios given by name
    pub scenario_dir: PathBuf,
    /// Base directory for artifact sessions
    pub artifact_dir: PathBuf,
}

/// Step timing and selector policy
#[derive(Debug, Clone)]
pub struct StepSettings {
    pub navigation_timeout_ms: u64,
    pub action_timeout_ms: u64,
    pub click_retry_backoff_ms: u64,
    pub strict_selectors: bool,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            browser: BrowserSettings::from_env(),
            paths: PathSettings::from_env(),
            steps: StepSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            browser: BrowserSettings::defaults(),
            paths: PathSettings::defaults(),
            steps: StepSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl BrowserSettings {
    pub fn from_env() -> Self {
        Self {
            webdriver_url: env::var(ENV_WEBDRIVER_URL)
                .unwrap_or_else(|_| DEFAULT_WEBDRIVER_URL.to_string()),
            browser: env::var(ENV_BROWSER)
                .or_else(|_| env::var(ENV_BROWSER_LEGACY))
                .map(|b| b.to_lowercase())
                .unwrap_or_else(|_| DEFAULT_BROWSER.to_string()),
            headless: env_flag(ENV_HEADLESS).unwrap_or(false),
        }
    }

    pub fn defaults() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            browser: DEFAULT_BROWSER.to_string(),
            headless: false,
        }
    }
}

impl PathSettings {
    pub fn from_env() -> Self {
        Self {
            site_root: env::var(ENV_SITE_ROOT)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_SITE_ROOT)),
            scenario_dir: env::var(ENV_SCENARIO_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_SCENARIO_DIR)),
            artifact_dir: env::var(ENV_ARTIFACT_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_ARTIFACT_DIR)),
        }
    }

    pub fn defaults() -> Self {
        Self {
            site_root: PathBuf::from(DEFAULT_SITE_ROOT),
            scenario_dir: PathBuf::from(DEFAULT_SCENARIO_DIR),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
        }
    }
}

impl StepSettings {
    pub fn from_env() -> Self {
        Self {
            navigation_timeout_ms: env_u64(ENV_NAVIGATION_TIMEOUT_MS)
                .unwrap_or(DEFAULT_NAVIGATION_TIMEOUT_MS),
            action_timeout_ms: env_u64(ENV_ACTION_TIMEOUT_MS).unwrap_or(DEFAULT_ACTION_TIMEOUT_MS),
            click_retry_backoff_ms: clamp_backoff(
                env_u64(ENV_CLICK_RETRY_BACKOFF_MS).unwrap_or(DEFAULT_CLICK_RETRY_BACKOFF_MS),
            ),
            strict_selectors: env_flag(ENV_STRICT_SELECTORS).unwrap_or(false),
        }
    }

    pub fn defaults() -> Self {
        Self {
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            action_timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            click_retry_backoff_ms: DEFAULT_CLICK_RETRY_BACKOFF_MS,
            strict_selectors: false,
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Clamp a click retry backoff to the permitted maximum
pub fn clamp_backoff(ms: u64) -> u64 {
    ms.min(MAX_CLICK_RETRY_BACKOFF_MS)
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name).ok().and_then(|s| parse_flag(&s))
}

/// Parse a boolean flag value ("1", "true", "yes", "on" and their negatives)
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_clamp_backoff() {
        assert_eq!(clamp_backoff(100), 100);
        assert_eq!(clamp_backoff(500), 500);
        assert_eq!(clamp_backoff(2_000), MAX_CLICK_RETRY_BACKOFF_MS);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert_eq!(config.browser.webdriver_url, DEFAULT_WEBDRIVER_URL);
        assert_eq!(config.browser.browser, DEFAULT_BROWSER);
        assert!(!config.browser.headless);
        assert_eq!(config.steps.navigation_timeout(), Duration::from_secs(30));
        assert_eq!(config.paths.artifact_dir, PathBuf::from(DEFAULT_ARTIFACT_DIR));
    }
}
