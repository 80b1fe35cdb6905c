//! Browser driver abstraction.
//!
//! The runner depends only on the [`BrowserDriver`] capability surface:
//! - [`WebDriverClient`] drives a W3C WebDriver session through `fantoccini`
//! - [`MockBrowser`] is an in-memory page model for tests and benchmarks

pub mod mock;
pub mod webdriver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use mock::{MockBrowser, MockElement, MockPage};
pub use webdriver::{WebDriverClient, browser_capabilities};

/// Opaque reference to an element in the current page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors reported by a browser driver
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The element exists but cannot receive the interaction right now
    #[error("element not clickable: {0}")]
    NotInteractable(String),

    #[error("no such element: {0}")]
    NoSuchElement(String),

    #[error("stale element reference: {0}")]
    StaleElement(String),

    #[error("no dialog is open")]
    NoSuchAlert,

    /// The browser refused or failed to load a page
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Any other error reported by the WebDriver endpoint
    #[error("webdriver error '{error}': {message}")]
    WebDriver { error: String, message: String },

    /// The endpoint refused to start a browser session
    #[error("session not created: {0}")]
    SessionNotCreated(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("session is closed")]
    Closed,
}

impl DriverError {
    /// Whether a click may succeed when retried once (overlay, animation, late layout)
    pub fn is_transient_click_failure(&self) -> bool {
        matches!(self, DriverError::NotInteractable(_))
    }
}

/// Capability surface the scenario runner drives.
///
/// Implementations own one browser session. Every method is awaited to
/// completion before the runner issues the next call.
#[async_trait]
pub trait BrowserDriver: Send {
    /// Load a URL in the current browsing context
    async fn navigate(&mut self, url: &str) -> DriverResult<()>;

    /// Whether the document has finished loading
    async fn document_ready(&mut self) -> DriverResult<bool>;

    /// All elements matching a CSS selector, in document order
    async fn locate(&mut self, selector: &str) -> DriverResult<Vec<ElementHandle>>;

    /// Clear an editable element
    async fn clear(&mut self, element: &ElementHandle) -> DriverResult<()>;

    /// Type text into an element
    async fn type_into(&mut self, element: &ElementHandle, text: &str) -> DriverResult<()>;

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()>;

    /// Read a DOM property; `None` when the property is null or undefined
    async fn get_property(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> DriverResult<Option<String>>;

    /// Wait up to `timeout` for a native dialog and return its message
    async fn wait_for_dialog(&mut self, timeout: Duration) -> DriverResult<Option<String>>;

    /// Accept the open dialog
    async fn accept_dialog(&mut self) -> DriverResult<()>;

    /// PNG bytes of the current viewport
    async fn screenshot(&mut self) -> DriverResult<Vec<u8>>;

    async fn title(&mut self) -> DriverResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_click_failure() {
        assert!(DriverError::NotInteractable("overlay".into()).is_transient_click_failure());
        assert!(!DriverError::NoSuchAlert.is_transient_click_failure());
        assert!(!DriverError::StaleElement("x".into()).is_transient_click_failure());
    }
}
