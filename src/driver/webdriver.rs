//! W3C WebDriver client.
//!
//! Wraps a `fantoccini` session (chromedriver, geckodriver, msedgedriver or
//! selenium-server) behind [`BrowserDriver`]. Element handles given to the
//! runner are local ids for `fantoccini` elements found on the current page.

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::{CmdError, ErrorStatus, NewSessionError, WebDriver as WireError};
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{BrowserDriver, DriverError, DriverResult, ElementHandle};

/// How often to poll for a native dialog
const DIALOG_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Build W3C capabilities for a browser name and headless flag.
///
/// `unhandledPromptBehavior` is set to `ignore` so native dialogs stay open
/// until the runner reads and accepts them.
pub fn browser_capabilities(browser: &str, headless: bool) -> Map<String, Value> {
    let mut caps = Map::new();
    match browser.to_lowercase().as_str() {
        "firefox" | "gecko" => {
            let args: Vec<&str> = if headless { vec!["-headless"] } else { vec![] };
            caps.insert("browserName".into(), json!("firefox"));
            caps.insert("moz:firefoxOptions".into(), json!({ "args": args }));
        }
        "edge" | "msedge" | "microsoftedge" => {
            let mut args = vec!["--start-maximized"];
            if headless {
                args.push("--headless=new");
            }
            caps.insert("browserName".into(), json!("MicrosoftEdge"));
            caps.insert("ms:edgeOptions".into(), json!({ "args": args }));
        }
        _ => {
            let mut args = vec!["--start-maximized"];
            if headless {
                args.push("--headless=new");
                args.push("--window-size=1366,900");
            }
            caps.insert("browserName".into(), json!("chrome"));
            caps.insert("goog:chromeOptions".into(), json!({ "args": args }));
        }
    }
    caps.insert("unhandledPromptBehavior".into(), json!("ignore"));
    caps
}

/// Map a W3C error status onto the driver error taxonomy
fn map_wire_error(error: WireError) -> DriverError {
    let message = error.message.to_string();
    match error.error {
        ErrorStatus::NoSuchAlert => DriverError::NoSuchAlert,
        ErrorStatus::ElementNotInteractable | ErrorStatus::ElementClickIntercepted => {
            DriverError::NotInteractable(message)
        }
        ErrorStatus::NoSuchElement => DriverError::NoSuchElement(message),
        ErrorStatus::StaleElementReference => DriverError::StaleElement(message),
        ErrorStatus::InvalidSessionId => DriverError::Closed,
        other => DriverError::WebDriver {
            error: other.to_string(),
            message,
        },
    }
}

impl From<CmdError> for DriverError {
    fn from(error: CmdError) -> Self {
        match error {
            CmdError::Standard(wire) => map_wire_error(wire),
            other => DriverError::Protocol(other.to_string()),
        }
    }
}

impl From<NewSessionError> for DriverError {
    fn from(error: NewSessionError) -> Self {
        match error {
            NewSessionError::SessionNotCreated(wire) => {
                DriverError::SessionNotCreated(wire.message.to_string())
            }
            other => DriverError::Protocol(other.to_string()),
        }
    }
}

/// A connected WebDriver session
pub struct WebDriverClient {
    client: Client,
    session_id: Option<String>,
    elements: HashMap<String, Element>,
    next_element: u64,
}

impl WebDriverClient {
    /// Create a new session on the WebDriver endpoint at `url`
    pub async fn connect(url: &str, capabilities: Map<String, Value>) -> DriverResult<Self> {
        info!("Creating WebDriver session at {}", url);
        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(url)
            .await?;
        let session_id = client.session_id().await?;
        info!(session = ?session_id, "WebDriver session created");

        Ok(Self {
            client,
            session_id,
            elements: HashMap::new(),
            next_element: 0,
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Delete the session (closes the browser)
    pub async fn close(self) -> DriverResult<()> {
        self.client.close().await?;
        info!("WebDriver session closed");
        Ok(())
    }

    fn element(&self, handle: &ElementHandle) -> DriverResult<&Element> {
        self.elements
            .get(handle.id())
            .ok_or_else(|| DriverError::StaleElement(handle.to_string()))
    }

    fn register(&mut self, element: Element) -> ElementHandle {
        self.next_element += 1;
        let id = format!("el-{}", self.next_element);
        self.elements.insert(id.clone(), element);
        ElementHandle::new(id)
    }
}

#[async_trait]
impl BrowserDriver for WebDriverClient {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        // Handles never outlive the page they were found on
        self.elements.clear();
        self.client.goto(url).await.map_err(|e| match DriverError::from(e) {
            DriverError::WebDriver { message, .. } => DriverError::Navigation(message),
            other => other,
        })
    }

    async fn document_ready(&mut self) -> DriverResult<bool> {
        let state = self
            .client
            .execute("return document.readyState", vec![])
            .await?;
        Ok(state.as_str() == Some("complete"))
    }

    async fn locate(&mut self, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        let found = self.client.find_all(Locator::Css(selector)).await?;
        debug!(selector, count = found.len(), "located elements");
        Ok(found.into_iter().map(|el| self.register(el)).collect())
    }

    async fn clear(&mut self, element: &ElementHandle) -> DriverResult<()> {
        self.element(element)?.clear().await?;
        Ok(())
    }

    async fn type_into(&mut self, element: &ElementHandle, text: &str) -> DriverResult<()> {
        self.element(element)?.send_keys(text).await?;
        Ok(())
    }

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()> {
        self.element(element)?.click().await?;
        Ok(())
    }

    async fn get_property(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> DriverResult<Option<String>> {
        Ok(self.element(element)?.prop(name).await?)
    }

    async fn wait_for_dialog(&mut self, timeout: Duration) -> DriverResult<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.client.get_alert_text().await.map_err(DriverError::from) {
                Ok(text) => return Ok(Some(text)),
                Err(DriverError::NoSuchAlert) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    tokio::time::sleep(DIALOG_POLL_INTERVAL.min(deadline - now)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn accept_dialog(&mut self) -> DriverResult<()> {
        self.client.accept_alert().await?;
        Ok(())
    }

    async fn screenshot(&mut self) -> DriverResult<Vec<u8>> {
        Ok(self.client.screenshot().await?)
    }

    async fn title(&mut self) -> DriverResult<String> {
        Ok(self.client.title().await?)
    }
}
