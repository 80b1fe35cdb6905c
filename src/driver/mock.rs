//! In-memory browser for tests and benchmarks.
//!
//! `MockBrowser` models just enough of a page to exercise the runner:
//! - pages registered by URL (or by file name, matched as a URL suffix)
//! - elements registered under the exact selector string that finds them
//! - `required` fields that make `... :invalid` queries and submits behave like HTML5 validation
//! - alerts raised on click or on submit
//! - elements that refuse a number of clicks before accepting one
//! - PNG screenshots rendered with the `image` crate

use async_trait::async_trait;
use image::{ImageBuffer, Rgb, RgbImage};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::time::Duration;

use super::{BrowserDriver, DriverError, DriverResult, ElementHandle};

/// Default mock viewport (pixels)
const DEFAULT_VIEWPORT: (u32, u32) = (320, 240);

/// A fake DOM element
#[derive(Debug, Clone, Default)]
pub struct MockElement {
    properties: HashMap<String, String>,
    required: bool,
    submit: bool,
    reset: bool,
    alert_on_click: Option<String>,
    unclickable_for: u32,
}

impl MockElement {
    /// Create an element with the given tag and an empty value
    pub fn new(tag: &str) -> Self {
        let mut properties = HashMap::new();
        properties.insert("tagName".to_string(), tag.to_uppercase());
        properties.insert("value".to_string(), String::new());
        Self {
            properties,
            ..Default::default()
        }
    }

    /// An `<input name=...>`
    pub fn input(name: &str) -> Self {
        Self::new("input").property("name", name)
    }

    /// A submit button
    pub fn submit_button() -> Self {
        let mut el = Self::new("input").property("type", "submit");
        el.submit = true;
        el
    }

    /// A reset button: clicking it empties every other field on the page
    pub fn reset_button() -> Self {
        let mut el = Self::new("input").property("type", "reset");
        el.reset = true;
        el
    }

    pub fn property(mut self, name: &str, value: &str) -> Self {
        self.properties.insert(name.to_string(), value.to_string());
        self
    }

    pub fn value(self, value: &str) -> Self {
        self.property("value", value)
    }

    /// Mark as `required`: invalid while its value is empty
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Raise a native alert when clicked
    pub fn alert_on_click(mut self, message: &str) -> Self {
        self.alert_on_click = Some(message.to_string());
        self
    }

    /// Reject the next `count` clicks as not interactable
    pub fn unclickable_for(mut self, count: u32) -> Self {
        self.unclickable_for = count;
        self
    }

    fn is_button(&self) -> bool {
        self.submit
            || self.reset
            || matches!(
                self.properties.get("type").map(String::as_str),
                Some("button" | "submit" | "reset")
            )
            || self.properties.get("tagName").map(String::as_str) == Some("BUTTON")
    }

    fn is_invalid(&self) -> bool {
        self.required
            && self
                .properties
                .get("value")
                .map(|v| v.is_empty())
                .unwrap_or(true)
    }
}

/// A fake page template; each navigation loads a fresh copy
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    title: String,
    elements: Vec<(String, MockElement)>,
    submit_alert: Option<String>,
    validation_alert: Option<String>,
    ready_after: Option<u32>,
}

impl MockPage {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ready_after: Some(0),
            ..Default::default()
        }
    }

    /// Register an element under the selector that locates it; repeat a
    /// selector to make it match several elements
    pub fn element(mut self, selector: &str, element: MockElement) -> Self {
        self.elements.push((selector.to_string(), element));
        self
    }

    /// Alert raised when a valid form is submitted
    pub fn submit_alert(mut self, message: &str) -> Self {
        self.submit_alert = Some(message.to_string());
        self
    }

    /// Alert raised by page script when an invalid form is submitted;
    /// without one, invalid submits are blocked silently (HTML5 validation)
    pub fn validation_alert(mut self, message: &str) -> Self {
        self.validation_alert = Some(message.to_string());
        self
    }

    /// Report `document_ready() == false` for the first `polls` checks
    pub fn ready_after(mut self, polls: u32) -> Self {
        self.ready_after = Some(polls);
        self
    }

    /// Never finish loading
    pub fn never_ready(mut self) -> Self {
        self.ready_after = None;
        self
    }
}

#[derive(Debug)]
struct LoadedPage {
    title: String,
    elements: Vec<(String, ElementHandle, MockElement)>,
    submit_alert: Option<String>,
    validation_alert: Option<String>,
    polls_remaining: Option<u32>,
}

/// In-memory [`BrowserDriver`]
#[derive(Debug)]
pub struct MockBrowser {
    pages: Vec<(String, MockPage)>,
    current: Option<LoadedPage>,
    dialog: Option<String>,
    accepted_dialogs: Vec<String>,
    navigations: Vec<String>,
    click_attempts: HashMap<String, u32>,
    hang_selectors: HashSet<String>,
    viewport: (u32, u32),
    screenshots: ScreenshotMode,
    next_id: u64,
}

/// What `screenshot()` returns
#[derive(Debug, Clone)]
enum ScreenshotMode {
    Render,
    Bytes(Vec<u8>),
    Fail,
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBrowser {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: None,
            dialog: None,
            accepted_dialogs: Vec::new(),
            navigations: Vec::new(),
            click_attempts: HashMap::new(),
            hang_selectors: HashSet::new(),
            viewport: DEFAULT_VIEWPORT,
            screenshots: ScreenshotMode::Render,
            next_id: 0,
        }
    }

    /// Register a page under a URL or a file name
    pub fn page(mut self, key: &str, page: MockPage) -> Self {
        self.pages.push((key.to_string(), page));
        self
    }

    /// Make `locate(selector)` never complete
    pub fn hang_on(mut self, selector: &str) -> Self {
        self.hang_selectors.insert(selector.to_string());
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    /// Return these bytes from every screenshot instead of a rendered PNG
    pub fn screenshot_bytes(mut self, bytes: &[u8]) -> Self {
        self.screenshots = ScreenshotMode::Bytes(bytes.to_vec());
        self
    }

    /// Make every screenshot fail
    pub fn failing_screenshots(mut self) -> Self {
        self.screenshots = ScreenshotMode::Fail;
        self
    }

    /// URLs passed to `navigate`, in order
    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    /// Messages of dialogs accepted so far
    pub fn accepted_dialogs(&self) -> &[String] {
        &self.accepted_dialogs
    }

    /// Number of click attempts on elements registered under `selector`
    pub fn click_attempts(&self, selector: &str) -> u32 {
        self.click_attempts.get(selector).copied().unwrap_or(0)
    }

    fn find_page(&self, url: &str) -> Option<&MockPage> {
        let url = url.split(['?', '#']).next().unwrap_or(url);
        self.pages
            .iter()
            .find(|(key, _)| key == url)
            .or_else(|| {
                self.pages
                    .iter()
                    .find(|(key, _)| url.ends_with(&format!("/{}", key)))
            })
            .map(|(_, page)| page)
    }

    fn loaded(&mut self) -> DriverResult<&mut LoadedPage> {
        self.current
            .as_mut()
            .ok_or_else(|| DriverError::Protocol("no page loaded".into()))
    }

    fn element_index(page: &LoadedPage, handle: &ElementHandle) -> DriverResult<usize> {
        page.elements
            .iter()
            .position(|(_, id, _)| id == handle)
            .ok_or_else(|| DriverError::StaleElement(handle.to_string()))
    }

    fn render(&self) -> DriverResult<Vec<u8>> {
        let (width, height) = self.viewport;
        let mut img: RgbImage = ImageBuffer::from_pixel(width, height, Rgb([244, 246, 248]));

        // Header band, then one bar per element so different pages differ visibly
        let rows = self
            .current
            .as_ref()
            .map(|page| page.elements.len() as u32)
            .unwrap_or(0);
        for y in 0..height.min(24) {
            for x in 0..width {
                img.put_pixel(x, y, Rgb([43, 138, 239]));
            }
        }
        for row in 0..rows {
            let top = 32 + row * 12;
            for y in top..(top + 8).min(height) {
                for x in 8..(width / 2).min(width) {
                    img.put_pixel(x, y, Rgb([200, 200, 200]));
                }
            }
        }

        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| DriverError::Protocol(format!("Failed to encode PNG: {}", e)))?;
        Ok(bytes)
    }
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.navigations.push(url.to_string());
        let template = self
            .find_page(url)
            .cloned()
            .ok_or_else(|| DriverError::Navigation(format!("net::ERR_FILE_NOT_FOUND ({})", url)))?;

        let mut elements = Vec::with_capacity(template.elements.len());
        for (selector, element) in template.elements {
            self.next_id += 1;
            elements.push((selector, ElementHandle::new(format!("mock-{}", self.next_id)), element));
        }
        self.current = Some(LoadedPage {
            title: template.title,
            elements,
            submit_alert: template.submit_alert,
            validation_alert: template.validation_alert,
            polls_remaining: template.ready_after,
        });
        self.dialog = None;
        Ok(())
    }

    async fn document_ready(&mut self) -> DriverResult<bool> {
        let page = self.loaded()?;
        match page.polls_remaining.as_mut() {
            None => Ok(false),
            Some(0) => Ok(true),
            Some(n) => {
                *n -= 1;
                Ok(false)
            }
        }
    }

    async fn locate(&mut self, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        if self.hang_selectors.contains(selector) {
            return std::future::pending().await;
        }
        let page = self.loaded()?;
        let invalid_query = selector.trim_end().ends_with(":invalid");
        Ok(page
            .elements
            .iter()
            .filter(|(sel, _, el)| if invalid_query { el.is_invalid() } else { sel == selector })
            .map(|(_, id, _)| id.clone())
            .collect())
    }

    async fn clear(&mut self, element: &ElementHandle) -> DriverResult<()> {
        let page = self.loaded()?;
        let idx = Self::element_index(page, element)?;
        page.elements[idx]
            .2
            .properties
            .insert("value".to_string(), String::new());
        Ok(())
    }

    async fn type_into(&mut self, element: &ElementHandle, text: &str) -> DriverResult<()> {
        let page = self.loaded()?;
        let idx = Self::element_index(page, element)?;
        page.elements[idx]
            .2
            .properties
            .entry("value".to_string())
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()> {
        let page = self.current.as_mut().ok_or_else(|| DriverError::Protocol("no page loaded".into()))?;
        let idx = Self::element_index(page, element)?;
        let selector = page.elements[idx].0.clone();
        *self.click_attempts.entry(selector).or_default() += 1;

        let el = &mut page.elements[idx].2;
        if el.unclickable_for > 0 {
            el.unclickable_for -= 1;
            return Err(DriverError::NotInteractable(
                "element is obscured by another element".into(),
            ));
        }

        let kind = el.properties.get("type").cloned().unwrap_or_default();
        if kind == "checkbox" || kind == "radio" {
            el.properties.insert("checked".to_string(), "true".to_string());
        }

        if el.reset {
            for (_, _, field) in page.elements.iter_mut().filter(|(_, _, e)| !e.is_button()) {
                field.properties.insert("value".to_string(), String::new());
            }
            return Ok(());
        }

        let dialog = if let Some(message) = el.alert_on_click.clone() {
            Some(message)
        } else if el.submit {
            if page.elements.iter().any(|(_, _, e)| e.is_invalid()) {
                page.validation_alert.clone()
            } else {
                page.submit_alert.clone()
            }
        } else {
            None
        };
        if dialog.is_some() {
            self.dialog = dialog;
        }
        Ok(())
    }

    async fn get_property(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> DriverResult<Option<String>> {
        let page = self.loaded()?;
        let idx = Self::element_index(page, element)?;
        Ok(page.elements[idx].2.properties.get(name).cloned())
    }

    async fn wait_for_dialog(&mut self, timeout: Duration) -> DriverResult<Option<String>> {
        if let Some(message) = &self.dialog {
            return Ok(Some(message.clone()));
        }
        tokio::time::sleep(timeout).await;
        Ok(self.dialog.clone())
    }

    async fn accept_dialog(&mut self) -> DriverResult<()> {
        let message = self.dialog.take().ok_or(DriverError::NoSuchAlert)?;
        self.accepted_dialogs.push(message);
        Ok(())
    }

    async fn screenshot(&mut self) -> DriverResult<Vec<u8>> {
        match &self.screenshots {
            ScreenshotMode::Render => self.render(),
            ScreenshotMode::Bytes(bytes) => Ok(bytes.clone()),
            ScreenshotMode::Fail => Err(DriverError::Protocol("screenshot unavailable".into())),
        }
    }

    async fn title(&mut self) -> DriverResult<String> {
        Ok(self
            .current
            .as_ref()
            .map(|page| page.title.clone())
            .unwrap_or_default())
    }
}
