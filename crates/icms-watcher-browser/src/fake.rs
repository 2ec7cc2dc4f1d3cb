//! In-memory driver for exercising navigation without a browser.
//!
//! The page is a static map from [`Locator`] to nodes. Interactions are
//! recorded as strings (`"click login"`, `"keys username s1234"`, ...) so
//! tests can assert on the exact sequence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::{BrowserError, Driver, Element, Locator, PortalLayout};

#[derive(Debug, Clone)]
pub struct FakeNode {
    label: String,
    text: String,
    displayed: bool,
    enabled: bool,
    navigates_to: Option<String>,
    children: HashMap<Locator, Vec<FakeNode>>,
}

impl FakeNode {
    /// A visible, enabled node whose text is its label.
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            text: label.clone(),
            label,
            displayed: true,
            enabled: true,
            navigates_to: None,
            children: HashMap::new(),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Clicking this node moves the session to `url`.
    pub fn navigates_to(mut self, url: impl Into<String>) -> Self {
        self.navigates_to = Some(url.into());
        self
    }

    pub fn child(mut self, locator: Locator, node: FakeNode) -> Self {
        self.children.entry(locator).or_default().push(node);
        self
    }

    /// A `<tr>` with one `<td>` per cell, as found by `XPath("td")`.
    pub fn table_row(cells: &[&str]) -> Self {
        let td = Locator::xpath("td");
        cells.iter().fold(FakeNode::new("tr"), |row, cell| {
            row.child(td.clone(), FakeNode::new("td").text(*cell))
        })
    }
}

#[derive(Debug, Default)]
struct FakeState {
    url: String,
    page_loaded: bool,
    closed: bool,
    nav_error: Option<String>,
    elements: HashMap<Locator, Vec<FakeNode>>,
    failures: HashMap<Locator, String>,
    /// Remaining lookups that report nothing before the element appears.
    pending: HashMap<Locator, usize>,
    events: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDriver {
    pub fn new() -> Self {
        let state = FakeState {
            url: "about:blank".into(),
            page_loaded: true,
            ..FakeState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn at_url(self, url: impl Into<String>) -> Self {
        self.lock().url = url.into();
        self
    }

    pub fn with_element(self, locator: Locator, node: FakeNode) -> Self {
        self.lock().elements.entry(locator).or_default().push(node);
        self
    }

    /// Hide `locator` from the first `lookups` finds.
    pub fn appear_after(self, locator: Locator, lookups: usize) -> Self {
        self.lock().pending.insert(locator, lookups);
        self
    }

    /// Make every lookup of `locator` fail with a driver error.
    pub fn fail_on(self, locator: Locator, message: impl Into<String>) -> Self {
        self.lock().failures.insert(locator, message.into());
        self
    }

    /// Make every navigation fail, as when the site refuses connections.
    pub fn unreachable(self, message: impl Into<String>) -> Self {
        self.lock().nav_error = Some(message.into());
        self
    }

    /// A portal laid out as `layout` where every navigation target is
    /// present and the grade table holds `rows`, header and footer included.
    ///
    /// The account has two roles, so role pinning has something to choose.
    pub fn portal(layout: &PortalLayout, program: &str, rows: &[&[&str]]) -> Self {
        let table = rows.iter().fold(FakeNode::new("tbody"), |body, cells| {
            body.child(layout.row.clone(), FakeNode::table_row(cells))
        });
        Self::new()
            .with_element(
                layout.login_button.clone(),
                FakeNode::new("login").navigates_to(format!("{}#home", layout.start_url)),
            )
            .with_element(layout.username_field.clone(), FakeNode::new("username"))
            .with_element(layout.password_field.clone(), FakeNode::new("password"))
            .with_element(layout.role_selector.clone(), FakeNode::new("roles"))
            .with_element(
                layout.role_options.clone(),
                FakeNode::new("employee").text("Mitarbeiter/-in"),
            )
            .with_element(
                layout.role_options.clone(),
                FakeNode::new("student").text("  Student/-in\n   Hochschule Hannover "),
            )
            .with_element(layout.frame_marker.clone(), FakeNode::new("iframe"))
            .with_element(Locator::partial_link_text("Prüfungen"), FakeNode::new("exams"))
            .with_element(
                Locator::partial_link_text("Notenspiegel"),
                FakeNode::new("grades"),
            )
            .with_element(layout.show_icon(program), FakeNode::new("show"))
            .with_element(layout.grade_table.clone(), table)
    }

    pub fn set_page_loaded(&self, loaded: bool) {
        self.lock().page_loaded = loaded;
    }

    pub fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lookup(&self, locator: &Locator) -> Result<Vec<FakeElement>, BrowserError> {
        let mut state = self.lock();
        if state.closed {
            return Err(BrowserError::Driver("session closed".into()));
        }
        if let Some(msg) = state.failures.get(locator) {
            return Err(BrowserError::Driver(msg.clone()));
        }
        if let Some(remaining) = state.pending.get_mut(locator)
            && *remaining > 0
        {
            *remaining -= 1;
            return Ok(Vec::new());
        }
        let nodes = state.elements.get(locator).cloned().unwrap_or_default();
        drop(state);
        Ok(nodes
            .into_iter()
            .map(|node| FakeElement {
                node,
                driver: self.clone(),
            })
            .collect())
    }

    fn record(&self, event: String) {
        self.lock().events.push(event);
    }
}

#[async_trait]
impl Driver for FakeDriver {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.lock();
        state.events.push(format!("navigate {url}"));
        if let Some(msg) = &state.nav_error {
            return Err(BrowserError::Driver(msg.clone()));
        }
        state.url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.lock().url.clone())
    }

    async fn find(&self, locator: &Locator) -> Result<Option<FakeElement>, BrowserError> {
        Ok(self.lookup(locator)?.into_iter().next())
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<FakeElement>, BrowserError> {
        self.lookup(locator)
    }

    async fn is_page_loaded(&self) -> Result<bool, BrowserError> {
        Ok(self.lock().page_loaded)
    }

    async fn switch_frame(&self, name: &str) -> Result<(), BrowserError> {
        self.record(format!("frame {name}"));
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut state = self.lock();
        state.events.push("close".into());
        state.closed = true;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    node: FakeNode,
    driver: FakeDriver,
}

impl FakeElement {
    pub fn label(&self) -> &str {
        &self.node.label
    }
}

#[async_trait]
impl Element for FakeElement {
    async fn text(&self) -> Result<String, BrowserError> {
        Ok(self.node.text.clone())
    }

    async fn click(&self) -> Result<(), BrowserError> {
        let mut state = self.driver.lock();
        state.events.push(format!("click {}", self.node.label));
        if let Some(url) = &self.node.navigates_to {
            state.url = url.clone();
        }
        Ok(())
    }

    async fn send_keys(&self, keys: &str) -> Result<(), BrowserError> {
        self.driver
            .record(format!("keys {} {keys}", self.node.label));
        Ok(())
    }

    async fn clear(&self) -> Result<(), BrowserError> {
        self.driver.record(format!("clear {}", self.node.label));
        Ok(())
    }

    async fn is_displayed(&self) -> Result<bool, BrowserError> {
        Ok(self.node.displayed)
    }

    async fn is_enabled(&self) -> Result<bool, BrowserError> {
        Ok(self.node.enabled)
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<FakeElement>, BrowserError> {
        Ok(self
            .node
            .children
            .get(locator)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|node| FakeElement {
                node,
                driver: self.driver.clone(),
            })
            .collect())
    }
}
