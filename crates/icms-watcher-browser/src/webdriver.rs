//! [`Driver`] over a WebDriver (chromedriver) session.

use std::time::Duration;

use async_trait::async_trait;
use fantoccini::elements::Element as WdElement;
use fantoccini::error::CmdError;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator as WdLocator};
use serde_json::json;
use tracing::{debug, info};

use crate::{BrowserError, Driver, Element, Locator};

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Bound on creating the session, including browser startup.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Bound on a single page load inside the session.
const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Chrome arguments for running without a display.
const HEADLESS_ARGS: &[&str] = &[
    "--headless=new",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
];

pub struct WebDriverSession {
    client: Client,
}

impl WebDriverSession {
    /// Open a Chrome session through the WebDriver server at `url`.
    pub async fn connect(url: &str, headless: bool) -> Result<Self, BrowserError> {
        Self::connect_with_timeout(url, headless, CONNECT_TIMEOUT).await
    }

    pub async fn connect_with_timeout(
        url: &str,
        headless: bool,
        timeout: Duration,
    ) -> Result<Self, BrowserError> {
        let args: Vec<&str> = if headless {
            HEADLESS_ARGS.to_vec()
        } else {
            vec!["--no-sandbox"]
        };

        let mut caps = serde_json::Map::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        info!(url, headless, "connecting to webdriver");
        let mut builder = ClientBuilder::rustls()
            .map_err(|e| BrowserError::Driver(format!("TLS setup failed: {e}")))?;
        builder.capabilities(caps);
        let client = tokio::time::timeout(timeout, builder.connect(url))
            .await
            .map_err(|_| BrowserError::Timeout {
                probe: "webdriver session".to_string(),
                after: timeout,
            })??;

        client
            .update_timeouts(TimeoutConfiguration::new(
                None,
                Some(PAGE_LOAD_TIMEOUT),
                Some(Duration::ZERO),
            ))
            .await?;
        Ok(Self { client })
    }
}

/// Our locators mapped onto the strategies WebDriver speaks.
///
/// Partial link text and tag names become XPath and CSS, so the borrowed
/// query string is built up front.
enum Query {
    Id(String),
    Css(String),
    XPath(String),
    LinkText(String),
}

impl Query {
    fn from_locator(locator: &Locator) -> Self {
        match locator {
            Locator::Id(s) => Self::Id(s.clone()),
            Locator::XPath(s) => Self::XPath(s.clone()),
            Locator::Css(s) | Locator::Tag(s) => Self::Css(s.clone()),
            Locator::LinkText(s) => Self::LinkText(s.clone()),
            Locator::PartialLinkText(s) => Self::XPath(format!(
                "//a[contains(normalize-space(.), {})]",
                xpath_literal(s)
            )),
        }
    }

    fn as_wd(&self) -> WdLocator<'_> {
        match self {
            Self::Id(s) => WdLocator::Id(s),
            Self::Css(s) => WdLocator::Css(s),
            Self::XPath(s) => WdLocator::XPath(s),
            Self::LinkText(s) => WdLocator::LinkText(s),
        }
    }
}

/// Quote `s` as an XPath string literal, splitting on `'` when it has both
/// quote kinds.
fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

fn absent(e: CmdError) -> Result<Option<WdElement>, BrowserError> {
    if e.is_no_such_element() {
        Ok(None)
    } else {
        Err(e.into())
    }
}

#[async_trait]
impl Driver for WebDriverSession {
    type Element = WebElement;

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.client.goto(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn find(&self, locator: &Locator) -> Result<Option<WebElement>, BrowserError> {
        let query = Query::from_locator(locator);
        let found = match self.client.find(query.as_wd()).await {
            Ok(el) => Some(el),
            Err(e) => absent(e)?,
        };
        Ok(found.map(WebElement))
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<WebElement>, BrowserError> {
        let query = Query::from_locator(locator);
        let found = self.client.find_all(query.as_wd()).await?;
        Ok(found.into_iter().map(WebElement).collect())
    }

    async fn is_page_loaded(&self) -> Result<bool, BrowserError> {
        let state = self
            .client
            .execute("return document.readyState;", vec![])
            .await?;
        Ok(state.as_str() == Some("complete"))
    }

    async fn switch_frame(&self, name: &str) -> Result<(), BrowserError> {
        let literal = xpath_literal(name);
        let xpath = format!("//iframe[@name={literal} or @id={literal}]");
        let frame = self
            .client
            .find(WdLocator::XPath(&xpath))
            .await
            .map(Some)
            .or_else(absent)?
            .ok_or_else(|| BrowserError::TargetNotFound {
                candidates: vec![name.to_string()],
            })?;
        debug!(name, "entering frame");
        frame.enter_frame().await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        info!("closing webdriver session");
        self.client.clone().close().await?;
        Ok(())
    }
}

pub struct WebElement(WdElement);

#[async_trait]
impl Element for WebElement {
    async fn text(&self) -> Result<String, BrowserError> {
        Ok(self.0.text().await?)
    }

    async fn click(&self) -> Result<(), BrowserError> {
        self.0.click().await?;
        Ok(())
    }

    async fn send_keys(&self, keys: &str) -> Result<(), BrowserError> {
        self.0.send_keys(keys).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), BrowserError> {
        self.0.clear().await?;
        Ok(())
    }

    async fn is_displayed(&self) -> Result<bool, BrowserError> {
        Ok(self.0.is_displayed().await?)
    }

    async fn is_enabled(&self) -> Result<bool, BrowserError> {
        Ok(self.0.is_enabled().await?)
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<WebElement>, BrowserError> {
        let query = Query::from_locator(locator);
        let found = self.0.find_all(query.as_wd()).await?;
        Ok(found.into_iter().map(WebElement).collect())
    }
}
