use std::fmt;

use async_trait::async_trait;

use crate::BrowserError;

/// How to find an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Id(String),
    XPath(String),
    Css(String),
    LinkText(String),
    PartialLinkText(String),
    Tag(String),
}

impl Locator {
    pub fn id(s: impl Into<String>) -> Self {
        Self::Id(s.into())
    }

    pub fn xpath(s: impl Into<String>) -> Self {
        Self::XPath(s.into())
    }

    pub fn css(s: impl Into<String>) -> Self {
        Self::Css(s.into())
    }

    pub fn link_text(s: impl Into<String>) -> Self {
        Self::LinkText(s.into())
    }

    pub fn partial_link_text(s: impl Into<String>) -> Self {
        Self::PartialLinkText(s.into())
    }

    pub fn tag(s: impl Into<String>) -> Self {
        Self::Tag(s.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(s) => write!(f, "id={s}"),
            Self::XPath(s) => write!(f, "xpath={s}"),
            Self::Css(s) => write!(f, "css={s}"),
            Self::LinkText(s) => write!(f, "link text={s}"),
            Self::PartialLinkText(s) => write!(f, "partial link text={s}"),
            Self::Tag(s) => write!(f, "tag={s}"),
        }
    }
}

/// One browser session.
///
/// `find` returns `Ok(None)` when nothing matches; errors are reserved for
/// the session itself misbehaving.
#[async_trait]
pub trait Driver: Send + Sync {
    type Element: Element;

    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;
    async fn current_url(&self) -> Result<String, BrowserError>;
    async fn find(&self, locator: &Locator) -> Result<Option<Self::Element>, BrowserError>;
    async fn find_all(&self, locator: &Locator) -> Result<Vec<Self::Element>, BrowserError>;
    /// Whether the document reports itself fully loaded.
    async fn is_page_loaded(&self) -> Result<bool, BrowserError>;
    /// Make the named sub-frame the context for subsequent lookups.
    async fn switch_frame(&self, name: &str) -> Result<(), BrowserError>;
    async fn close(&self) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait Element: Send + Sync + Sized {
    async fn text(&self) -> Result<String, BrowserError>;
    async fn click(&self) -> Result<(), BrowserError>;
    async fn send_keys(&self, keys: &str) -> Result<(), BrowserError>;
    async fn clear(&self) -> Result<(), BrowserError>;
    async fn is_displayed(&self) -> Result<bool, BrowserError>;
    async fn is_enabled(&self) -> Result<bool, BrowserError>;
    /// Descendants of this element matching `locator`.
    async fn find_all(&self, locator: &Locator) -> Result<Vec<Self>, BrowserError>;
}
