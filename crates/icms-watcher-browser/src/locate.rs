//! Ordered fallback search over alternative names for one UI target.

use crate::{BrowserError, Driver, Element, Locator};

/// Alternative names for one logical target, in the order they are tried.
///
/// Each label contributes itself and then its lowercase form; repeats are
/// dropped but the first occurrence keeps its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateList {
    names: Vec<String>,
}

impl CandidateList {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = Vec::new();
        for label in labels {
            let label = label.as_ref();
            for name in [label.to_string(), label.to_lowercase()] {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn target_not_found(&self) -> BrowserError {
        BrowserError::TargetNotFound {
            candidates: self.names.clone(),
        }
    }
}

/// Try each candidate once, in order, and return the first displayed match
/// together with the name that found it.
pub async fn find_first<'c, D: Driver>(
    driver: &D,
    candidates: &'c CandidateList,
    to_locator: impl Fn(&str) -> Locator,
) -> Result<Option<(D::Element, &'c str)>, BrowserError> {
    for name in candidates.names() {
        if let Some(el) = driver.find(&to_locator(name)).await?
            && el.is_displayed().await.unwrap_or(false)
        {
            return Ok(Some((el, name.as_str())));
        }
    }
    Ok(None)
}

/// Collapse runs of whitespace to single spaces and trim the ends.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
