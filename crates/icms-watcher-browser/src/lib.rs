//! Browser layer: driver abstraction, bounded waits, locator fallback, portal navigation.

use std::time::Duration;

use thiserror::Error;

pub mod driver;
pub mod locate;
pub mod navigator;
pub mod wait;

#[cfg(feature = "webdriver")]
pub mod webdriver;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use driver::{Driver, Element, Locator};
pub use locate::CandidateList;
pub use navigator::{Credentials, Navigator, PortalLayout, Step};
pub use wait::{LoginSignal, Readiness, WaitStrategy};
#[cfg(feature = "webdriver")]
pub use webdriver::WebDriverSession;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("could not locate element with any of the names {candidates:?}")]
    TargetNotFound { candidates: Vec<String> },

    #[error("timed out after {:.1}s waiting for {probe}", .after.as_secs_f32())]
    Timeout { probe: String, after: Duration },

    #[error("browser error: {0}")]
    Driver(String),

    #[cfg(feature = "webdriver")]
    #[error("could not start webdriver session: {0}")]
    Session(#[from] fantoccini::error::NewSessionError),

    #[cfg(feature = "webdriver")]
    #[error("webdriver command failed: {0}")]
    Command(#[from] fantoccini::error::CmdError),
}
