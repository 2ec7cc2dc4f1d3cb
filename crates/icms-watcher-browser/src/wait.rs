//! Bounded polling waits.
//!
//! Every wait polls the driver at `poll_interval` and gives up after its
//! timeout; nothing here blocks without a bound.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::{BrowserError, Driver, Element, Locator};

/// Which state an element must reach before a wait succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Present,
    Visible,
    Clickable,
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Present => "present",
            Self::Visible => "visible",
            Self::Clickable => "clickable",
        })
    }
}

/// Which signal ended the post-login wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginSignal {
    UrlChanged,
    FormHidden,
    PageSettled,
}

#[derive(Debug, Clone, Copy)]
pub struct WaitStrategy {
    /// Bound for element waits and for the page-settled wait that follows.
    pub timeout: Duration,
    /// Bound for each of the first two post-login strategies.
    pub login_step_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            login_step_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl WaitStrategy {
    /// Call `check` until it yields a value or `timeout` elapses.
    ///
    /// `check` is always called at least once. Errors from `check` end the
    /// wait immediately.
    pub async fn poll<T, F, Fut>(
        &self,
        probe: &str,
        timeout: Duration,
        mut check: F,
    ) -> Result<T, BrowserError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, BrowserError>>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(value) = check().await? {
                return Ok(value);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(BrowserError::Timeout {
                    probe: probe.to_string(),
                    after: timeout,
                });
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Wait for the element at `locator` to reach `mode`, then for the page
    /// to settle.
    ///
    /// The settle wait is best effort: if the page never reports itself
    /// loaded the element is returned anyway.
    pub async fn await_condition<D: Driver>(
        &self,
        driver: &D,
        locator: &Locator,
        mode: Readiness,
    ) -> Result<D::Element, BrowserError> {
        info!(%locator, %mode, "waiting for element");
        let probe = format!("{locator} to be {mode}");
        let element = self
            .poll(&probe, self.timeout, move || async move {
                let found = match driver.find(locator).await? {
                    Some(el) => is_ready(&el, mode).await.then_some(el),
                    None => None,
                };
                Ok::<_, BrowserError>(found)
            })
            .await?;
        self.settle(driver).await;
        Ok(element)
    }

    /// Wait until the page reports itself loaded. Returns whether it did.
    pub async fn settle<D: Driver>(&self, driver: &D) -> bool {
        let settled = self
            .poll("page to finish loading", self.timeout, move || async move {
                Ok::<_, BrowserError>(driver.is_page_loaded().await?.then_some(()))
            })
            .await;
        match settled {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "page did not settle, continuing");
                false
            }
        }
    }

    /// Wait for a submitted login to take effect.
    ///
    /// Tries, in order: the URL moving away from `url_before`, the login
    /// control at `login_form` disappearing, the page settling. Never fails:
    /// if no signal arrives navigation carries on and the next element wait
    /// decides.
    pub async fn await_login<D: Driver>(
        &self,
        driver: &D,
        url_before: &str,
        login_form: &Locator,
    ) -> Option<LoginSignal> {
        info!("waiting for page to load after login");

        let url_changed = self
            .poll("url to change after login", self.login_step_timeout, move || async move {
                Ok::<_, BrowserError>((driver.current_url().await? != url_before).then_some(()))
            })
            .await;
        match url_changed {
            Ok(()) => return Some(LoginSignal::UrlChanged),
            Err(e) => debug!(error = %e, "login did not change the url"),
        }

        let form_hidden = self
            .poll("login form to disappear", self.login_step_timeout, move || async move {
                let hidden = match driver.find(login_form).await? {
                    None => true,
                    Some(el) => !el.is_displayed().await.unwrap_or(false),
                };
                Ok::<_, BrowserError>(hidden.then_some(()))
            })
            .await;
        match form_hidden {
            Ok(()) => return Some(LoginSignal::FormHidden),
            Err(e) => debug!(error = %e, "login form still visible"),
        }

        if self.settle(driver).await {
            Some(LoginSignal::PageSettled)
        } else {
            info!("no login completion signal, continuing anyway");
            None
        }
    }
}

/// Probe failures (e.g. a stale element) count as not ready yet.
async fn is_ready<E: Element>(el: &E, mode: Readiness) -> bool {
    match mode {
        Readiness::Present => true,
        Readiness::Visible => el.is_displayed().await.unwrap_or(false),
        Readiness::Clickable => {
            el.is_displayed().await.unwrap_or(false) && el.is_enabled().await.unwrap_or(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeDriver, FakeNode};

    fn quick() -> WaitStrategy {
        WaitStrategy {
            timeout: Duration::from_millis(60),
            login_step_timeout: Duration::from_millis(30),
            poll_interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn present_element_found_immediately() {
        let login = Locator::id("login");
        let driver = FakeDriver::new().with_element(login.clone(), FakeNode::new("login"));
        let el = quick()
            .await_condition(&driver, &login, Readiness::Present)
            .await
            .unwrap();
        assert_eq!(el.label(), "login");
    }

    #[tokio::test]
    async fn waits_for_late_element() {
        let table = Locator::tag("table");
        let driver = FakeDriver::new()
            .with_element(table.clone(), FakeNode::new("table"))
            .appear_after(table.clone(), 3);
        assert!(
            quick()
                .await_condition(&driver, &table, Readiness::Visible)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn hidden_element_is_present_but_not_visible() {
        let menu = Locator::id("menu");
        let driver = FakeDriver::new().with_element(menu.clone(), FakeNode::new("menu").hidden());
        let wait = quick();

        assert!(wait.await_condition(&driver, &menu, Readiness::Present).await.is_ok());
        let err = wait
            .await_condition(&driver, &menu, Readiness::Visible)
            .await
            .unwrap_err();
        match err {
            BrowserError::Timeout { probe, after } => {
                assert_eq!(probe, "id=menu to be visible");
                assert_eq!(after, Duration::from_millis(60));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn disabled_element_is_not_clickable() {
        let button = Locator::id("submit");
        let driver =
            FakeDriver::new().with_element(button.clone(), FakeNode::new("submit").disabled());
        let result = quick()
            .await_condition(&driver, &button, Readiness::Clickable)
            .await;
        assert!(matches!(result, Err(BrowserError::Timeout { .. })));
    }

    #[tokio::test]
    async fn unsettled_page_does_not_fail_element_wait() {
        let login = Locator::id("login");
        let driver = FakeDriver::new().with_element(login.clone(), FakeNode::new("login"));
        driver.set_page_loaded(false);
        let wait = quick();

        assert!(!wait.settle(&driver).await);
        assert!(
            wait.await_condition(&driver, &login, Readiness::Clickable)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn driver_errors_abort_the_wait() {
        let login = Locator::id("login");
        let driver = FakeDriver::new().fail_on(login.clone(), "session deleted");
        let result = quick()
            .await_condition(&driver, &login, Readiness::Present)
            .await;
        assert!(matches!(result, Err(BrowserError::Driver(msg)) if msg == "session deleted"));
    }

    #[tokio::test]
    async fn login_prefers_url_change() {
        let form = Locator::id("login");
        let driver = FakeDriver::new().at_url("https://portal/start");
        driver.navigate("https://portal/home").await.unwrap();

        let signal = quick()
            .await_login(&driver, "https://portal/start", &form)
            .await;
        assert_eq!(signal, Some(LoginSignal::UrlChanged));
    }

    #[tokio::test]
    async fn login_falls_back_to_hidden_form() {
        let form = Locator::id("login");
        let driver = FakeDriver::new()
            .at_url("https://portal/start")
            .with_element(form.clone(), FakeNode::new("login").hidden());

        let signal = quick()
            .await_login(&driver, "https://portal/start", &form)
            .await;
        assert_eq!(signal, Some(LoginSignal::FormHidden));
    }

    #[tokio::test]
    async fn login_falls_back_to_page_settled() {
        let form = Locator::id("login");
        let driver = FakeDriver::new()
            .at_url("https://portal/start")
            .with_element(form.clone(), FakeNode::new("login"));

        let signal = quick()
            .await_login(&driver, "https://portal/start", &form)
            .await;
        assert_eq!(signal, Some(LoginSignal::PageSettled));
    }

    #[tokio::test]
    async fn login_wait_never_fails() {
        let form = Locator::id("login");
        let driver = FakeDriver::new()
            .at_url("https://portal/start")
            .with_element(form.clone(), FakeNode::new("login"));
        driver.set_page_loaded(false);

        let signal = quick()
            .await_login(&driver, "https://portal/start", &form)
            .await;
        assert_eq!(signal, None);
    }
}
