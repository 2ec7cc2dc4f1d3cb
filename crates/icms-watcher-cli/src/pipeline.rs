//! One observation run for one account: navigate, extract, diff, notify.

use std::any::Any;
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, resume_unwind};

use anyhow::Context;
use chrono::{Local, NaiveTime};
use futures::FutureExt;
use thiserror::Error;
use tracing::{info, warn};

use icms_watcher_browser::{
    BrowserError, Credentials, Driver, Navigator, PortalLayout, Step, WaitStrategy,
};
use icms_watcher_core::{ExtractError, Extractor, ObservationSet, UpdateSet};
use icms_watcher_notify::message::PRODUCT_NAME;
use icms_watcher_notify::{Delivery, Notifier, notify_updates};
use icms_watcher_store::{Baselines, BlobStore, FailureAccountant, FailurePolicy, Verdict};

/// Anything that stops a run from producing an observation.
#[derive(Debug, Error)]
pub enum ObservationError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Everything a run needs to know about its account and the portal.
#[derive(Debug)]
pub struct Settings {
    pub credentials: Credentials,
    pub owner: String,
    pub subscribers: Vec<String>,
    pub steps: Vec<Step>,
    pub layout: PortalLayout,
    pub wait: WaitStrategy,
    pub extractor: Extractor,
    pub policy: FailurePolicy,
}

impl Settings {
    fn account(&self) -> &str {
        &self.credentials.username
    }
}

#[derive(Debug)]
pub enum Outcome {
    Updated { updates: UpdateSet, delivery: Delivery },
    Unchanged,
    Failed { verdict: Verdict },
}

/// Local wall-clock time, read when a failure is accounted.
pub type Clock<'a> = Box<dyn Fn() -> NaiveTime + Send + Sync + 'a>;

pub struct Pipeline<'a, S: ?Sized, N: ?Sized> {
    store: &'a S,
    notifier: &'a N,
    settings: &'a Settings,
    clock: Clock<'a>,
}

impl<'a, S, N> Pipeline<'a, S, N>
where
    S: BlobStore + ?Sized,
    N: Notifier + ?Sized,
{
    pub fn new(store: &'a S, notifier: &'a N, settings: &'a Settings) -> Self {
        Self {
            store,
            notifier,
            settings,
            clock: Box::new(|| Local::now().time()),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> NaiveTime + Send + Sync + 'a) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Run once against an open session. The session is closed on every
    /// exit path, a panic included.
    ///
    /// Navigation and extraction failures are counted, not returned; the only
    /// error is a baseline that could not be persisted. A panic is counted
    /// as a failure and then resumed.
    pub async fn run<D: Driver>(&self, driver: &D) -> anyhow::Result<Outcome> {
        let observed = AssertUnwindSafe(self.observe(driver)).catch_unwind().await;
        if let Err(e) = driver.close().await {
            warn!(error = %e, "failed to close browser session");
        }

        match observed {
            Ok(Ok(current)) => self.succeed(&current).await,
            Ok(Err(e)) => Ok(self.fail(&e).await),
            Err(panic) => {
                let message = format!("browser session panicked: {}", panic_message(&*panic));
                self.fail(&message).await;
                resume_unwind(panic)
            }
        }
    }

    async fn observe<D: Driver>(&self, driver: &D) -> Result<ObservationSet, ObservationError> {
        let settings = self.settings;
        let navigator = Navigator::new(driver, &settings.layout, settings.wait);
        navigator.run(&settings.steps, &settings.credentials).await?;
        let rows = navigator.read_grade_table().await?;
        Ok(settings.extractor.extract(&rows)?)
    }

    async fn succeed(&self, current: &ObservationSet) -> anyhow::Result<Outcome> {
        let account = self.settings.account();
        self.accountant().on_success(account).await;

        let updates = Baselines::new(self.store)
            .reconcile(account, current)
            .await
            .with_context(|| format!("persisting baseline for {account}"))?;
        if updates.is_empty() {
            return Ok(Outcome::Unchanged);
        }

        for record in updates.values() {
            info!(
                account,
                name = %record.name,
                mark = %record.mark,
                kind = %record.kind,
                status = %record.status,
                "update"
            );
        }

        let delivery = notify_updates(
            self.notifier,
            PRODUCT_NAME,
            &self.settings.owner,
            &self.settings.subscribers,
            &updates,
        )
        .await;
        Ok(Outcome::Updated { updates, delivery })
    }

    /// Count a failed run at the current clock time and, past the grace
    /// period, send its message to the owner.
    pub async fn fail(&self, error: &(dyn Display + Sync)) -> Outcome {
        let account = self.settings.account();
        let now = (self.clock)();
        let verdict = self.accountant().on_failure(account, error, now).await;
        if verdict == Verdict::Escalate {
            warn!(account, error = %error, "alerting owner");
            if let Err(e) = self.notifier.send(&error.to_string(), &self.settings.owner).await {
                warn!(account, error = %e, "failure alert could not be sent");
            }
        }
        Outcome::Failed { verdict }
    }

    fn accountant(&self) -> FailureAccountant<'a, S> {
        FailureAccountant::new(self.store, self.settings.policy.clone())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
