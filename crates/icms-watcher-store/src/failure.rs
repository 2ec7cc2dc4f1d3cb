//! Consecutive-failure accounting.
//!
//! The owner is alerted once `grace` runs in a row have failed. Failures at
//! the outage marker (the portal's nightly restart) are not counted at all.

use std::fmt::Display;

use chrono::NaiveTime;
use tracing::{info, warn};

use crate::BlobStore;

pub const DEFAULT_GRACE: u32 = 3;

/// Local wall-clock time (`HH:MM`) of the portal's nightly restart.
pub const DEFAULT_OUTAGE_MARKER: &str = "04:00";

/// Storage key of an account's failure counter.
pub fn failure_key(account: &str) -> String {
    format!("failure_{account}")
}

#[derive(Debug, Clone)]
pub struct FailurePolicy {
    /// Consecutive failures needed before alerting (at least 1).
    pub grace: u32,
    /// `HH:MM` at which failures are expected and ignored.
    pub outage_marker: String,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            grace: DEFAULT_GRACE,
            outage_marker: DEFAULT_OUTAGE_MARKER.to_string(),
        }
    }
}

/// What the caller should do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Notify the account owner.
    Escalate,
    /// Stay quiet this run.
    Suppressed,
}

pub struct FailureAccountant<'s, S: ?Sized> {
    store: &'s S,
    policy: FailurePolicy,
}

impl<'s, S: BlobStore + ?Sized> FailureAccountant<'s, S> {
    pub fn new(store: &'s S, policy: FailurePolicy) -> Self {
        Self { store, policy }
    }

    /// Count a failed run for `account` at local time `now`.
    pub async fn on_failure(
        &self,
        account: &str,
        error: &(dyn Display + Sync),
        now: NaiveTime,
    ) -> Verdict {
        if now.format("%H:%M").to_string() == self.policy.outage_marker {
            info!(account, error = %error, "failure during scheduled outage, not counted");
            return Verdict::Suppressed;
        }

        let count = self.load(account).await.saturating_add(1);
        self.save(account, count).await;
        info!(account, count, grace = self.policy.grace, error = %error, "run failed");

        if count >= self.policy.grace {
            self.save(account, 0).await;
            Verdict::Escalate
        } else {
            info!(account, "within grace period, not alerting");
            Verdict::Suppressed
        }
    }

    /// Reset the account's counter after a successful run.
    pub async fn on_success(&self, account: &str) {
        self.save(account, 0).await;
    }

    /// Current counter value; missing or corrupt counters read as zero.
    pub async fn count(&self, account: &str) -> u32 {
        self.load(account).await
    }

    async fn load(&self, account: &str) -> u32 {
        match self.store.load(&failure_key(account)).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(account, error = %e, "failure counter corrupt, starting from zero");
                0
            }),
            Ok(None) => 0,
            Err(e) => {
                warn!(account, error = %e, "failure counter unreadable, starting from zero");
                0
            }
        }
    }

    async fn save(&self, account: &str, count: u32) {
        let bytes = count.to_string().into_bytes();
        if let Err(e) = self.store.store(&failure_key(account), &bytes).await {
            warn!(account, count, error = %e, "could not persist failure counter");
        }
    }
}
