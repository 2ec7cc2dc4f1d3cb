//! Fan-out of one update set to the owner and the subscribers.

use icms_watcher_core::UpdateSet;
use tracing::{info, warn};

use crate::Notifier;
use crate::message::{owner_message, subscriber_message};

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub sent: usize,
    /// Recipients whose send failed. Failed sends are not retried.
    pub failed: Vec<String>,
}

/// Send the detailed message to `owner`, then the name-only message to each
/// subscriber in order. Nothing is sent for an empty update set.
pub async fn notify_updates<N: Notifier + ?Sized>(
    notifier: &N,
    product: &str,
    owner: &str,
    subscribers: &[String],
    updates: &UpdateSet,
) -> Delivery {
    let mut delivery = Delivery::default();
    if updates.is_empty() {
        return delivery;
    }

    let detailed = owner_message(product, updates);
    send_one(notifier, &detailed, owner, &mut delivery).await;

    if !subscribers.is_empty() {
        let names_only = subscriber_message(product, updates);
        for sub in subscribers {
            send_one(notifier, &names_only, sub, &mut delivery).await;
        }
    }

    info!(sent = delivery.sent, failed = delivery.failed.len(), "notifications dispatched");
    delivery
}

async fn send_one<N: Notifier + ?Sized>(
    notifier: &N,
    text: &str,
    recipient: &str,
    delivery: &mut Delivery,
) {
    info!(recipient, "sending notification");
    match notifier.send(text, recipient).await {
        Ok(()) => delivery.sent += 1,
        Err(e) => {
            warn!(recipient, error = %e, "notification failed");
            delivery.failed.push(recipient.to_string());
        }
    }
}
