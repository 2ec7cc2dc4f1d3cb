use icms_watcher_core::UpdateSet;

pub const PRODUCT_NAME: &str = "ICMS-Watcher";

fn header(product: &str) -> String {
    format!("{product} Update:\n")
}

/// Full message for the account owner: one `name: mark - kind - status` line per update.
pub fn owner_message(product: &str, updates: &UpdateSet) -> String {
    let mut msg = header(product);
    for record in updates.values() {
        msg.push_str(&format!(
            "{}: {} - {} - {}\n",
            record.name, record.mark, record.kind, record.status
        ));
    }
    msg
}

/// Message for subscribers: unit names only, no grades.
pub fn subscriber_message(product: &str, updates: &UpdateSet) -> String {
    let mut msg = header(product);
    for name in updates.keys() {
        msg.push_str(name);
        msg.push('\n');
    }
    msg
}
