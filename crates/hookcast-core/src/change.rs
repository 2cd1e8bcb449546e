//! Change detection between two snapshots of the same object
//!
//! Only the kind's significant fields are compared. Volatile fields such as
//! `last_modified` are ignored so re-fetch churn does not re-notify.

use tracing::debug;

use crate::event::{EventKind, WebhookEvent};

/// Whether `current` differs from `previous` in a way worth re-notifying.
///
/// Unknown kinds have no significant-field set and always report a change.
pub fn has_changed(kind: &EventKind, previous: &WebhookEvent, current: &WebhookEvent) -> bool {
    let fields = kind.significant_fields();

    if fields.is_empty() {
        debug!("Received an object of unknown type {}", kind);
        return true;
    }

    fields
        .iter()
        .any(|field| previous.field(field) != current.field(field))
}
