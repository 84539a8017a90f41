//! Side-effect-free diff planning between desired catalogs and remote state.
//!
//! The reconciliation service turns a plan into remote calls; nothing in
//! this module performs I/O.
use crate::catalog::{EventType, PropertySpec, SegmentSpec};
use crate::mailjet::model::{ContactProperty, Segment, Webhook};

/// Desired state for one webhook event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDesired {
    pub event: EventType,
    pub enabled: bool,
    /// Canonical callback URL for this event.
    pub url: String,
}

/// One remote write the webhook plan calls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAction {
    Create { event: EventType, url: String },
    Update { id: u64, event: EventType, url: String },
    Delete { id: u64 },
}

/// Diff the desired event set against the remote webhook list.
///
/// For each remote webhook whose type is in the desired set: disabled means
/// delete, a stale url means update; the first match consumes the type, so
/// remote duplicates of one type are left untouched. Desired types with no
/// remote counterpart are created when enabled. Types outside the desired
/// set are never touched.
pub fn plan_webhooks(desired: &[EventDesired], actual: &[Webhook]) -> Vec<WebhookAction> {
    let mut remaining: Vec<&EventDesired> = desired.iter().collect();
    let mut actions = Vec::new();

    for webhook in actual {
        let Some(pos) = remaining
            .iter()
            .position(|d| d.event.as_str() == webhook.event_type)
        else {
            continue;
        };
        let wanted = remaining.remove(pos);

        if !wanted.enabled {
            actions.push(WebhookAction::Delete { id: webhook.id });
        } else if webhook.url != wanted.url {
            actions.push(WebhookAction::Update {
                id: webhook.id,
                event: wanted.event,
                url: wanted.url.clone(),
            });
        }
    }

    for wanted in remaining {
        if wanted.enabled {
            actions.push(WebhookAction::Create {
                event: wanted.event,
                url: wanted.url.clone(),
            });
        }
    }

    actions
}

/// Catalog properties absent from the remote account, matched by name.
pub fn missing_properties<'a>(
    catalog: &'a [PropertySpec],
    remote: &[ContactProperty],
) -> Vec<&'a PropertySpec> {
    catalog
        .iter()
        .filter(|spec| !remote.iter().any(|p| p.name == spec.name))
        .collect()
}

/// Catalog segments absent from the remote account, matched by expression.
pub fn missing_segments<'a>(
    catalog: &'a [SegmentSpec],
    remote: &[Segment],
) -> Vec<&'a SegmentSpec> {
    catalog
        .iter()
        .filter(|spec| !remote.iter().any(|s| s.expression == spec.expression))
        .collect()
}
