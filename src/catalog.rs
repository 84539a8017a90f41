//! Fixed desired-state catalogs pushed to the remote account.
//!
//! Reconciliation closes the gap between these catalogs and whatever the
//! account currently holds; nothing outside them is ever touched.
use serde::{Deserialize, Serialize};

/// Webhook event types the module subscribes to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    Open,
    Click,
    Bounce,
    Spam,
    Blocked,
    Unsub,
    Sent,
}

impl EventType {
    pub const ALL: [EventType; 7] = [
        EventType::Open,
        EventType::Click,
        EventType::Bounce,
        EventType::Spam,
        EventType::Blocked,
        EventType::Unsub,
        EventType::Sent,
    ];

    /// Wire name, as the remote API spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Open => "open",
            EventType::Click => "click",
            EventType::Bounce => "bounce",
            EventType::Spam => "spam",
            EventType::Blocked => "blocked",
            EventType::Unsub => "unsub",
            EventType::Sent => "sent",
        }
    }

    pub fn parse(s: &str) -> Option<EventType> {
        EventType::ALL.iter().copied().find(|e| e.as_str() == s)
    }
}

/// Webhook status value the module always writes.
pub const WEBHOOK_STATUS_ALIVE: &str = "alive";

/// One contact property the module provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub datatype: &'static str,
    pub namespace: &'static str,
}

/// Contact properties pushed for ecommerce-enabled stores. Additive-only:
/// existing remote properties are never updated or deleted.
pub const CONTACT_PROPERTIES: &[PropertySpec] = &[
    PropertySpec { name: "firstname", datatype: "str", namespace: "static" },
    PropertySpec { name: "lastname", datatype: "str", namespace: "static" },
    PropertySpec { name: "store_name", datatype: "str", namespace: "static" },
    PropertySpec { name: "account_creation_date", datatype: "datetime", namespace: "static" },
    PropertySpec { name: "newsletter_subscriber", datatype: "bool", namespace: "static" },
    PropertySpec { name: "total_orders_count", datatype: "int", namespace: "static" },
    PropertySpec { name: "total_spent", datatype: "float", namespace: "static" },
    PropertySpec { name: "last_order_date", datatype: "datetime", namespace: "static" },
];

/// One saved contact filter the module provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpec {
    pub name: &'static str,
    pub expression: &'static str,
    pub description: &'static str,
}

/// Segments pushed for ecommerce-enabled stores, matched by expression.
pub const SEGMENTS: &[SegmentSpec] = &[
    SegmentSpec {
        name: "Customers",
        expression: "(total_orders_count>0)",
        description: "Contacts with at least one order",
    },
    SegmentSpec {
        name: "Newsletter subscribers",
        expression: "(newsletter_subscriber=true)",
        description: "Contacts subscribed to the newsletter",
    },
    SegmentSpec {
        name: "Big spenders",
        expression: "(total_spent>500)",
        description: "Contacts with more than 500 in lifetime spend",
    },
];

/// One default transactional template definition.
///
/// `key` is the host configuration key the remote template id is stored
/// under; `json_file`/`html_file` name the local assets relative to
/// `app.templates_dir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateDef {
    pub key: &'static str,
    pub name: &'static str,
    pub purpose: &'static str,
    pub subject: &'static str,
    pub json_file: &'static str,
    pub html_file: &'static str,
}

/// Default templates provisioned into the remote account.
pub const TEMPLATES: &[TemplateDef] = &[
    TemplateDef {
        key: "order_confirmation",
        name: "Order Confirmation",
        purpose: "transactional",
        subject: "Your order has been received",
        json_file: "order_confirmation.mjml.json",
        html_file: "order_confirmation.html",
    },
    TemplateDef {
        key: "order_shipment",
        name: "Order Shipment",
        purpose: "transactional",
        subject: "Your order is on its way",
        json_file: "order_shipment.mjml.json",
        html_file: "order_shipment.html",
    },
    TemplateDef {
        key: "password_reset",
        name: "Password Reset",
        purpose: "transactional",
        subject: "Reset your password",
        json_file: "password_reset.mjml.json",
        html_file: "password_reset.html",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_round_trip() {
        for event in EventType::ALL {
            assert_eq!(EventType::parse(event.as_str()), Some(event));
        }
        assert_eq!(EventType::parse("parse_error"), None);
    }

    #[test]
    fn catalogs_have_unique_keys() {
        let mut names: Vec<_> = CONTACT_PROPERTIES.iter().map(|p| p.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), CONTACT_PROPERTIES.len());

        let mut exprs: Vec<_> = SEGMENTS.iter().map(|s| s.expression).collect();
        exprs.sort();
        exprs.dedup();
        assert_eq!(exprs.len(), SEGMENTS.len());

        let mut keys: Vec<_> = TEMPLATES.iter().map(|t| t.key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), TEMPLATES.len());
    }
}
