use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Billing event types this service reconciles on. Every other event type
/// is acknowledged and left untouched.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

/// Signed event envelope delivered by the billing provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillingEvent {
    /// Provider-assigned event id; the idempotency key for receipts.
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    pub data: BillingEventData,

    /// Raw data for any additional fields
    #[serde(flatten)]
    pub raw: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillingEventData {
    /// The event's primary object, shape depending on the event type.
    pub object: Value,
}

impl BillingEvent {
    /// Whether this event type participates in subscription reconciliation.
    pub fn is_subscription_event(&self) -> bool {
        matches!(
            self.event_type.as_str(),
            CHECKOUT_COMPLETED | SUBSCRIPTION_UPDATED | SUBSCRIPTION_DELETED
        )
    }

    /// The canonical subscription id to re-fetch.
    ///
    /// Checkout events reference the subscription they created; subscription
    /// events *are* the subscription object.
    pub fn subscription_id(&self) -> Option<String> {
        let object = &self.data.object;
        match self.event_type.as_str() {
            CHECKOUT_COMPLETED => object
                .get("subscription")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            SUBSCRIPTION_UPDATED | SUBSCRIPTION_DELETED => object
                .get("id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            _ => None,
        }
    }
}

/// Canonical subscription resource as re-fetched from the provider after a
/// webhook delivery. Only the fields reconciliation needs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionResource {
    pub id: String,
    /// Billing customer reference; keys the organization update.
    pub customer: String,
    /// Provider status, stored verbatim on the organization.
    pub status: String,
    /// Current billing period end as a unix timestamp.
    pub current_period_end: i64,
    pub items: SubscriptionItems,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionItem {
    pub price: PriceRef,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PriceRef {
    pub id: String,
}

/// Acknowledgement sent back to the billing provider.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checkout_event() {
        let json = r#"
        {
            "id": "evt_123",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_456",
                    "subscription": "sub_789",
                    "customer": "cus_abc"
                }
            }
        }
        "#;

        let event: BillingEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.id, "evt_123");
        assert!(event.is_subscription_event());
        assert_eq!(event.subscription_id(), Some("sub_789".to_string()));
    }

    #[test]
    fn test_parse_subscription_event() {
        let json = r#"
        {
            "id": "evt_124",
            "type": "customer.subscription.updated",
            "data": {
                "object": {
                    "id": "sub_789",
                    "status": "past_due"
                }
            }
        }
        "#;

        let event: BillingEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.subscription_id(), Some("sub_789".to_string()));
    }

    #[test]
    fn test_unhandled_event_type() {
        let json = r#"
        {
            "id": "evt_125",
            "type": "invoice.paid",
            "data": { "object": { "id": "in_1" } }
        }
        "#;

        let event: BillingEvent = serde_json::from_str(json).unwrap();
        assert!(!event.is_subscription_event());
        assert_eq!(event.subscription_id(), None);
    }

    #[test]
    fn test_parse_subscription_resource() {
        let json = r#"
        {
            "id": "sub_789",
            "customer": "cus_abc",
            "status": "active",
            "current_period_end": 1767225600,
            "items": {
                "data": [
                    { "price": { "id": "price_solo123" } }
                ]
            }
        }
        "#;

        let resource: SubscriptionResource = serde_json::from_str(json).unwrap();
        assert_eq!(resource.customer, "cus_abc");
        assert_eq!(resource.items.data[0].price.id, "price_solo123");
    }
}
