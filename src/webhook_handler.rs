use crate::config::Config;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::Tier;
use crate::storage::OrgStorage;
use crate::webhook_models::{BillingEvent, WebhookAck};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

/// Billing Webhook Handler
///
/// Receives signed subscription lifecycle events from the billing provider
/// and reconciles the owning organization's tier/status/period-end against
/// the canonical subscription resource.
///
/// Authentication: Billing-Signature header, `t=<unix>,v1=<hex hmac>` over
/// `"{t}.{raw body}"` with the configured signing secret. A failed
/// verification rejects the request before any state is touched.
pub async fn billing_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<WebhookAck>), AppError> {
    tracing::info!("Received billing webhook");

    // 1. Verify authenticity before anything else
    let secret = state.config.billing_webhook_secret.as_deref().ok_or_else(|| {
        AppError::Configuration("BILLING_WEBHOOK_SECRET not configured".to_string())
    })?;

    let signature_header = headers
        .get("Billing-Signature")
        .or_else(|| headers.get("billing-signature"))
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Billing-Signature header".to_string()))?;

    verify_signature(secret, signature_header, &body)?;

    // 2. Parse the event envelope
    let event: BillingEvent = serde_json::from_str(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {}", e)))?;

    tracing::debug!("Billing event {} ({})", event.id, event.event_type);

    // 3. Event types outside the reconciliation set are acknowledged untouched
    if !event.is_subscription_event() {
        tracing::debug!("Ignoring billing event type {}", event.event_type);
        return Ok((StatusCode::OK, Json(WebhookAck { received: true })));
    }

    let storage = OrgStorage::new(state.db.clone());

    // 4. Receipt + idempotency: redeliveries ack without reprocessing
    let payload_raw = serde_json::to_value(&event)
        .map_err(|e| AppError::InternalError(format!("Failed to serialize event: {}", e)))?;
    let newly_recorded = storage
        .record_billing_event(&event.id, &event.event_type, payload_raw)
        .await?;
    if !newly_recorded {
        tracing::info!("Duplicate billing event {}, acknowledging", event.id);
        return Ok((StatusCode::OK, Json(WebhookAck { received: true })));
    }

    // 5. Reconcile; the webhook contract maps processing failures to 400
    match process_subscription_event(&state, &storage, &event).await {
        Ok(outcome) => {
            storage
                .mark_billing_event(&event.id, outcome.receipt_status(), None)
                .await?;
            Ok((StatusCode::OK, Json(WebhookAck { received: true })))
        }
        Err(e) => {
            let message = e.to_string();
            if let Err(mark_err) = storage
                .mark_billing_event(&event.id, "failed", Some(&message))
                .await
            {
                tracing::error!("Failed to mark billing event as failed: {}", mark_err);
            }
            Err(AppError::BadRequest(message))
        }
    }
}

#[derive(Debug)]
enum SyncOutcome {
    /// The organization owning the customer reference was updated.
    Reconciled(Uuid),
    /// No organization carries this customer reference; zero rows updated.
    UnknownCustomer,
    /// The event carried no subscription to reconcile against.
    NoSubscription,
}

impl SyncOutcome {
    fn receipt_status(&self) -> &'static str {
        match self {
            SyncOutcome::Reconciled(_) => "processed",
            SyncOutcome::UnknownCustomer => "processed",
            SyncOutcome::NoSubscription => "skipped",
        }
    }
}

/// Re-fetches the canonical subscription and overwrites the owning
/// organization's subscription fields.
async fn process_subscription_event(
    state: &Arc<AppState>,
    storage: &OrgStorage,
    event: &BillingEvent,
) -> Result<SyncOutcome, AppError> {
    let Some(subscription_id) = event.subscription_id() else {
        // One-time checkouts carry no subscription; nothing to reconcile
        tracing::warn!(
            "Billing event {} ({}) has no subscription reference",
            event.id,
            event.event_type
        );
        return Ok(SyncOutcome::NoSubscription);
    };

    let billing_client = state.billing_client.as_ref().ok_or_else(|| {
        AppError::Configuration("BILLING_SECRET_KEY not configured".to_string())
    })?;

    let subscription = billing_client.fetch_subscription(&subscription_id).await?;

    if subscription.items.data.len() > 1 {
        // Tier derivation only reads the first line item
        tracing::warn!(
            "Subscription {} has {} line items; deriving tier from the first",
            subscription.id,
            subscription.items.data.len()
        );
    }

    let tier = subscription
        .items
        .data
        .first()
        .map(|item| tier_from_price(&state.config, &item.price.id))
        .unwrap_or_else(|| {
            tracing::warn!("Subscription {} has no line items", subscription.id);
            Tier::Free
        });

    let period_end = chrono::DateTime::from_timestamp(subscription.current_period_end, 0)
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "Invalid current_period_end: {}",
                subscription.current_period_end
            ))
        })?;

    let updated = storage
        .apply_subscription_update(&subscription.customer, tier, &subscription.status, period_end)
        .await?;

    match updated {
        Some(org_id) => {
            // The entitlement gate must see the new tier immediately
            state.tier_cache.invalidate(&org_id).await;
            tracing::info!(
                "Subscription sync: org {} -> tier={}, status={}",
                org_id,
                tier,
                subscription.status
            );
            Ok(SyncOutcome::Reconciled(org_id))
        }
        None => {
            tracing::info!(
                "Billing customer {} unknown; event {} is a no-op",
                subscription.customer,
                event.id
            );
            Ok(SyncOutcome::UnknownCustomer)
        }
    }
}

/// Derives the tier from a line-item price identifier.
///
/// Static two-entry lookup against the configured price ids; any other
/// price (or a missing configuration entry) means free.
pub fn tier_from_price(config: &Config, price_id: &str) -> Tier {
    if config.billing_price_solo.as_deref() == Some(price_id) {
        Tier::Solo
    } else if config.billing_price_business.as_deref() == Some(price_id) {
        Tier::Business
    } else {
        Tier::Free
    }
}

/// Verifies a `t=<unix>,v1=<hex hmac>` signature header against the raw
/// request body.
pub fn verify_signature(secret: &str, header: &str, payload: &str) -> Result<(), AppError> {
    let mut timestamp: Option<&str> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(value)) => timestamp = Some(value),
            (Some("v1"), Some(value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::BadRequest("Signature header missing timestamp".to_string()))?;
    if candidates.is_empty() {
        return Err(AppError::BadRequest(
            "Signature header missing v1 signature".to_string(),
        ));
    }

    let expected = compute_signature(secret, timestamp, payload)?;

    if candidates
        .iter()
        .any(|candidate| constant_time_compare(candidate, &expected))
    {
        Ok(())
    } else {
        tracing::warn!("Invalid billing webhook signature");
        Err(AppError::BadRequest(
            "Webhook signature verification failed".to_string(),
        ))
    }
}

/// HMAC-SHA256 over `"{timestamp}.{payload}"`, hex encoded.
fn compute_signature(secret: &str, timestamp: &str, payload: &str) -> Result<String, AppError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::InternalError("Invalid webhook signing secret".to_string()))?;
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison (basic implementation)
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
