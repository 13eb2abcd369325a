use crate::errors::AppError;
use crate::webhook_models::SubscriptionResource;
use std::time::Duration;
use uuid::Uuid;

/// Client for the hosted billing provider's REST API.
///
/// Checkout sessions, billing-portal sessions, and canonical subscription
/// reads all go through here; webhook payloads are never trusted as the
/// source of truth.
#[derive(Clone)]
pub struct BillingClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl BillingClient {
    /// Creates a new `BillingClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the billing API.
    /// * `secret_key` - The secret API key for authentication.
    pub fn new(base_url: String, secret_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create billing client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            secret_key,
        })
    }

    /// Fetches the canonical subscription resource by id.
    pub async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionResource, AppError> {
        let url = format!("{}/v1/subscriptions/{}", self.base_url, subscription_id);
        tracing::info!("Fetching subscription {} from billing provider", subscription_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Billing request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Billing provider returned {}: {}",
                status, error_text
            )));
        }

        let subscription = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse subscription: {}", e))
        })?;

        Ok(subscription)
    }

    /// Creates a billing customer for an organization and returns its
    /// reference. The reference is stored before checkout so later webhook
    /// events can be keyed back to the organization.
    pub async fn create_customer(&self, name: &str, org_id: Uuid) -> Result<String, AppError> {
        let url = format!("{}/v1/customers", self.base_url);
        tracing::info!("Creating billing customer for org {}", org_id);

        let form = [
            ("name", name.to_string()),
            ("metadata[org_id]", org_id.to_string()),
        ];

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Customer creation request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Customer creation failed {}: {}",
                status, error_text
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse customer: {}", e))
        })?;

        let customer_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AppError::ExternalApiError("Customer response missing 'id' field".to_string())
            })?
            .to_string();

        tracing::info!("✓ Billing customer created: {}", customer_id);
        Ok(customer_id)
    }

    /// Creates a checkout session for the given price and returns the
    /// redirect URL.
    ///
    /// # Arguments
    ///
    /// * `customer_id` - Existing billing customer reference, if any.
    /// * `price_id` - The price identifier of the chosen tier.
    /// * `success_url` / `cancel_url` - Where the provider sends the user back.
    pub async fn create_checkout_session(
        &self,
        customer_id: Option<&str>,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String, AppError> {
        let url = format!("{}/v1/checkout/sessions", self.base_url);
        tracing::info!("Creating checkout session for price {}", price_id);

        let mut form: Vec<(&str, String)> = vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", success_url.to_string()),
            ("cancel_url", cancel_url.to_string()),
        ];
        if let Some(customer) = customer_id {
            form.push(("customer", customer.to_string()));
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Checkout session request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Checkout session creation failed {}: {}",
                status, error_text
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse checkout session: {}", e))
        })?;

        let redirect_url = body
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                tracing::warn!("Unexpected checkout session response: {:?}", body);
                AppError::ExternalApiError("Checkout session response missing 'url'".to_string())
            })?
            .to_string();

        tracing::info!("✓ Checkout session created");
        Ok(redirect_url)
    }

    /// Creates a billing-portal session for an existing customer and returns
    /// the redirect URL.
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, AppError> {
        let url = format!("{}/v1/billing_portal/sessions", self.base_url);
        tracing::info!("Creating billing portal session");

        let form = [
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Portal session request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Portal session creation failed {}: {}",
                status, error_text
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse portal session: {}", e))
        })?;

        let redirect_url = body
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AppError::ExternalApiError("Portal session response missing 'url'".to_string())
            })?
            .to_string();

        tracing::info!("✓ Billing portal session created");
        Ok(redirect_url)
    }
}
