use serde::Deserialize;

/// Runtime configuration loaded from the environment.
///
/// Billing and SMS provider credentials are optional on purpose: their
/// absence must never prevent the service from starting. Billing operations
/// fail hard at call time without them; notification dispatch degrades to a
/// logged skip.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Public base URL of the web app, used for checkout/portal redirects.
    pub app_base_url: String,
    pub billing_base_url: String,
    pub billing_secret_key: Option<String>,
    pub billing_webhook_secret: Option<String>,
    /// Price identifier for the solo tier.
    pub billing_price_solo: Option<String>,
    /// Price identifier for the business tier.
    pub billing_price_business: Option<String>,
    pub sms_base_url: String,
    pub sms_account_sid: Option<String>,
    pub sms_auth_token: Option<String>,
    pub sms_from_number: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            app_base_url: base_url_from_env("APP_BASE_URL", "http://localhost:5173")?,
            billing_base_url: base_url_from_env("BILLING_BASE_URL", "https://api.stripe.com")?,
            billing_secret_key: optional_env("BILLING_SECRET_KEY"),
            billing_webhook_secret: optional_env("BILLING_WEBHOOK_SECRET"),
            billing_price_solo: optional_env("BILLING_PRICE_SOLO"),
            billing_price_business: optional_env("BILLING_PRICE_BUSINESS"),
            sms_base_url: base_url_from_env("SMS_BASE_URL", "https://api.twilio.com")?,
            sms_account_sid: optional_env("SMS_ACCOUNT_SID"),
            sms_auth_token: optional_env("SMS_AUTH_TOKEN"),
            sms_from_number: optional_env("SMS_FROM_NUMBER"),
        };

        config.warn_on_partial_providers();

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("App base URL: {}", config.app_base_url);
        tracing::debug!("Billing base URL: {}", config.billing_base_url);
        tracing::debug!("SMS base URL: {}", config.sms_base_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// True when every credential needed to send SMS is present.
    pub fn sms_configured(&self) -> bool {
        self.sms_account_sid.is_some()
            && self.sms_auth_token.is_some()
            && self.sms_from_number.is_some()
    }

    /// Logs startup warnings for provider config that is present but unusable.
    fn warn_on_partial_providers(&self) {
        // A price identifier the provider would never issue is almost always a
        // paste error; the tier lookup treats it as unknown (=> free).
        let price_format = match regex::Regex::new(r"^price_[A-Za-z0-9]+$") {
            Ok(re) => re,
            Err(_) => return,
        };
        for (name, value) in [
            ("BILLING_PRICE_SOLO", &self.billing_price_solo),
            ("BILLING_PRICE_BUSINESS", &self.billing_price_business),
        ] {
            if let Some(price) = value {
                if !price_format.is_match(price) {
                    tracing::warn!("{} does not look like a price identifier: {}", name, price);
                }
            }
        }

        if self.billing_secret_key.is_none() {
            tracing::warn!("BILLING_SECRET_KEY not set; billing operations will fail at call time");
        }
        if self.billing_webhook_secret.is_none() {
            tracing::warn!("BILLING_WEBHOOK_SECRET not set; billing webhooks will be rejected");
        }
        if !self.sms_configured() {
            tracing::warn!("SMS credentials incomplete; booking notifications will be skipped");
        }
    }
}

/// Reads an env var, treating unset and blank values as absent.
fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

/// Reads a base URL env var with a default, validating that it parses.
fn base_url_from_env(name: &str, default: &str) -> anyhow::Result<String> {
    let value = std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    url::Url::parse(&value).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    Ok(value.trim_end_matches('/').to_string())
}
