mod billing_client;
mod circuit_breaker;
mod config;
mod dashboard;
mod db;
mod entitlements;
mod errors;
mod handlers;
mod models;
mod onboarding;
mod sms_client;
mod snapshot_cache;
mod storage;
mod webhook_handler;
mod webhook_models;

use axum::{
    routing::{get, post},
    Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Database connection.
/// - Caches (organization tier, dashboard snapshots).
/// - External provider clients (billing, SMS).
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workforce_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // Organization tier cache for the entitlement gate (60s TTL).
    // The webhook sync invalidates entries when a subscription changes.
    let tier_cache = Cache::builder()
        .time_to_live(Duration::from_secs(60))
        .max_capacity(10_000)
        .build();
    tracing::info!("Tier cache initialized");

    // Dashboard snapshot cache (60s TTL), entries checksum-sealed
    let snapshot_cache = Cache::builder()
        .time_to_live(Duration::from_secs(60))
        .max_capacity(10_000)
        .build();
    tracing::info!("Dashboard snapshot cache initialized");

    // Billing client is optional; billing endpoints surface the missing
    // configuration at call time instead
    let billing_client = match config.billing_secret_key.clone() {
        Some(secret_key) => {
            match billing_client::BillingClient::new(config.billing_base_url.clone(), secret_key) {
                Ok(client) => {
                    tracing::info!("✓ Billing client initialized: {}", config.billing_base_url);
                    Some(client)
                }
                Err(e) => {
                    tracing::error!("Failed to initialize billing client: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    // SMS client is optional; notification dispatch degrades to a logged skip
    let sms_client = match (
        config.sms_account_sid.clone(),
        config.sms_auth_token.clone(),
        config.sms_from_number.clone(),
    ) {
        (Some(sid), Some(token), Some(from)) => {
            match sms_client::SmsClient::new(config.sms_base_url.clone(), sid, token, from) {
                Ok(client) => {
                    tracing::info!("✓ SMS client initialized: {}", config.sms_base_url);
                    Some(client)
                }
                Err(e) => {
                    tracing::error!("Failed to initialize SMS client: {}", e);
                    None
                }
            }
        }
        _ => None,
    };

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        db: db.pool.clone(),
        config: config.clone(),
        billing_client,
        sms_client,
        tier_cache,
        snapshot_cache,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        // Onboarding wizard
        .route("/api/v1/onboarding", post(handlers::create_onboarding_draft))
        .route(
            "/api/v1/onboarding/:id/actions",
            post(handlers::apply_wizard_action),
        )
        .route(
            "/api/v1/onboarding/:id/submit",
            post(handlers::submit_onboarding),
        )
        // Organizations & entitlements
        .route("/api/v1/orgs/:id", get(handlers::get_organization))
        .route(
            "/api/v1/orgs/:id/entitlements",
            get(handlers::list_entitlements),
        )
        .route(
            "/api/v1/entitlements/check",
            get(handlers::check_entitlement),
        )
        .route("/api/v1/orgs/:id/dashboard", get(handlers::get_dashboard))
        // Billing
        .route(
            "/api/v1/billing/checkout-session",
            post(handlers::create_checkout_session),
        )
        .route(
            "/api/v1/billing/portal-session",
            post(handlers::create_portal_session),
        )
        .route(
            "/api/v1/webhooks/billing",
            post(webhook_handler::billing_webhook),
        )
        // Staff invitations
        .route("/api/v1/orgs/invite", post(handlers::invite_user))
        // Booking notifications
        .route(
            "/api/v1/notifications/booking",
            post(handlers::send_booking_notification),
        )
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
