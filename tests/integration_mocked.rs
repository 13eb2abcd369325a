/// Integration tests with mocked external providers
/// Tests billing and SMS client behavior without hitting real services
use workforce_api::api::webhook_handler::{tier_from_price, verify_signature};
use workforce_api::config::Config;
use workforce_api::integrations::billing_client::BillingClient;
use workforce_api::integrations::sms_client::SmsClient;
use workforce_api::models::Tier;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config
fn create_test_config(billing_base_url: String, sms_base_url: String) -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 8080,
        app_base_url: "http://localhost:5173".to_string(),
        billing_base_url,
        billing_secret_key: Some("sk_test".to_string()),
        billing_webhook_secret: Some("whsec_test".to_string()),
        billing_price_solo: Some("price_solo123".to_string()),
        billing_price_business: Some("price_biz456".to_string()),
        sms_base_url,
        sms_account_sid: Some("AC123".to_string()),
        sms_auth_token: Some("token".to_string()),
        sms_from_number: Some("+15005550006".to_string()),
    }
}

fn subscription_json(price_id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "sub_789",
        "customer": "cus_abc",
        "status": "active",
        "current_period_end": 1767225600,
        "items": {
            "data": [
                { "price": { "id": price_id } }
            ]
        }
    })
}

#[tokio::test]
async fn test_fetch_subscription_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/subscriptions/sub_789"))
        .respond_with(ResponseTemplate::new(200).set_body_json(subscription_json("price_solo123")))
        .mount(&mock_server)
        .await;

    let client = BillingClient::new(mock_server.uri(), "sk_test".to_string()).unwrap();
    let subscription = client.fetch_subscription("sub_789").await.unwrap();

    assert_eq!(subscription.customer, "cus_abc");
    assert_eq!(subscription.status, "active");
    assert_eq!(subscription.items.data.len(), 1);

    let config = create_test_config(mock_server.uri(), "https://sms.invalid".to_string());
    let tier = tier_from_price(&config, &subscription.items.data[0].price.id);
    assert_eq!(tier, Tier::Solo);
}

#[tokio::test]
async fn test_fetch_subscription_unknown_price_means_free() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/subscriptions/sub_789"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(subscription_json("price_legacy999")),
        )
        .mount(&mock_server)
        .await;

    let client = BillingClient::new(mock_server.uri(), "sk_test".to_string()).unwrap();
    let subscription = client.fetch_subscription("sub_789").await.unwrap();

    let config = create_test_config(mock_server.uri(), "https://sms.invalid".to_string());
    let tier = tier_from_price(&config, &subscription.items.data[0].price.id);
    assert_eq!(tier, Tier::Free);
}

#[tokio::test]
async fn test_fetch_subscription_provider_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/subscriptions/sub_789"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let client = BillingClient::new(mock_server.uri(), "sk_test".to_string()).unwrap();
    let result = client.fetch_subscription("sub_789").await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_create_checkout_session_returns_redirect_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(body_string_contains("price_solo123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cs_1",
            "url": "https://billing.example/pay/cs_1"
        })))
        .mount(&mock_server)
        .await;

    let client = BillingClient::new(mock_server.uri(), "sk_test".to_string()).unwrap();
    let url = client
        .create_checkout_session(
            Some("cus_abc"),
            "price_solo123",
            "http://localhost:5173/dashboard?checkout=success",
            "http://localhost:5173/upgrade?checkout=canceled",
        )
        .await
        .unwrap();

    assert_eq!(url, "https://billing.example/pay/cs_1");
}

#[tokio::test]
async fn test_create_checkout_session_missing_url_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "cs_1"})))
        .mount(&mock_server)
        .await;

    let client = BillingClient::new(mock_server.uri(), "sk_test".to_string()).unwrap();
    let result = client
        .create_checkout_session(None, "price_solo123", "http://a", "http://b")
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_create_customer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cus_new1",
            "name": "Shear Genius"
        })))
        .mount(&mock_server)
        .await;

    let client = BillingClient::new(mock_server.uri(), "sk_test".to_string()).unwrap();
    let customer_id = client
        .create_customer("Shear Genius", uuid::Uuid::new_v4())
        .await
        .unwrap();

    assert_eq!(customer_id, "cus_new1");
}

#[tokio::test]
async fn test_create_portal_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/billing_portal/sessions"))
        .and(body_string_contains("cus_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "bps_1",
            "url": "https://billing.example/portal/bps_1"
        })))
        .mount(&mock_server)
        .await;

    let client = BillingClient::new(mock_server.uri(), "sk_test".to_string()).unwrap();
    let url = client
        .create_portal_session("cus_abc", "http://localhost:5173/dashboard")
        .await
        .unwrap();

    assert_eq!(url, "https://billing.example/portal/bps_1");
}

#[tokio::test]
async fn test_sms_send_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
        .and(body_string_contains("See+you+soon"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "sid": "SM1",
            "status": "queued"
        })))
        .mount(&mock_server)
        .await;

    let client = SmsClient::new(
        mock_server.uri(),
        "AC123".to_string(),
        "token".to_string(),
        "+15005550006".to_string(),
    )
    .unwrap();

    let result = client
        .send_sms(
            "+15035550188",
            "Hi Dana, your cut appointment with Marco on Friday 2pm has been confirmed. See you soon!",
        )
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_sms_gateway_error_surfaces() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("gateway down"))
        .mount(&mock_server)
        .await;

    let client = SmsClient::new(
        mock_server.uri(),
        "AC123".to_string(),
        "token".to_string(),
        "+15005550006".to_string(),
    )
    .unwrap();

    let result = client.send_sms("+15035550188", "test").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_sms_circuit_opens_after_consecutive_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("gateway down"))
        .mount(&mock_server)
        .await;

    let client = SmsClient::new(
        mock_server.uri(),
        "AC123".to_string(),
        "token".to_string(),
        "+15005550006".to_string(),
    )
    .unwrap();

    // Three failures trip the breaker; the fourth call must fail fast too
    for _ in 0..4 {
        assert!(client.send_sms("+15035550188", "test").await.is_err());
    }
}

#[test]
fn test_webhook_signature_round_trip() {
    use hmac::{Hmac, Mac};

    let secret = "whsec_test";
    let payload = r#"{"id":"evt_1","type":"customer.subscription.updated","data":{"object":{"id":"sub_789"}}}"#;
    let timestamp = "1700000000";

    let mut mac = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    let header = format!("t={},v1={}", timestamp, signature);

    assert!(verify_signature(secret, &header, payload).is_ok());
    assert!(verify_signature(secret, &header, r#"{"id":"evt_2"}"#).is_err());
    assert!(verify_signature("whsec_wrong", &header, payload).is_err());
}

#[tokio::test]
async fn test_concurrent_subscription_fetches() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(subscription_json("price_biz456")))
        .expect(10)
        .mount(&mock_server)
        .await;

    let client = BillingClient::new(mock_server.uri(), "sk_test".to_string()).unwrap();

    let mut handles = vec![];
    for _ in 0..10 {
        let client_clone = client.clone();
        let handle =
            tokio::spawn(async move { client_clone.fetch_subscription("sub_789").await });
        handles.push(handle);
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }
}
