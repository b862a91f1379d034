//! HTTP-level tests against the full router with an in-memory database.

#![allow(clippy::unwrap_used)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use secrecy::SecretString;
use sha2::Sha256;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use memodeck_core::ShopDomain;
use memodeck_server::config::{AppConfig, BillingConfig, ShopifyAppConfig};
use memodeck_server::db::{self, InstallationRepository};
use memodeck_server::state::AppState;
use memodeck_server::{middleware, routes};

const API_SECRET: &str = "fa7c3157c4e2db2a9f2e1b88c1d0a45e";

fn test_config() -> AppConfig {
    AppConfig {
        database_url: SecretString::from("sqlite::memory:"),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: "https://memodeck.example.dev".to_string(),
        shopify: ShopifyAppConfig {
            api_key: "test-api-key".to_string(),
            api_secret: SecretString::from(API_SECRET),
            scopes: vec!["write_products".to_string()],
            api_version: "2026-01".to_string(),
        },
        billing: BillingConfig {
            plan_name: "Unlimited".to_string(),
            amount: Decimal::new(399, 2),
            discount_amount: Decimal::new(199, 2),
            currency: "USD".to_string(),
            usage_cap: Decimal::new(10000, 2),
            usage_terms: "$1 per 100 tracked products".to_string(),
            test: true,
        },
        sentry_dsn: None,
        sentry_environment: None,
    }
}

async fn test_app() -> (Router, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::MIGRATOR.run(&pool).await.unwrap();

    let config = test_config();
    let session_layer = middleware::create_session_layer(&pool, &config)
        .await
        .unwrap();
    let state = AppState::new(config, pool.clone());

    let app = Router::new()
        .merge(routes::router(&state))
        .layer(session_layer)
        .with_state(state);

    (app, pool)
}

fn sign_webhook(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(API_SECRET.as_bytes()).unwrap();
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

fn webhook_request(topic: &str, shop: &str, body: &'static [u8], signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/webhooks")
        .header("X-Shopify-Hmac-Sha256", signature)
        .header("X-Shopify-Topic", topic)
        .header("X-Shopify-Shop-Domain", shop)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

// =============================================================================
// Access gate
// =============================================================================

#[tokio::test]
async fn charge_without_session_is_unauthorized() {
    let (app, _pool) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/charge")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_route_without_session_is_unauthorized() {
    let (app, _pool) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/user")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Install handshake entry
// =============================================================================

#[tokio::test]
async fn auth_begin_redirects_to_authorize_url() {
    let (app, _pool) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth?shop=demo.myshopify.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("https://demo.myshopify.com/admin/oauth/authorize?"));
    assert!(location.contains("client_id=test-api-key"));
    assert!(location.contains("state="));
}

#[tokio::test]
async fn auth_begin_rejects_missing_shop() {
    let (app, _pool) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn auth_begin_rejects_invalid_shop_domain() {
    let (app, _pool) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth?shop=evil.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn auth_callback_rejects_unsigned_redirect() {
    let (app, _pool) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/callback?shop=demo.myshopify.com&code=abc&state=xyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Webhook receiver
// =============================================================================

#[tokio::test]
async fn uninstall_webhook_removes_installation() {
    let (app, pool) = test_app().await;
    let shop = ShopDomain::parse("demo.myshopify.com").unwrap();
    InstallationRepository::new(&pool).add(&shop).await.unwrap();

    let body: &[u8] = br#"{"id":1,"domain":"demo.myshopify.com"}"#;
    let signature = sign_webhook(body);

    let response = app
        .clone()
        .oneshot(webhook_request(
            "app/uninstalled",
            "demo.myshopify.com",
            body,
            &signature,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!InstallationRepository::new(&pool).includes(&shop).await.unwrap());

    // Redelivery of the same event is acknowledged with the same end state.
    let response = app
        .oneshot(webhook_request(
            "app/uninstalled",
            "demo.myshopify.com",
            body,
            &signature,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!InstallationRepository::new(&pool).includes(&shop).await.unwrap());
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected_without_side_effects() {
    let (app, pool) = test_app().await;
    let shop = ShopDomain::parse("demo.myshopify.com").unwrap();
    InstallationRepository::new(&pool).add(&shop).await.unwrap();

    let body: &[u8] = br#"{"id":1}"#;

    let response = app
        .oneshot(webhook_request(
            "app/uninstalled",
            "demo.myshopify.com",
            body,
            "aW52YWxpZCBzaWduYXR1cmU=",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(InstallationRepository::new(&pool).includes(&shop).await.unwrap());
}

#[tokio::test]
async fn webhook_with_unknown_topic_is_acknowledged() {
    let (app, _pool) = test_app().await;

    let body: &[u8] = br#"{"id":1}"#;
    let signature = sign_webhook(body);

    let response = app
        .oneshot(webhook_request(
            "orders/create",
            "demo.myshopify.com",
            body,
            &signature,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn compliance_webhook_is_acknowledged() {
    let (app, _pool) = test_app().await;

    let body: &[u8] = br#"{"shop_id":42,"shop_domain":"demo.myshopify.com"}"#;
    let signature = sign_webhook(body);

    let response = app
        .oneshot(webhook_request(
            "shop/redact",
            "demo.myshopify.com",
            body,
            &signature,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn fulfillment_webhook_is_handled() {
    let (app, _pool) = test_app().await;

    let body: &[u8] = br#"{"id":7,"order_id":1001,"status":"success"}"#;
    let signature = sign_webhook(body);

    let response = app
        .oneshot(webhook_request(
            "fulfillments/create",
            "demo.myshopify.com",
            body,
            &signature,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// App shell
// =============================================================================

#[tokio::test]
async fn shell_without_shop_is_bad_request() {
    let (app, _pool) = test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn shell_for_uninstalled_shop_starts_handshake() {
    let (app, _pool) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/?shop=demo.myshopify.com&host=aG9zdA")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("/api/auth?shop=demo.myshopify.com"));
    assert!(location.contains("host=aG9zdA"));
}

#[tokio::test]
async fn shell_without_host_starts_handshake_even_when_installed() {
    let (app, pool) = test_app().await;
    let shop = ShopDomain::parse("demo.myshopify.com").unwrap();
    InstallationRepository::new(&pool).add(&shop).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/?shop=demo.myshopify.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("/api/auth?shop=demo.myshopify.com"));
}

#[tokio::test]
async fn shell_for_installed_shop_serves_page_with_frame_csp() {
    let (app, pool) = test_app().await;
    let shop = ShopDomain::parse("demo.myshopify.com").unwrap();
    InstallationRepository::new(&pool).add(&shop).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/?shop=demo.myshopify.com&host=aG9zdA")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let csp = response
        .headers()
        .get(header::CONTENT_SECURITY_POLICY)
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(
        csp,
        "frame-ancestors https://demo.myshopify.com https://admin.shopify.com;"
    );

    let body = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    let html = std::str::from_utf8(&body).unwrap();
    assert!(html.contains(r#"content="test-api-key""#));
}
