//! Multi-tenant Shopify Admin API client with OAuth authentication.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::instrument;

use memodeck_core::ShopDomain;

use crate::config::ShopifyAppConfig;

use super::{GraphQLError, ShopifyError};

/// Per-call deadline for every outbound Admin API request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Webhook topics every installed shop must be subscribed to.
const MANDATORY_WEBHOOK_TOPICS: &[&str] = &[
    "APP_UNINSTALLED",
    "CUSTOMERS_DATA_REQUEST",
    "CUSTOMERS_REDACT",
    "SHOP_REDACT",
    "FULFILLMENTS_CREATE",
];

/// Access token obtained from the OAuth code exchange.
#[derive(Clone)]
pub struct AccessToken {
    /// The token for API calls on behalf of the granting shop.
    pub access_token: String,
    /// Granted scopes, comma-separated.
    pub scope: String,
    /// Unix timestamp when the token was obtained.
    pub obtained_at: i64,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// Seam for the webhook-registration step of install finalization.
///
/// The production implementation is [`AdminClient`]; install tests substitute
/// a stub to exercise the rollback path without a network.
pub trait RegisterWebhooks {
    /// Subscribe the shop to all mandatory webhook topics.
    fn register_webhooks(
        &self,
        shop: &ShopDomain,
        access_token: &str,
    ) -> impl Future<Output = Result<(), ShopifyError>> + Send;
}

/// Shopify Admin API GraphQL client.
///
/// Unlike a single-store integration, this app is installed into many shops,
/// so the client holds only the app credentials. Every call takes the target
/// shop and the access token for that shop.
#[derive(Clone)]
pub struct AdminClient {
    inner: Arc<AdminClientInner>,
}

struct AdminClientInner {
    client: reqwest::Client,
    api_key: String,
    api_secret: String,
    api_version: String,
    webhook_callback_url: String,
}

/// GraphQL response wrapper.
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLErrorResponse>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorResponse {
    message: String,
    #[serde(default)]
    path: Vec<serde_json::Value>,
}

/// A `userErrors` entry from a mutation payload.
#[derive(Debug, Deserialize)]
pub(crate) struct UserError {
    pub field: Option<Vec<String>>,
    pub message: String,
}

/// OAuth token response from Shopify.
#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    scope: String,
}

#[derive(Debug, Deserialize)]
struct WebhookSubscriptionCreateData {
    #[serde(rename = "webhookSubscriptionCreate")]
    webhook_subscription_create: Option<WebhookSubscriptionCreatePayload>,
}

#[derive(Debug, Deserialize)]
struct WebhookSubscriptionCreatePayload {
    #[serde(rename = "userErrors", default)]
    user_errors: Vec<UserError>,
}

const WEBHOOK_SUBSCRIPTION_CREATE: &str = r"
mutation webhookSubscriptionCreate($topic: WebhookSubscriptionTopic!, $webhookSubscription: WebhookSubscriptionInput!) {
  webhookSubscriptionCreate(topic: $topic, webhookSubscription: $webhookSubscription) {
    webhookSubscription {
      id
    }
    userErrors {
      field
      message
    }
  }
}
";

impl AdminClient {
    /// Create a new Admin API client from the app credentials.
    #[must_use]
    pub fn new(config: &ShopifyAppConfig, webhook_callback_url: String) -> Self {
        let client = reqwest::Client::new();

        Self {
            inner: Arc::new(AdminClientInner {
                client,
                api_key: config.api_key.clone(),
                api_secret: config.api_secret.expose_secret().to_string(),
                api_version: config.api_version.clone(),
                webhook_callback_url,
            }),
        }
    }

    /// Get the app API key (OAuth client id).
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.inner.api_key
    }

    /// Get the app API secret (for HMAC verification).
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.inner.api_secret
    }

    // =========================================================================
    // OAuth Flow
    // =========================================================================

    /// Generate the OAuth authorization URL for a shop.
    ///
    /// Redirect the merchant's browser to this URL to begin the install
    /// handshake.
    #[must_use]
    pub fn authorization_url(
        &self,
        shop: &ShopDomain,
        redirect_uri: &str,
        scopes: &[String],
        state: &str,
    ) -> String {
        let scope = scopes.join(",");
        format!(
            "https://{}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state={}",
            shop,
            urlencoding::encode(&self.inner.api_key),
            urlencoding::encode(&scope),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for an access token.
    ///
    /// Call this in the OAuth callback handler after the merchant approves.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::OAuth` if the token exchange fails.
    /// Returns `ShopifyError::Http` if the HTTP request fails.
    /// Returns `ShopifyError::Timeout` if the request exceeds the deadline.
    pub async fn exchange_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<AccessToken, ShopifyError> {
        let url = format!("https://{shop}/admin/oauth/access_token");

        let params = [
            ("client_id", self.inner.api_key.as_str()),
            ("client_secret", self.inner.api_secret.as_str()),
            ("code", code),
        ];

        let response = self
            .inner
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .form(&params)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ShopifyError::OAuth(format!(
                "Token exchange failed: {text}"
            )));
        }

        let token_response: OAuthTokenResponse =
            response.json().await.map_err(map_reqwest_error)?;

        Ok(AccessToken {
            access_token: token_response.access_token,
            scope: token_response.scope,
            obtained_at: chrono::Utc::now().timestamp(),
        })
    }

    // =========================================================================
    // GraphQL Execution
    // =========================================================================

    /// Execute a GraphQL document against one shop's Admin API.
    pub(crate) async fn graphql<T: DeserializeOwned>(
        &self,
        shop: &ShopDomain,
        access_token: &str,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ShopifyError> {
        let endpoint = format!(
            "https://{}/admin/api/{}/graphql.json",
            shop, self.inner.api_version
        );

        let body = json!({
            "query": query,
            "variables": variables,
        });

        let response = self
            .inner
            .client
            .post(&endpoint)
            .timeout(REQUEST_TIMEOUT)
            .header("X-Shopify-Access-Token", access_token)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let graphql_response: GraphQLResponse<T> =
            response.json().await.map_err(map_reqwest_error)?;

        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            let converted_errors: Vec<GraphQLError> = errors
                .into_iter()
                .map(|e| GraphQLError {
                    message: e.message,
                    path: e.path,
                })
                .collect();
            return Err(ShopifyError::GraphQL(converted_errors));
        }

        graphql_response.data.ok_or_else(|| {
            ShopifyError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
                path: vec![],
            }])
        })
    }
}

impl RegisterWebhooks for AdminClient {
    /// Subscribe the shop to every mandatory topic, one mutation per topic.
    ///
    /// A duplicate-subscription user error from Shopify (topic already
    /// registered from an earlier install) is treated as success.
    #[instrument(skip(self, access_token), fields(shop = %shop))]
    async fn register_webhooks(
        &self,
        shop: &ShopDomain,
        access_token: &str,
    ) -> Result<(), ShopifyError> {
        for topic in MANDATORY_WEBHOOK_TOPICS {
            let variables = json!({
                "topic": topic,
                "webhookSubscription": {
                    "callbackUrl": self.inner.webhook_callback_url,
                    "format": "JSON",
                },
            });

            let data: WebhookSubscriptionCreateData = self
                .graphql(shop, access_token, WEBHOOK_SUBSCRIPTION_CREATE, variables)
                .await?;

            let payload = data.webhook_subscription_create.ok_or_else(|| {
                ShopifyError::GraphQL(vec![GraphQLError {
                    message: "No payload returned from webhookSubscriptionCreate".to_string(),
                    path: vec![],
                }])
            })?;

            let real_errors: Vec<&UserError> = payload
                .user_errors
                .iter()
                .filter(|e| !e.message.contains("already been taken"))
                .collect();

            if !real_errors.is_empty() {
                return Err(user_error(&payload.user_errors));
            }

            tracing::debug!(topic, "Webhook subscription ensured");
        }

        Ok(())
    }
}

/// Collapse a `userErrors` list into a `ShopifyError::UserError`.
pub(crate) fn user_error(errors: &[UserError]) -> ShopifyError {
    let messages: Vec<String> = errors
        .iter()
        .map(|e| {
            let field = e.field.as_ref().map_or_else(String::new, |f| f.join("."));
            format!("{}: {}", field, e.message)
        })
        .collect();
    ShopifyError::UserError(messages.join("; "))
}

fn map_reqwest_error(err: reqwest::Error) -> ShopifyError {
    if err.is_timeout() {
        ShopifyError::Timeout
    } else {
        ShopifyError::Http(err)
    }
}
