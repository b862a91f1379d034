//! Recurring subscription management against the Shopify Billing API.
//!
//! Subscription state lives on Shopify's side; nothing here caches it. The
//! only local residue is the usage line-item id, which the charge route
//! persists on the merchant record after a subscription is created.

use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use memodeck_core::{ShopDomain, SubscriptionStatus};

use crate::config::BillingConfig;

use super::client::{AdminClient, user_error};
use super::{GraphQLError, ShopifyError};

/// Which plan variant a merchant is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Full-price recurring plan.
    Standard,
    /// Reduced-price recurring plan for flagged merchants.
    Discounted,
}

/// Pick the plan variant from the merchant's discount flag.
#[must_use]
pub const fn kind_for_merchant(discount: bool) -> SubscriptionKind {
    if discount {
        SubscriptionKind::Discounted
    } else {
        SubscriptionKind::Standard
    }
}

/// Result of creating a subscription: where to send the merchant, plus the
/// usage line-item id to persist.
#[derive(Debug, Clone)]
pub struct SubscriptionCharge {
    /// Shopify-hosted approval page the merchant must be redirected to.
    pub confirmation_url: String,
    /// Id of the usage line item inside the new subscription, if present.
    pub usage_line_item_id: Option<String>,
}

/// An active subscription as reported by Shopify.
#[derive(Debug, Clone)]
pub struct ActiveSubscription {
    /// Subscription id (`gid://shopify/AppSubscription/...`).
    pub id: String,
    /// Plan name shown to the merchant.
    pub name: String,
    /// Current status.
    pub status: SubscriptionStatus,
}

const APP_SUBSCRIPTION_CREATE: &str = r"
mutation appSubscriptionCreate($name: String!, $returnUrl: URL!, $test: Boolean, $lineItems: [AppSubscriptionLineItemInput!]!) {
  appSubscriptionCreate(name: $name, returnUrl: $returnUrl, test: $test, lineItems: $lineItems) {
    confirmationUrl
    appSubscription {
      id
      lineItems {
        id
      }
    }
    userErrors {
      field
      message
    }
  }
}
";

const CURRENT_APP_INSTALLATION: &str = r"
query currentAppInstallation {
  currentAppInstallation {
    activeSubscriptions {
      id
      name
      status
    }
  }
}
";

const APP_SUBSCRIPTION_CANCEL: &str = r"
mutation appSubscriptionCancel($id: ID!) {
  appSubscriptionCancel(id: $id) {
    appSubscription {
      id
      status
    }
    userErrors {
      field
      message
    }
  }
}
";

/// Build the `appSubscriptionCreate` variables.
///
/// `plan` overrides the configured subscription name when the merchant
/// picked one on the charge route.
fn subscription_variables(
    billing: &BillingConfig,
    kind: SubscriptionKind,
    plan: Option<&str>,
    return_url: &str,
) -> serde_json::Value {
    let price = billing.price_for(kind == SubscriptionKind::Discounted);

    // Line-item order matters: the usage plan is always second, and the
    // charge route stores lineItems[1].id as the usage reference.
    json!({
        "name": plan.unwrap_or(&billing.plan_name),
        "returnUrl": return_url,
        "test": billing.test,
        "lineItems": [
            {
                "plan": {
                    "appRecurringPricingDetails": {
                        "price": {
                            "amount": price.to_string(),
                            "currencyCode": billing.currency,
                        },
                        "interval": "EVERY_30_DAYS",
                    },
                },
            },
            {
                "plan": {
                    "appUsagePricingDetails": {
                        "cappedAmount": {
                            "amount": billing.usage_cap.to_string(),
                            "currencyCode": billing.currency,
                        },
                        "terms": billing.usage_terms,
                    },
                },
            },
        ],
    })
}

#[derive(Debug, Deserialize)]
struct SubscriptionCreateData {
    #[serde(rename = "appSubscriptionCreate")]
    app_subscription_create: Option<SubscriptionCreatePayload>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionCreatePayload {
    #[serde(rename = "confirmationUrl")]
    confirmation_url: Option<String>,
    #[serde(rename = "appSubscription")]
    app_subscription: Option<CreatedSubscription>,
    #[serde(rename = "userErrors", default)]
    user_errors: Vec<super::client::UserError>,
}

#[derive(Debug, Deserialize)]
struct CreatedSubscription {
    #[serde(rename = "lineItems", default)]
    line_items: Vec<LineItem>,
}

#[derive(Debug, Deserialize)]
struct LineItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CurrentInstallationData {
    #[serde(rename = "currentAppInstallation")]
    current_app_installation: CurrentInstallation,
}

#[derive(Debug, Deserialize)]
struct CurrentInstallation {
    #[serde(rename = "activeSubscriptions", default)]
    active_subscriptions: Vec<SubscriptionNode>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionNode {
    id: String,
    name: String,
    status: SubscriptionStatus,
}

#[derive(Debug, Deserialize)]
struct SubscriptionCancelData {
    #[serde(rename = "appSubscriptionCancel")]
    app_subscription_cancel: Option<SubscriptionCancelPayload>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionCancelPayload {
    #[serde(rename = "userErrors", default)]
    user_errors: Vec<super::client::UserError>,
}

impl AdminClient {
    /// Create a recurring subscription for a shop.
    ///
    /// The subscription carries two line items: the recurring plan priced
    /// per `kind`, and a capped usage plan. The caller persists the usage
    /// line-item id and redirects the merchant to the confirmation URL.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::UserError` if the mutation reports user errors.
    /// Returns `ShopifyError::GraphQL` if no confirmation URL is returned.
    #[instrument(skip(self, access_token, billing), fields(shop = %shop, kind = ?kind))]
    pub async fn create_subscription(
        &self,
        shop: &ShopDomain,
        access_token: &str,
        billing: &BillingConfig,
        kind: SubscriptionKind,
        plan: Option<&str>,
        return_url: &str,
    ) -> Result<SubscriptionCharge, ShopifyError> {
        let variables = subscription_variables(billing, kind, plan, return_url);

        let data: SubscriptionCreateData = self
            .graphql(shop, access_token, APP_SUBSCRIPTION_CREATE, variables)
            .await?;

        let payload = data.app_subscription_create.ok_or_else(|| {
            ShopifyError::GraphQL(vec![GraphQLError {
                message: "No payload returned from appSubscriptionCreate".to_string(),
                path: vec![],
            }])
        })?;

        if !payload.user_errors.is_empty() {
            return Err(user_error(&payload.user_errors));
        }

        let confirmation_url = payload.confirmation_url.ok_or_else(|| {
            ShopifyError::GraphQL(vec![GraphQLError {
                message: "No confirmationUrl returned from appSubscriptionCreate".to_string(),
                path: vec![],
            }])
        })?;

        let usage_line_item_id = payload
            .app_subscription
            .and_then(|sub| sub.line_items.into_iter().nth(1))
            .map(|item| item.id);

        Ok(SubscriptionCharge {
            confirmation_url,
            usage_line_item_id,
        })
    }

    /// Query the shop's current active subscription, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, access_token), fields(shop = %shop))]
    pub async fn current_subscription(
        &self,
        shop: &ShopDomain,
        access_token: &str,
    ) -> Result<Option<ActiveSubscription>, ShopifyError> {
        let data: CurrentInstallationData = self
            .graphql(shop, access_token, CURRENT_APP_INSTALLATION, json!({}))
            .await?;

        let subscription = data
            .current_app_installation
            .active_subscriptions
            .into_iter()
            .next()
            .map(|node| ActiveSubscription {
                id: node.id,
                name: node.name,
                status: node.status,
            });

        Ok(subscription)
    }

    /// Cancel a subscription by id.
    ///
    /// Success is defined by an empty `userErrors` list.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::UserError` if the mutation reports user errors.
    #[instrument(skip(self, access_token), fields(shop = %shop, subscription_id = %id))]
    pub async fn cancel_subscription(
        &self,
        shop: &ShopDomain,
        access_token: &str,
        id: &str,
    ) -> Result<(), ShopifyError> {
        let variables = json!({ "id": id });

        let data: SubscriptionCancelData = self
            .graphql(shop, access_token, APP_SUBSCRIPTION_CANCEL, variables)
            .await?;

        let payload = data.app_subscription_cancel.ok_or_else(|| {
            ShopifyError::GraphQL(vec![GraphQLError {
                message: "No payload returned from appSubscriptionCancel".to_string(),
                path: vec![],
            }])
        })?;

        if !payload.user_errors.is_empty() {
            return Err(user_error(&payload.user_errors));
        }

        Ok(())
    }
}
