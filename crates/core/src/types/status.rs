//! Subscription status as reported by the platform's billing API.

use serde::{Deserialize, Serialize};

/// Status of an app subscription (from the Shopify Admin API).
///
/// Local code never caches this; it is derived by re-querying the remote
/// subscription, which stays the single source of truth for billing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// Created but not yet approved by the merchant.
    Pending,
    /// Approved and billing.
    Active,
    /// The merchant declined the confirmation page.
    Declined,
    /// Cancelled, either by the app or by uninstalling.
    Cancelled,
    /// Expired without merchant approval.
    Expired,
    /// Frozen because of an outstanding merchant payment.
    Frozen,
}

impl SubscriptionStatus {
    /// Whether the subscription currently entitles the shop to the app.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}
