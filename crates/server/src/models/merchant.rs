//! Merchant model.

use serde::Serialize;

use memodeck_core::ShopDomain;

/// One merchant record per shop.
///
/// Created lazily on the first gated request after install. The access token
/// mirrors the session token at creation time and may drift; the session row
/// stays authoritative for API calls. `usage_sub_id` references the usage
/// line item inside the shop's recurring subscription and is null until
/// billing completes.
#[derive(Clone, Serialize)]
pub struct Merchant {
    /// Shop this record belongs to.
    pub shop: ShopDomain,
    /// Access token snapshot from creation time (never serialized).
    #[serde(skip_serializing)]
    pub access_token: String,
    /// Usage line-item id within the external subscription, if billed.
    pub usage_sub_id: Option<String>,
    /// Eligibility for the discounted subscription plan.
    pub discount: bool,
}

impl std::fmt::Debug for Merchant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Merchant")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("usage_sub_id", &self.usage_sub_id)
            .field("discount", &self.discount)
            .finish()
    }
}
