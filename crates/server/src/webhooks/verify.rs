//! Webhook signature verification.
//!
//! Shopify signs every webhook delivery with HMAC-SHA256 over the raw
//! request body, keyed by the app API secret, and sends the digest
//! base64-encoded in the `X-Shopify-Hmac-Sha256` header. Verification must
//! run against the exact bytes received, before any JSON parsing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify a webhook delivery signature.
///
/// Returns `false` for a missing header, malformed base64, or a digest
/// mismatch. The comparison is constant-time via `Mac::verify_slice`.
#[must_use]
pub fn verify_webhook_signature(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(header) = header else {
        return false;
    };

    let Ok(expected) = BASE64.decode(header) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    mac.verify_slice(&expected).is_ok()
}

/// Compute the signature header value for a body. Used by tests to forge
/// valid deliveries.
#[cfg(test)]
pub(crate) fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}
