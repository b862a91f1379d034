//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPIFY_API_KEY` - App API key (OAuth client id)
//! - `SHOPIFY_API_SECRET` - App API secret (OAuth client secret, webhook HMAC
//!   key, session-cookie signing key; min 32 chars, high entropy)
//! - `HOST` - Public base URL of the app (e.g. `https://app.example.com`)
//!
//! ## Optional
//! - `MEMODECK_BIND` - Bind address (default: 127.0.0.1)
//! - `BACKEND_PORT` / `PORT` - Listen port (default: 8081)
//! - `DATABASE_URL` - sqlite connection string (default: `sqlite://database.sqlite`)
//! - `SCOPES` - Comma-separated OAuth scopes (default: `write_products`)
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2026-01)
//! - `APP_ENV` - `production` enables real billing charges (default: test mode)
//! - `BILLING_PLAN_NAME` - Subscription name (default: Unlimited)
//! - `BILLING_AMOUNT` - Monthly price (default: 3.99)
//! - `BILLING_DISCOUNT_AMOUNT` - Discounted monthly price (default: 1.99)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_API_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// sqlite database connection URL
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the app (OAuth redirect and webhook callback base)
    pub base_url: String,
    /// Shopify app credentials
    pub shopify: ShopifyAppConfig,
    /// Recurring subscription settings
    pub billing: BillingConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Shopify app credentials and API settings.
///
/// Implements `Debug` manually to redact the API secret.
#[derive(Clone)]
pub struct ShopifyAppConfig {
    /// App API key (OAuth client id)
    pub api_key: String,
    /// App API secret. Signs session cookies, verifies webhook and OAuth
    /// callback HMACs and authenticates the token exchange.
    pub api_secret: SecretString,
    /// OAuth scopes requested during install
    pub scopes: Vec<String>,
    /// Admin API version (e.g. 2026-01)
    pub api_version: String,
}

impl std::fmt::Debug for ShopifyAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyAppConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Recurring subscription settings.
///
/// Charges are test transactions unless `APP_ENV=production`.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Subscription name shown to the merchant
    pub plan_name: String,
    /// Standard monthly price
    pub amount: Decimal,
    /// Discounted monthly price for discount-flagged shops
    pub discount_amount: Decimal,
    /// ISO currency code (only USD is currently supported)
    pub currency: String,
    /// Cap for the usage-based line item
    pub usage_cap: Decimal,
    /// Merchant-facing terms for the usage-based line item
    pub usage_terms: String,
    /// Whether subscriptions are created as test charges
    pub test: bool,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = SecretString::from(get_env_or_default(
            "DATABASE_URL",
            "sqlite://database.sqlite",
        ));
        let host = get_env_or_default("MEMODECK_BIND", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("MEMODECK_BIND".to_string(), e.to_string()))?;
        let port_var = std::env::var("BACKEND_PORT")
            .or_else(|_| std::env::var("PORT"))
            .unwrap_or_else(|_| "8081".to_string());
        let port = port_var
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("BACKEND_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("HOST")?
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), e.to_string()))?;

        let shopify = ShopifyAppConfig::from_env()?;
        let billing = BillingConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            shopify,
            billing,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Webhook callback URL registered for every shop.
    #[must_use]
    pub fn webhook_callback_url(&self) -> String {
        format!("{}/api/webhooks", self.base_url)
    }

    /// OAuth redirect URL for the install handshake.
    #[must_use]
    pub fn auth_callback_url(&self) -> String {
        format!("{}/api/auth/callback", self.base_url)
    }
}

impl ShopifyAppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_secret = get_validated_secret("SHOPIFY_API_SECRET")?;
        validate_api_secret_length(&api_secret, "SHOPIFY_API_SECRET")?;

        let scopes = get_env_or_default("SCOPES", "write_products")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            api_key: get_required_env("SHOPIFY_API_KEY")?,
            api_secret,
            scopes,
            api_version: get_env_or_default("SHOPIFY_API_VERSION", "2026-01"),
        })
    }
}

impl BillingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let amount = get_decimal_or_default("BILLING_AMOUNT", "3.99")?;
        let discount_amount = get_decimal_or_default("BILLING_DISCOUNT_AMOUNT", "1.99")?;
        let usage_cap = get_decimal_or_default("BILLING_USAGE_CAP", "100.00")?;
        let test = get_env_or_default("APP_ENV", "development") != "production";

        Ok(Self {
            plan_name: get_env_or_default("BILLING_PLAN_NAME", "Unlimited"),
            amount,
            discount_amount,
            currency: "USD".to_string(),
            usage_cap,
            usage_terms: "$1 per 100 tracked products".to_string(),
            test,
        })
    }

    /// Price for a shop, honoring its discount flag.
    #[must_use]
    pub const fn price_for(&self, discount: bool) -> Decimal {
        if discount {
            self.discount_amount
        } else {
            self.amount
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a decimal environment variable with a default value.
fn get_decimal_or_default(key: &str, default: &str) -> Result<Decimal, ConfigError> {
    let raw = get_env_or_default(key, default);
    Decimal::from_str(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that the API secret meets minimum length requirements.
///
/// The secret doubles as the session-cookie signing key, which needs at
/// least 32 bytes of input.
fn validate_api_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_API_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_API_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_high() {
        // Random-looking string should have high entropy
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        // High-entropy random string
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_api_secret_too_short() {
        let secret = SecretString::from("short");
        let result = validate_api_secret_length(&secret, "TEST_SECRET");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_api_secret_valid_length() {
        let secret = SecretString::from("a".repeat(32));
        let result = validate_api_secret_length(&secret, "TEST_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_price_for_discount_flag() {
        let billing = BillingConfig {
            plan_name: "Unlimited".to_string(),
            amount: Decimal::from_str("3.99").unwrap(),
            discount_amount: Decimal::from_str("1.99").unwrap(),
            currency: "USD".to_string(),
            usage_cap: Decimal::from_str("100.00").unwrap(),
            usage_terms: String::new(),
            test: true,
        };

        assert_eq!(billing.price_for(false), Decimal::from_str("3.99").unwrap());
        assert_eq!(billing.price_for(true), Decimal::from_str("1.99").unwrap());
    }

    #[test]
    fn test_callback_urls() {
        let config = AppConfig {
            database_url: SecretString::from("sqlite::memory:"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8081,
            base_url: "https://app.example.dev".to_string(),
            shopify: ShopifyAppConfig {
                api_key: "key".to_string(),
                api_secret: SecretString::from("s".repeat(32)),
                scopes: vec!["write_products".to_string()],
                api_version: "2026-01".to_string(),
            },
            billing: BillingConfig {
                plan_name: "Unlimited".to_string(),
                amount: Decimal::from_str("3.99").unwrap(),
                discount_amount: Decimal::from_str("1.99").unwrap(),
                currency: "USD".to_string(),
                usage_cap: Decimal::from_str("100.00").unwrap(),
                usage_terms: String::new(),
                test: true,
            },
            sentry_dsn: None,
            sentry_environment: None,
        };

        assert_eq!(
            config.webhook_callback_url(),
            "https://app.example.dev/api/webhooks"
        );
        assert_eq!(
            config.auth_callback_url(),
            "https://app.example.dev/api/auth/callback"
        );
        assert_eq!(config.socket_addr().port(), 8081);
    }

    #[test]
    fn test_shopify_config_debug_redacts_secret() {
        let config = ShopifyAppConfig {
            api_key: "api_key_value".to_string(),
            api_secret: SecretString::from("super_secret_api_secret_value_123"),
            scopes: vec!["write_products".to_string()],
            api_version: "2026-01".to_string(),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("api_key_value"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_api_secret_value_123"));
    }
}
