//! Shop domain type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Suffix every permanent shop domain carries.
const MYSHOPIFY_SUFFIX: &str = ".myshopify.com";

/// Errors that can occur when parsing a [`ShopDomain`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopDomainError {
    /// The input string is empty.
    #[error("shop domain cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("shop domain must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input does not end with `.myshopify.com`.
    #[error("shop domain must end with .myshopify.com")]
    WrongSuffix,
    /// The store name (before the suffix) is empty or malformed.
    #[error("shop domain has an invalid store name")]
    InvalidStoreName,
}

/// A permanent shop domain (e.g. `example.myshopify.com`).
///
/// Primary key for all per-tenant state: sessions, installation records and
/// merchant rows are all keyed by the shop domain. Parsing lowercases the
/// input and enforces the platform's naming rules, so a `ShopDomain` can be
/// trusted wherever it flows.
///
/// ## Constraints
///
/// - Must end with `.myshopify.com`
/// - Store name must start with an ASCII letter or digit
/// - Store name may only contain ASCII letters, digits and hyphens
///
/// ## Examples
///
/// ```
/// use memodeck_core::ShopDomain;
///
/// assert!(ShopDomain::parse("test.myshopify.com").is_ok());
/// assert!(ShopDomain::parse("My-Store.myshopify.com").is_ok()); // lowercased
///
/// assert!(ShopDomain::parse("").is_err());
/// assert!(ShopDomain::parse("example.com").is_err());
/// assert!(ShopDomain::parse(".myshopify.com").is_err());
/// assert!(ShopDomain::parse("bad_name.myshopify.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String")]
pub struct ShopDomain(String);

impl TryFrom<String> for ShopDomain {
    type Error = ShopDomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl ShopDomain {
    /// Maximum length of a shop domain.
    pub const MAX_LENGTH: usize = 255;

    /// Parse a `ShopDomain` from a string.
    ///
    /// Trailing slashes are stripped and the result is lowercased, mirroring
    /// the platform's own shop sanitization.
    ///
    /// # Errors
    ///
    /// Returns an error if the input:
    /// - Is empty
    /// - Is longer than 255 characters
    /// - Does not end with `.myshopify.com`
    /// - Has an empty store name, or one containing characters outside
    ///   `[a-z0-9-]`, or one starting with a hyphen
    pub fn parse(s: &str) -> Result<Self, ShopDomainError> {
        let s = s.trim_end_matches('/');

        if s.is_empty() {
            return Err(ShopDomainError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(ShopDomainError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let lower = s.to_ascii_lowercase();

        let store = lower
            .strip_suffix(MYSHOPIFY_SUFFIX)
            .ok_or(ShopDomainError::WrongSuffix)?;

        let mut chars = store.chars();
        let first = chars.next().ok_or(ShopDomainError::InvalidStoreName)?;
        if !first.is_ascii_alphanumeric() {
            return Err(ShopDomainError::InvalidStoreName);
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ShopDomainError::InvalidStoreName);
        }

        Ok(Self(lower))
    }

    /// Returns the shop domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ShopDomain` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the store name without the `.myshopify.com` suffix.
    #[must_use]
    pub fn store_name(&self) -> &str {
        self.0.strip_suffix(MYSHOPIFY_SUFFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShopDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
