//! Core types for MemoDeck.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod shop;
pub mod status;

pub use shop::{ShopDomain, ShopDomainError};
pub use status::SubscriptionStatus;
