//! MemoDeck Core - Shared types library.
//!
//! This crate provides common types used across the MemoDeck components:
//! - `server` - Embedded-app backend (OAuth, webhooks, billing)
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for shop domains and subscription statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
