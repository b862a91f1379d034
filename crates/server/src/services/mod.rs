//! Business logic shared by routes and webhook handlers.

pub mod compliance;
pub mod fulfillment;
pub mod session;
