//! Domain models for the embedded app.

pub mod merchant;
pub mod session;

pub use merchant::Merchant;
pub use session::{CurrentSession, OfflineSession, session_keys};
