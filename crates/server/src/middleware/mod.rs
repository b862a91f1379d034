//! HTTP middleware: browser sessions and the install access gate.

pub mod gate;
pub mod session;

pub use gate::{RequireSession, require_install};
pub use session::create_session_layer;
