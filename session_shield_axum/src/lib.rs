//! session_shield_axum - Axum integration for session-shield
//!
//! Wrap the application's routes with [`session_shield`] and mount
//! [`session_shield_router`] under [`SHIELD_ROUTE_PREFIX`] so pages can load
//! the companion CSRF script.

mod config;
mod error;
mod middleware;
mod router;
mod session;

pub use config::{SHIELD_INJECT_TOKEN, SHIELD_MAX_FORM_BYTES};
pub use error::IntoResponseError;
pub use middleware::session_shield;
pub use router::session_shield_router;
pub use session::ShieldContext;

// Re-export what applications need from the core crate
pub use session_shield::{
    SHIELD_ROUTE_PREFIX, SecureChannel, SessionError, ShieldOutcome, init, set_session_identity,
};
