mod config;
mod errors;
mod main;
mod types;

pub use config::{SHIELD_SESSION_COOKIE_NAME, SHIELD_SESSION_TTL};
pub use errors::SessionError;
pub use main::{CachedSession, set_session_identity};
pub use types::SessionRecord;
