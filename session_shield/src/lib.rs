//! session_shield - Hardening for cookie-based web sessions
//!
//! Binds a pair of rotating verifier cookies (one for the plain channel, one
//! restricted to TLS) to the host session, so a stolen or fixated session id
//! alone is useless. Superseded verifiers stay valid for a short grace window
//! to absorb in-flight requests, rotations detect concurrent rotations on the
//! same session, and a per-session CSRF token guards state-changing requests.

mod config;
mod session;
mod shield;
mod storage;
mod utils;

#[cfg(test)]
mod test_utils;

pub use config::{SHIELD_CSRF_SCRIPT, SHIELD_ROUTE_PREFIX};

pub use shield::{
    AuthProvider, Channel, CookieSink, DeferPolicy, InitLevel, RandomSource, RequestFacts,
    ResponseCookies, SHIELD_BLOCK_KEY, SHIELD_CONFIG, SYSTEM_RANDOM, SecureChannel,
    SessionShield, SessionStore, ShieldBlock, ShieldConfig, ShieldCookie, ShieldError,
    ShieldOutcome, SystemRandomSource, VerifierChannel, append_cookie, csrf_meta_tag,
    csrf_script_tag, inject_token_into_html, is_ajax, is_legacy_client, is_plugin_content,
    is_secure_channel, is_shield_enabled, is_unsafe_method, presented_cookie,
    secure_random_hex, verify_csrf_token,
};

pub use session::{
    CachedSession, SHIELD_SESSION_COOKIE_NAME, SHIELD_SESSION_TTL, SessionError, SessionRecord,
    set_session_identity,
};

pub use storage::StorageError;

pub use utils::{UtilError, gen_random_string};

/// Initialize the shield: resolve its configuration and connect the cache store
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let _ = &*SHIELD_CONFIG;
    storage::init().await?;
    Ok(())
}
