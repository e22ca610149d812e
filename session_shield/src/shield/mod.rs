mod config;
mod errors;
mod main;
mod types;

pub use config::{DeferPolicy, SHIELD_CONFIG, ShieldConfig};
pub use errors::ShieldError;
pub use main::{
    AuthProvider, CookieSink, RandomSource, RequestFacts, ResponseCookies, SYSTEM_RANDOM,
    SecureChannel, SessionShield, SessionStore, ShieldCookie, SystemRandomSource, append_cookie,
    csrf_meta_tag, csrf_script_tag, inject_token_into_html, is_ajax, is_legacy_client,
    is_plugin_content, is_secure_channel, is_shield_enabled, is_unsafe_method, presented_cookie,
    secure_random_hex, verify_csrf_token,
};
pub use types::{
    Channel, InitLevel, SHIELD_BLOCK_KEY, ShieldBlock, ShieldOutcome, VerifierChannel,
};
