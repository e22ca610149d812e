mod classifier;
mod cookie;
mod csrf;
mod guard;
mod random;
mod rotation;
mod store;
mod teardown;
mod verifier;


pub use classifier::{
    RequestFacts, SecureChannel, is_ajax, is_legacy_client, is_plugin_content, is_secure_channel,
    is_shield_enabled, is_unsafe_method, presented_cookie,
};
pub use cookie::{CookieSink, ResponseCookies, ShieldCookie, append_cookie};
pub use csrf::{csrf_meta_tag, csrf_script_tag, inject_token_into_html, verify_csrf_token};
pub use guard::SessionShield;
pub use random::{RandomSource, SYSTEM_RANDOM, SystemRandomSource, secure_random_hex};
pub use store::{AuthProvider, SessionStore};
