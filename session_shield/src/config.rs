//! Central configuration for the session_shield crate

use std::sync::LazyLock;

/// Route prefix for the shield's own endpoints (the companion CSRF script)
///
/// Default: "/shield"
pub static SHIELD_ROUTE_PREFIX: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SHIELD_ROUTE_PREFIX").unwrap_or_else(|_| "/shield".to_string())
});

/// File name of the companion script that attaches the CSRF token to forms and fetches
pub const SHIELD_CSRF_SCRIPT: &str = "shield_csrf.js";
