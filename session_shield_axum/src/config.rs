//! Central configuration for the session_shield_axum crate

use std::sync::LazyLock;

/// Largest urlencoded form body the middleware reads to find the CSRF field
/// Default: 2 MiB
pub static SHIELD_MAX_FORM_BYTES: LazyLock<usize> = LazyLock::new(|| {
    std::env::var("SHIELD_MAX_FORM_BYTES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(2 * 1024 * 1024)
});

/// Whether HTML responses get the CSRF meta element and companion script
/// Default: true
pub static SHIELD_INJECT_TOKEN: LazyLock<bool> = LazyLock::new(|| {
    std::env::var("SHIELD_INJECT_TOKEN")
        .map(|val| val.to_lowercase() != "false")
        .unwrap_or(true)
});
