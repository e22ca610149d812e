use std::sync::LazyLock;

/// Cookie carrying the host session id
pub static SHIELD_SESSION_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SHIELD_SESSION_COOKIE_NAME")
        .ok()
        .unwrap_or("XE_SESSID".to_string())
});

/// Seconds an idle host session record is kept in the cache store
pub static SHIELD_SESSION_TTL: LazyLock<usize> = LazyLock::new(|| {
    std::env::var("SHIELD_SESSION_TTL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(86400)
});
