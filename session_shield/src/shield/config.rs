use chrono::Duration;
use std::sync::LazyLock;

/// When a rotation that would hand the client new cookies is postponed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferPolicy {
    /// Defer on every request that cannot echo a fresh cookie on its next action:
    /// state-changing methods, ajax calls and plugin-driven requests.
    Always,
    /// Defer only state-changing requests from clients known to drop fresh cookies.
    LegacyClientsOnly,
}

impl DeferPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "always" => Some(Self::Always),
            "legacy" => Some(Self::LegacyClientsOnly),
            _ => None,
        }
    }
}

/// Every tunable of the shield in one place
#[derive(Debug, Clone)]
pub struct ShieldConfig {
    pub plain_cookie_name: String,
    pub secure_cookie_name: String,
    /// How long a superseded verifier is still accepted after rotation
    pub grace_period: Duration,
    /// Time-based rotation interval; zero disables time-based rotation
    pub refresh_interval: Duration,
    /// Host session lifetime in seconds; 0 means a browser-session cookie
    pub session_lifetime: u64,
    /// Extra margin added on top of the session lifetime for verifier cookies
    pub cookie_extra_lifetime: u64,
    pub cookie_path: String,
    pub cookie_domain: Option<String>,
    pub csrf_enabled: bool,
    pub csrf_field_name: String,
    pub csrf_header_name: String,
    /// Number of random bytes behind each verifier and token
    pub random_bytes: usize,
    pub defer_policy: DeferPolicy,
    /// Values of the `act` query parameter the shield stays away from
    pub excluded_actions: Vec<String>,
    /// Path prefixes the shield stays away from
    pub excluded_paths: Vec<String>,
    pub trust_forwarded_proto: bool,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            plain_cookie_name: "xe_sesh1".to_string(),
            secure_cookie_name: "xe_sesh2".to_string(),
            grace_period: Duration::seconds(60),
            refresh_interval: Duration::seconds(300),
            session_lifetime: 0,
            cookie_extra_lifetime: 86400,
            cookie_path: "/".to_string(),
            cookie_domain: None,
            csrf_enabled: true,
            csrf_field_name: "xe_shield_csrftoken".to_string(),
            csrf_header_name: "X-CSRF-Token".to_string(),
            random_bytes: 20,
            defer_policy: DeferPolicy::Always,
            excluded_actions: vec!["procFileUpload".to_string()],
            excluded_paths: Vec::new(),
            trust_forwarded_proto: false,
        }
    }
}

impl ShieldConfig {
    /// Build the configuration from `SHIELD_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup; unset or invalid values keep the default
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .map(|v| Duration::seconds(v.into()))
                .unwrap_or(default)
        };
        let number = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(default)
        };
        let list = |key: &str, default: Vec<String>| {
            lookup(key)
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(default)
        };

        let random_bytes = lookup("SHIELD_RANDOM_BYTES")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n >= 16)
            .unwrap_or(defaults.random_bytes);

        let defer_policy = match lookup("SHIELD_DEFER_POLICY") {
            Some(v) => DeferPolicy::parse(&v).unwrap_or_else(|| {
                tracing::warn!("Unknown SHIELD_DEFER_POLICY {:?}, using default", v);
                defaults.defer_policy
            }),
            None => defaults.defer_policy,
        };

        Self {
            plain_cookie_name: lookup("SHIELD_PLAIN_COOKIE_NAME")
                .unwrap_or(defaults.plain_cookie_name),
            secure_cookie_name: lookup("SHIELD_SECURE_COOKIE_NAME")
                .unwrap_or(defaults.secure_cookie_name),
            grace_period: secs("SHIELD_GRACE_PERIOD", defaults.grace_period),
            refresh_interval: secs("SHIELD_REFRESH_INTERVAL", defaults.refresh_interval),
            session_lifetime: number("SHIELD_SESSION_LIFETIME", defaults.session_lifetime),
            cookie_extra_lifetime: number(
                "SHIELD_COOKIE_EXTRA_LIFETIME",
                defaults.cookie_extra_lifetime,
            ),
            cookie_path: lookup("SHIELD_COOKIE_PATH").unwrap_or(defaults.cookie_path),
            cookie_domain: lookup("SHIELD_COOKIE_DOMAIN").filter(|d| !d.is_empty()),
            csrf_enabled: flag("SHIELD_CSRF_ENABLED", defaults.csrf_enabled),
            csrf_field_name: lookup("SHIELD_CSRF_FIELD_NAME").unwrap_or(defaults.csrf_field_name),
            csrf_header_name: lookup("SHIELD_CSRF_HEADER_NAME")
                .unwrap_or(defaults.csrf_header_name),
            random_bytes,
            defer_policy,
            excluded_actions: list("SHIELD_EXCLUDED_ACTIONS", defaults.excluded_actions),
            excluded_paths: list("SHIELD_EXCLUDED_PATHS", defaults.excluded_paths),
            trust_forwarded_proto: lookup("SHIELD_TRUST_FORWARDED_PROTO")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(defaults.trust_forwarded_proto),
        }
    }

    /// `Max-Age` for verifier cookies; `None` keeps them as browser-session cookies
    pub fn cookie_max_age(&self) -> Option<i64> {
        if self.session_lifetime == 0 {
            return None;
        }
        self.session_lifetime
            .checked_add(self.cookie_extra_lifetime)
            .and_then(|secs| i64::try_from(secs).ok())
    }
}

pub static SHIELD_CONFIG: LazyLock<ShieldConfig> = LazyLock::new(ShieldConfig::from_env);
