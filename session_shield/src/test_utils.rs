//! Test utilities shared across the crate
//!
//! Provides the environment setup for tests touching the global cache store,
//! fixed clocks, deterministic random sources and a scripted in-memory host
//! session whose `reopen()` can simulate concurrent requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::Method;
use http::header::{HeaderMap, SET_COOKIE};
use std::collections::HashMap;
use std::sync::Once;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::shield::{
    AuthProvider, CookieSink, InitLevel, RandomSource, RequestFacts, SessionStore, ShieldBlock,
    ShieldCookie, ShieldError,
};
use crate::utils::UtilError;

/// Load `.env_test` (falling back to `.env`) once for the whole test run
pub async fn init_test_environment() {
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        if dotenvy::from_filename(".env_test").is_err() {
            dotenvy::dotenv().ok();
        }
    });

    if let Err(e) = crate::storage::init().await {
        eprintln!("Warning: Failed to initialize cache store: {e}");
    }
}

/// Fixed point in time, `secs` seconds after the epoch
pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

/// A random source that always fails
pub struct FailingRandom;

impl RandomSource for FailingRandom {
    fn fill(&self, _dest: &mut [u8]) -> Result<(), UtilError> {
        Err(UtilError::Crypto("no entropy".to_string()))
    }
}

/// Deterministic, never-repeating bytes
pub struct SequenceRandom {
    next: AtomicU64,
}

impl SequenceRandom {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl RandomSource for SequenceRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<(), UtilError> {
        let bytes = self.next.fetch_add(1, Ordering::Relaxed).to_be_bytes();
        for (i, b) in dest.iter_mut().enumerate() {
            *b = bytes[i % bytes.len()];
        }
        Ok(())
    }
}

/// A response that refuses every cookie without having started
pub struct FailingSink;

impl CookieSink for FailingSink {
    fn headers_sent(&self) -> bool {
        false
    }

    fn set_cookies(&mut self, _cookies: Vec<ShieldCookie>) -> Result<(), ShieldError> {
        Err(ShieldError::TransportUnavailable)
    }
}

/// A plain browser request carrying no cookies or token
pub fn facts(method: Method, secure: bool, now: DateTime<Utc>) -> RequestFacts {
    RequestFacts {
        method,
        secure,
        ajax: false,
        plugin_content: false,
        legacy_client: false,
        shield_enabled: true,
        plain_cookie: None,
        secure_cookie: None,
        csrf_token: None,
        now,
    }
}

/// A block whose plain cookie already reached the client
pub fn established_block(plain: &str, secure: Option<&str>, now: DateTime<Utc>) -> ShieldBlock {
    let mut block = ShieldBlock::new(plain.to_string(), secure.map(str::to_string), 0, now);
    block.init_level = InitLevel::Basic;
    block
}

/// Name to value of every `Set-Cookie` header
pub fn set_cookie_values(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

type ReopenHook = Box<dyn Fn(&mut ShieldBlock) + Send + Sync>;

/// In-memory host session with an authoritative record and a request-local
/// copy. Hooks registered with [`MockHost::on_reopen`] run against the
/// authoritative record on the n-th reopen, after our own writes were flushed,
/// standing in for a concurrent request.
pub struct MockHost {
    pub active: bool,
    pub identity: i64,
    pub logged_out: bool,
    pub destroyed: bool,
    pub reopen_count: usize,
    authoritative: Option<ShieldBlock>,
    local: Option<ShieldBlock>,
    dirty: bool,
    hooks: HashMap<usize, ReopenHook>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            active: true,
            identity: 0,
            logged_out: false,
            destroyed: false,
            reopen_count: 0,
            authoritative: None,
            local: None,
            dirty: false,
            hooks: HashMap::new(),
        }
    }

    pub fn with_identity(identity: i64) -> Self {
        Self {
            identity,
            ..Self::new()
        }
    }

    pub fn with_block(block: ShieldBlock) -> Self {
        Self {
            authoritative: Some(block.clone()),
            local: Some(block),
            ..Self::new()
        }
    }

    pub fn on_reopen<F>(&mut self, nth: usize, hook: F)
    where
        F: Fn(&mut ShieldBlock) + Send + Sync + 'static,
    {
        self.hooks.insert(nth, Box::new(hook));
    }

    /// The block as the host would commit it at the end of the request
    pub fn stored(&self) -> Option<ShieldBlock> {
        self.local.clone()
    }

    /// Start the next request: flush and drop everything request-local
    pub fn next_request(&mut self) {
        if self.dirty {
            self.authoritative = self.local.clone();
            self.dirty = false;
        }
        self.local = self.authoritative.clone();
        self.reopen_count = 0;
        self.hooks.clear();
    }
}

#[async_trait]
impl SessionStore for MockHost {
    async fn exists(&self) -> bool {
        self.active && !self.destroyed
    }

    async fn get_block(&self) -> Result<Option<ShieldBlock>, ShieldError> {
        Ok(self.local.clone())
    }

    async fn set_block(&mut self, block: ShieldBlock) -> Result<(), ShieldError> {
        self.local = Some(block);
        self.dirty = true;
        Ok(())
    }

    async fn reopen(&mut self) -> Result<(), ShieldError> {
        self.reopen_count += 1;
        if self.dirty {
            self.authoritative = self.local.clone();
            self.dirty = false;
        }
        if let (Some(hook), Some(block)) = (
            self.hooks.get(&self.reopen_count),
            self.authoritative.as_mut(),
        ) {
            hook(block);
        }
        self.local = self.authoritative.clone();
        Ok(())
    }

    async fn destroy_all(&mut self) -> Result<(), ShieldError> {
        self.destroyed = true;
        self.authoritative = None;
        self.local = None;
        self.dirty = false;
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for MockHost {
    async fn current_identity(&self) -> i64 {
        self.identity
    }

    async fn logout(&mut self) -> Result<(), ShieldError> {
        self.identity = 0;
        self.logged_out = true;
        Ok(())
    }
}
