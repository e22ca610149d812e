use chrono::Utc;
use ring::rand::SecureRandom;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::utils::UtilError;

/// Source of random bytes for verifiers and CSRF tokens
pub trait RandomSource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), UtilError>;
}

/// The operating system's CSPRNG
pub struct SystemRandomSource {
    rng: ring::rand::SystemRandom,
}

impl SystemRandomSource {
    pub fn new() -> Self {
        Self {
            rng: ring::rand::SystemRandom::new(),
        }
    }
}

impl Default for SystemRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandomSource {
    fn fill(&self, dest: &mut [u8]) -> Result<(), UtilError> {
        self.rng
            .fill(dest)
            .map_err(|_| UtilError::Crypto("System random source unavailable".to_string()))
    }
}

pub static SYSTEM_RANDOM: LazyLock<SystemRandomSource> = LazyLock::new(SystemRandomSource::new);

const FALLBACK_ROUNDS: usize = 100;

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// `byte_len` random bytes as lowercase hex.
///
/// Never fails: when `source` cannot deliver, the value comes from
/// [`fallback_random_hex`], which is NOT cryptographically secure.
pub fn secure_random_hex(source: &dyn RandomSource, byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    match source.fill(&mut bytes) {
        Ok(()) => hex::encode(bytes),
        Err(e) => {
            tracing::error!("Random source failed ({e}), using non-cryptographic fallback");
            fallback_random_hex(byte_len)
        }
    }
}

/// Best-effort value derived from the clock, a process-wide counter and the
/// process id, hashed over many rounds. Unpredictable enough to not collide,
/// but NOT a cryptographic random source.
pub(crate) fn fallback_random_hex(byte_len: usize) -> String {
    let seed = format!(
        "{} {} {}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed),
        std::process::id()
    );

    let mut state = Sha256::digest(seed.as_bytes());
    for _ in 0..FALLBACK_ROUNDS {
        let mut hasher = Sha256::new();
        hasher.update(state);
        hasher.update(FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
        state = hasher.finalize();
    }

    let mut out = Vec::with_capacity(byte_len);
    let mut block: u64 = 0;
    while out.len() < byte_len {
        let mut hasher = Sha256::new();
        hasher.update(state);
        hasher.update(block.to_le_bytes());
        out.extend_from_slice(&hasher.finalize());
        block += 1;
    }
    out.truncate(byte_len);
    hex::encode(out)
}
