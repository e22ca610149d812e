use crate::shield::config::ShieldConfig;
use crate::shield::errors::ShieldError;
use crate::shield::types::{Channel, ShieldBlock, ShieldOutcome};

use super::classifier::RequestFacts;
use super::cookie::{CookieSink, write_shield_cookies};
use super::random::{RandomSource, secure_random_hex};
use super::store::{AuthProvider, SessionStore};

/// Drives the shield protocol for a single request.
///
/// Borrows the request's classification, the host session and the response
/// cookie sink for the duration of the request. Holds no state of its own:
/// everything that must outlive the request goes through the host session.
pub struct SessionShield<'r, H: ?Sized> {
    pub(super) config: &'r ShieldConfig,
    pub(super) random: &'r dyn RandomSource,
    pub(super) facts: &'r RequestFacts,
    pub(super) host: &'r mut H,
    pub(super) cookies: &'r mut dyn CookieSink,
}

impl<'r, H> SessionShield<'r, H>
where
    H: SessionStore + AuthProvider + ?Sized,
{
    pub fn new(
        config: &'r ShieldConfig,
        random: &'r dyn RandomSource,
        facts: &'r RequestFacts,
        host: &'r mut H,
        cookies: &'r mut dyn CookieSink,
    ) -> Self {
        Self {
            config,
            random,
            facts,
            host,
            cookies,
        }
    }

    /// Per-request entry point: establish the block on first contact, otherwise
    /// verify the cookies and run the forced-rotation check.
    ///
    /// Protocol failures come back as a [`ShieldOutcome`]; only host storage
    /// errors are returned as `Err`.
    #[tracing::instrument(skip_all)]
    pub async fn initialize(&mut self) -> Result<ShieldOutcome, ShieldError> {
        if !self.host.exists().await {
            tracing::debug!("No active host session, shield skipped");
            return Ok(ShieldOutcome::Skipped);
        }
        if !self.facts.shield_enabled {
            return Ok(ShieldOutcome::Skipped);
        }

        let Some(block) = self.host.get_block().await? else {
            return self.establish().await;
        };

        match self.check_cookies(&block).await? {
            outcome @ (ShieldOutcome::Verified | ShieldOutcome::Resent) => {
                match self.check_timeout().await? {
                    ShieldOutcome::Verified => Ok(outcome),
                    rotation => Ok(rotation),
                }
            }
            outcome => Ok(outcome),
        }
    }

    /// First contact: the block is created and trusted without checks
    async fn establish(&mut self) -> Result<ShieldOutcome, ShieldError> {
        let plain = secure_random_hex(self.random, self.config.random_bytes);
        let secure = self
            .facts
            .secure
            .then(|| secure_random_hex(self.random, self.config.random_bytes));
        let identity = self.host.current_identity().await;

        let mut block = ShieldBlock::new(plain, secure, identity, self.facts.now);
        if let Err(e) =
            write_shield_cookies(&mut block, self.facts.secure, self.config, self.cookies)
        {
            // The block stays at its current init level and the channel is
            // established on a later request
            tracing::debug!("Shield cookies not written on first contact: {}", e);
        }

        tracing::debug!(init_level = ?block.init_level, "Shield block established");
        self.host.set_block(block).await?;
        Ok(ShieldOutcome::Established)
    }

    /// Channels this request can carry: the secure channel only over TLS
    pub(super) fn applicable_channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| *c == Channel::Plain || self.facts.secure)
            .collect()
    }
}
