use crate::shield::errors::ShieldError;
use crate::shield::types::{Channel, ShieldBlock, ShieldOutcome};

use super::cookie::write_shield_cookies;
use super::guard::SessionShield;
use super::random::secure_random_hex;
use super::store::{AuthProvider, SessionStore};

impl<H> SessionShield<'_, H>
where
    H: SessionStore + AuthProvider + ?Sized,
{
    /// Rotate every applicable channel that is due: after an identity change,
    /// a pending deferred rotation or an expired refresh interval.
    ///
    /// Returns `Verified` when nothing was due.
    pub async fn check_timeout(&mut self) -> Result<ShieldOutcome, ShieldError> {
        let Some(block) = self.host.get_block().await? else {
            return Ok(ShieldOutcome::Skipped);
        };

        let identity = self.host.current_identity().await;
        let identity_changed = block.bound_identity != identity;
        let due = self.applicable_channels().into_iter().any(|channel| {
            let verifier = block.channel(channel);
            verifier.need_refresh || verifier.is_stale(self.facts.now, self.config.refresh_interval)
        });

        if !identity_changed && !due {
            return Ok(ShieldOutcome::Verified);
        }

        tracing::debug!(
            identity_changed,
            bound = block.bound_identity,
            identity,
            "Shield rotation due"
        );
        self.rotate_or_report(&Channel::ALL).await
    }

    /// [`Self::rotate`] with race and transport failures turned into outcomes
    pub(super) async fn rotate_or_report(
        &mut self,
        channels: &[Channel],
    ) -> Result<ShieldOutcome, ShieldError> {
        match self.rotate(channels).await {
            Err(ShieldError::RaceAbort) => Ok(ShieldOutcome::RaceAborted),
            Err(ShieldError::TransportUnavailable) => Ok(ShieldOutcome::TransportUnavailable),
            result => result,
        }
    }

    /// Replace the verifiers of `channels` with fresh values.
    ///
    /// The secure channel is dropped from `channels` unless the request is
    /// secure. When the client cannot pick up new cookies on this response the
    /// rotation is only marked as pending. Otherwise the block is re-read before
    /// and after the write; a change by another request in either window
    /// abandons the rotation with [`ShieldError::RaceAbort`], restoring the
    /// pre-rotation verifiers if ours had already been written. A failed cookie
    /// write restores them as well, so the stored verifiers always match
    /// something the client holds.
    #[tracing::instrument(skip_all, fields(channels = ?channels))]
    pub async fn rotate(&mut self, channels: &[Channel]) -> Result<ShieldOutcome, ShieldError> {
        let channels: Vec<Channel> = channels
            .iter()
            .copied()
            .filter(|c| *c == Channel::Plain || self.facts.secure)
            .collect();

        let fresh: Vec<(Channel, String)> = channels
            .iter()
            .map(|c| (*c, secure_random_hex(self.random, self.config.random_bytes)))
            .collect();

        let Some(mut block) = self.host.get_block().await? else {
            tracing::warn!("Shield block vanished before rotation");
            return Err(ShieldError::RaceAbort);
        };

        if self.must_defer() {
            for channel in &channels {
                block.channel_mut(*channel).need_refresh = true;
            }
            self.host.set_block(block).await?;
            tracing::debug!("Shield rotation deferred to a later request");
            return Ok(ShieldOutcome::Deferred);
        }

        let anchor = block.anchor();
        self.host.reopen().await?;
        let snapshot = match self.host.get_block().await? {
            Some(current) if current.anchor() == anchor => current,
            _ => {
                tracing::warn!(
                    "Shield verifiers changed by a concurrent request, rotation abandoned"
                );
                return Err(ShieldError::RaceAbort);
            }
        };

        let mut rotated = snapshot.clone();
        for (channel, value) in fresh {
            rotated.channel_mut(channel).shift_to(value, self.facts.now);
        }
        rotated.bound_identity = self.host.current_identity().await;
        let expected = rotated.anchor();
        self.host.set_block(rotated.clone()).await?;

        self.host.reopen().await?;
        let confirmed = self
            .host
            .get_block()
            .await?
            .is_some_and(|stored| stored.anchor() == expected);
        if !confirmed {
            tracing::warn!("Shield rotation overwritten by a concurrent request, rolling back");
            self.restore(snapshot).await?;
            return Err(ShieldError::RaceAbort);
        }

        if let Err(e) =
            write_shield_cookies(&mut rotated, self.facts.secure, self.config, self.cookies)
        {
            tracing::warn!("Shield cookies could not be written ({}), rolling back", e);
            self.restore(snapshot).await?;
            return Err(e);
        }

        // Persist the raised init level
        self.host.set_block(rotated).await?;
        tracing::debug!("Shield verifiers rotated");
        Ok(ShieldOutcome::Rotated)
    }

    /// Whether new cookies on this response could be lost by the client
    fn must_defer(&self) -> bool {
        self.cookies.headers_sent() || self.facts.cannot_echo_cookies(self.config.defer_policy)
    }

    async fn restore(&mut self, snapshot: ShieldBlock) -> Result<(), ShieldError> {
        self.host.set_block(snapshot).await?;
        self.host.reopen().await
    }
}
