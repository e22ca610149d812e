use crate::shield::errors::ShieldError;
use crate::shield::types::Channel;

use super::cookie::ShieldCookie;
use super::guard::SessionShield;
use super::store::{AuthProvider, SessionStore};

impl<H> SessionShield<'_, H>
where
    H: SessionStore + AuthProvider + ?Sized,
{
    /// Expire both verifier cookies when the response can still carry them,
    /// then log out and drop the whole host session.
    #[tracing::instrument(skip_all)]
    pub async fn destroy_session(&mut self) -> Result<(), ShieldError> {
        if !self.cookies.headers_sent() {
            let expired = Channel::ALL
                .into_iter()
                .map(|channel| ShieldCookie::expired(channel, self.config))
                .collect();
            if let Err(e) = self.cookies.set_cookies(expired) {
                tracing::warn!("Failed to expire shield cookies: {}", e);
            }
        }

        self.host.logout().await?;
        self.host.destroy_all().await?;
        tracing::info!("Session destroyed by shield");
        Ok(())
    }
}
