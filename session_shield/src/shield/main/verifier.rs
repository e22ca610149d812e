use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;

use crate::shield::errors::ShieldError;
use crate::shield::types::{Channel, ShieldBlock, ShieldOutcome};

use super::cookie::write_shield_cookies;
use super::guard::SessionShield;
use super::store::{AuthProvider, SessionStore};

/// Verdict on one channel's presented cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CookieCheck {
    /// Matches the live verifier
    Accept,
    /// Matches the superseded verifier inside the grace window
    Resend,
    /// The channel was never established with this client
    Establish,
    Reject,
}

pub(crate) fn check_channel(
    block: &ShieldBlock,
    channel: Channel,
    presented: Option<&str>,
    now: DateTime<Utc>,
    grace_period: Duration,
) -> CookieCheck {
    if block.init_level < channel.required_level() {
        return CookieCheck::Establish;
    }

    let verifier = block.channel(channel);
    let Some(presented) = presented else {
        return CookieCheck::Reject;
    };

    if verifier
        .value
        .as_deref()
        .is_some_and(|value| verifier_eq(value, presented))
    {
        return CookieCheck::Accept;
    }
    if verifier
        .live_previous(now, grace_period)
        .is_some_and(|previous| verifier_eq(previous, presented))
    {
        return CookieCheck::Resend;
    }
    CookieCheck::Reject
}

fn verifier_eq(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

impl<H> SessionShield<'_, H>
where
    H: SessionStore + AuthProvider + ?Sized,
{
    /// Compare the presented cookies with the block.
    ///
    /// A mismatch on any checked channel tears the session down. Channels the
    /// client never received are established by rotation instead of checked.
    pub async fn check_cookies(
        &mut self,
        block: &ShieldBlock,
    ) -> Result<ShieldOutcome, ShieldError> {
        let mut establish = Vec::new();
        let mut resend = false;

        for channel in self.applicable_channels() {
            let presented = match channel {
                Channel::Plain => self.facts.plain_cookie.as_deref(),
                Channel::Secure => self.facts.secure_cookie.as_deref(),
            };
            match check_channel(
                block,
                channel,
                presented,
                self.facts.now,
                self.config.grace_period,
            ) {
                CookieCheck::Accept => {}
                CookieCheck::Resend => resend = true,
                CookieCheck::Establish => establish.push(channel),
                CookieCheck::Reject => {
                    tracing::warn!(
                        ?channel,
                        presented = presented.is_some(),
                        "Shield verifier mismatch, destroying session"
                    );
                    self.destroy_session().await?;
                    return Ok(ShieldOutcome::Destroyed);
                }
            }
        }

        if !establish.is_empty() {
            tracing::debug!(channels = ?establish, "Establishing shield channels");
            return self.rotate_or_report(&establish).await;
        }

        if resend {
            self.resend(block.clone()).await?;
            return Ok(ShieldOutcome::Resent);
        }

        Ok(ShieldOutcome::Verified)
    }

    /// Hand the live verifiers to a client still holding the superseded ones
    async fn resend(&mut self, mut block: ShieldBlock) -> Result<(), ShieldError> {
        let level = block.init_level;
        match write_shield_cookies(&mut block, self.facts.secure, self.config, self.cookies) {
            Ok(()) if block.init_level != level => self.host.set_block(block).await,
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!("Live shield cookies not re-sent: {}", e);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResponseCookies;
    use crate::shield::config::ShieldConfig;
    use crate::shield::types::InitLevel;
    use crate::test_utils::{
        MockHost, SequenceRandom, at, established_block, facts, set_cookie_values,
    };
    use http::Method;
    use proptest::prelude::*;

    fn rotated_block() -> ShieldBlock {
        // A rotated to B at t=1000
        let mut block = established_block("A", None, at(0));
        block.plain.shift_to("B".to_string(), at(1000));
        block
    }

    #[test]
    fn test_check_channel_within_grace() {
        let block = rotated_block();
        let grace = Duration::seconds(60);

        assert_eq!(
            check_channel(&block, Channel::Plain, Some("B"), at(1030), grace),
            CookieCheck::Accept
        );
        assert_eq!(
            check_channel(&block, Channel::Plain, Some("A"), at(1030), grace),
            CookieCheck::Resend
        );
        assert_eq!(
            check_channel(&block, Channel::Plain, Some("A"), at(1065), grace),
            CookieCheck::Reject
        );
        assert_eq!(
            check_channel(&block, Channel::Plain, Some("C"), at(1030), grace),
            CookieCheck::Reject
        );
        assert_eq!(
            check_channel(&block, Channel::Plain, None, at(1030), grace),
            CookieCheck::Reject
        );
    }

    #[test]
    fn test_check_channel_before_establishment() {
        let mut block = rotated_block();
        block.init_level = InitLevel::None;
        assert_eq!(
            check_channel(&block, Channel::Plain, None, at(1030), Duration::seconds(60)),
            CookieCheck::Establish
        );

        block.init_level = InitLevel::Basic;
        assert_eq!(
            check_channel(&block, Channel::Secure, None, at(1030), Duration::seconds(60)),
            CookieCheck::Establish
        );
    }

    proptest! {
        /// The superseded value is accepted exactly up to the end of the grace window
        #[test]
        fn prop_previous_accepted_only_within_grace(grace in 0i64..3600, offset in 0i64..7200) {
            let block = rotated_block();
            let now = at(1000 + offset);
            let verdict =
                check_channel(&block, Channel::Plain, Some("A"), now, Duration::seconds(grace));
            if offset <= grace {
                prop_assert_eq!(verdict, CookieCheck::Resend);
            } else {
                prop_assert_eq!(verdict, CookieCheck::Reject);
            }
            // The live value is never subject to the window
            prop_assert_eq!(
                check_channel(&block, Channel::Plain, Some("B"), now, Duration::seconds(grace)),
                CookieCheck::Accept
            );
        }
    }

    #[tokio::test]
    async fn test_previous_cookie_within_grace_is_resent() {
        let config = ShieldConfig::default();
        let random = SequenceRandom::new();
        let mut request = facts(Method::GET, false, at(1030));
        request.plain_cookie = Some("A".to_string());
        let mut host = MockHost::with_block(rotated_block());
        let mut cookies = ResponseCookies::new();

        let outcome = SessionShield::new(&config, &random, &request, &mut host, &mut cookies)
            .initialize()
            .await
            .unwrap();

        assert_eq!(outcome, ShieldOutcome::Resent);
        assert!(!host.destroyed);
        assert_eq!(
            set_cookie_values(cookies.headers()).get("xe_sesh1").map(String::as_str),
            Some("B")
        );
        // No further rotation: the live value stays B
        assert_eq!(host.stored().unwrap().plain.value.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_previous_cookie_after_grace_destroys_session() {
        let config = ShieldConfig::default();
        let random = SequenceRandom::new();
        let mut request = facts(Method::GET, false, at(1065));
        request.plain_cookie = Some("A".to_string());
        let mut host = MockHost::with_block(rotated_block());
        let mut cookies = ResponseCookies::new();

        let outcome = SessionShield::new(&config, &random, &request, &mut host, &mut cookies)
            .initialize()
            .await
            .unwrap();

        assert_eq!(outcome, ShieldOutcome::Destroyed);
        assert!(host.destroyed);
        assert!(host.logged_out);
        assert!(host.stored().is_none());
    }

    #[tokio::test]
    async fn test_missing_cookie_destroys_established_session() {
        let config = ShieldConfig::default();
        let random = SequenceRandom::new();
        let request = facts(Method::GET, false, at(1030));
        let mut host = MockHost::with_block(rotated_block());
        let mut cookies = ResponseCookies::new();

        let outcome = SessionShield::new(&config, &random, &request, &mut host, &mut cookies)
            .initialize()
            .await
            .unwrap();

        assert_eq!(outcome, ShieldOutcome::Destroyed);
    }

    #[tokio::test]
    async fn test_wrong_secure_cookie_destroys_session() {
        let config = ShieldConfig::default();
        let random = SequenceRandom::new();
        let mut request = facts(Method::GET, true, at(1030));
        request.plain_cookie = Some("B".to_string());
        request.secure_cookie = Some("forged".to_string());
        let mut block = rotated_block();
        block.secure.value = Some("S".to_string());
        block.init_level = InitLevel::Ssl;
        let mut host = MockHost::with_block(block);
        let mut cookies = ResponseCookies::new();

        let outcome = SessionShield::new(&config, &random, &request, &mut host, &mut cookies)
            .initialize()
            .await
            .unwrap();

        assert_eq!(outcome, ShieldOutcome::Destroyed);
    }

    /// A plain request never inspects the secure cookie, so a leaked plain
    /// verifier alone says nothing about the secure channel.
    #[tokio::test]
    async fn test_secure_channel_unchecked_over_plain_transport() {
        let config = ShieldConfig::default();
        let random = SequenceRandom::new();
        let mut request = facts(Method::GET, false, at(1030));
        request.plain_cookie = Some("B".to_string());
        let mut block = rotated_block();
        block.secure.value = Some("S".to_string());
        block.init_level = InitLevel::Ssl;
        let mut host = MockHost::with_block(block);
        let mut cookies = ResponseCookies::new();

        let outcome = SessionShield::new(&config, &random, &request, &mut host, &mut cookies)
            .initialize()
            .await
            .unwrap();

        assert_eq!(outcome, ShieldOutcome::Verified);
    }

    #[tokio::test]
    async fn test_first_secure_request_establishes_secure_channel() {
        let config = ShieldConfig::default();
        let random = SequenceRandom::new();
        let mut request = facts(Method::GET, true, at(1030));
        request.plain_cookie = Some("B".to_string());
        let mut host = MockHost::with_block(rotated_block());
        let mut cookies = ResponseCookies::new();

        let outcome = SessionShield::new(&config, &random, &request, &mut host, &mut cookies)
            .initialize()
            .await
            .unwrap();

        assert_eq!(outcome, ShieldOutcome::Rotated);
        let block = host.stored().unwrap();
        assert_eq!(block.init_level, InitLevel::Ssl);
        assert!(block.secure.value.is_some());
        // Only the secure channel was rotated
        assert_eq!(block.plain.value.as_deref(), Some("B"));
        let sent = set_cookie_values(cookies.headers());
        assert_eq!(sent.get("xe_sesh2"), block.secure.value.as_ref());
    }
}
