use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::config::ShieldConfig;

/// Key of the shield block inside the host session record
pub const SHIELD_BLOCK_KEY: &str = "XE_SESSION_SHIELD";

/// How far the verifier cookies have been established with the client.
/// Never decreases for the lifetime of a shield block.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum InitLevel {
    #[default]
    None,
    /// The plain channel cookie was written at least once
    Basic,
    /// The secure channel cookie was written at least once
    Ssl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Plain,
    Secure,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Plain, Channel::Secure];

    /// Level the block must have reached before this channel's cookie can be checked
    pub fn required_level(self) -> InitLevel {
        match self {
            Channel::Plain => InitLevel::Basic,
            Channel::Secure => InitLevel::Ssl,
        }
    }

    pub fn cookie_name(self, config: &ShieldConfig) -> &str {
        match self {
            Channel::Plain => &config.plain_cookie_name,
            Channel::Secure => &config.secure_cookie_name,
        }
    }
}

/// Verifier state of one channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierChannel {
    pub value: Option<String>,
    pub previous: Option<String>,
    pub last_refresh: DateTime<Utc>,
    pub need_refresh: bool,
}

impl VerifierChannel {
    pub(crate) fn new(value: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            value,
            previous: None,
            last_refresh: now,
            need_refresh: false,
        }
    }

    /// The superseded verifier, as long as the grace window is open.
    /// The boundary is inclusive so coarse clocks never cut the window short.
    pub fn live_previous(&self, now: DateTime<Utc>, grace_period: Duration) -> Option<&str> {
        if now <= self.last_refresh + grace_period {
            self.previous.as_deref()
        } else {
            None
        }
    }

    /// Whether time-based rotation is due; a zero interval disables it
    pub fn is_stale(&self, now: DateTime<Utc>, refresh_interval: Duration) -> bool {
        !refresh_interval.is_zero() && self.last_refresh + refresh_interval < now
    }

    /// Install a new verifier, keeping only the one it supersedes
    pub(crate) fn shift_to(&mut self, value: String, now: DateTime<Utc>) {
        self.previous = self.value.replace(value);
        self.last_refresh = now;
        self.need_refresh = false;
    }
}

/// Everything the shield keeps for one host session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldBlock {
    pub init_level: InitLevel,
    pub bound_identity: i64,
    pub plain: VerifierChannel,
    pub secure: VerifierChannel,
    pub csrf_token: Option<String>,
}

impl ShieldBlock {
    pub(crate) fn new(
        plain: String,
        secure: Option<String>,
        identity: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            init_level: InitLevel::None,
            bound_identity: identity,
            plain: VerifierChannel::new(Some(plain), now),
            secure: VerifierChannel::new(secure, now),
            csrf_token: None,
        }
    }

    pub fn channel(&self, channel: Channel) -> &VerifierChannel {
        match channel {
            Channel::Plain => &self.plain,
            Channel::Secure => &self.secure,
        }
    }

    pub(crate) fn channel_mut(&mut self, channel: Channel) -> &mut VerifierChannel {
        match channel {
            Channel::Plain => &mut self.plain,
            Channel::Secure => &mut self.secure,
        }
    }

    pub(crate) fn raise_level(&mut self, level: InitLevel) {
        self.init_level = self.init_level.max(level);
    }

    /// Verifier pairs of both channels, compared across `reopen()` to detect a
    /// concurrent rotation
    pub(crate) fn anchor(&self) -> Anchor {
        Anchor {
            plain: (self.plain.value.clone(), self.plain.previous.clone()),
            secure: (self.secure.value.clone(), self.secure.previous.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Anchor {
    plain: (Option<String>, Option<String>),
    secure: (Option<String>, Option<String>),
}

/// What the shield did with the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShieldOutcome {
    /// No host session, or the request class is excluded
    Skipped,
    /// First contact: a new block was created and trusted
    Established,
    /// Cookies matched, nothing to do
    Verified,
    /// A superseded cookie was accepted inside the grace window and the live one re-sent
    Resent,
    Rotated,
    /// Rotation was due but postponed to a request that can take new cookies
    Deferred,
    /// Rotation lost a race with another request and was abandoned
    RaceAborted,
    /// Rotation could not write cookies and was rolled back
    TransportUnavailable,
    /// Verification failed; the session was torn down
    Destroyed,
}
