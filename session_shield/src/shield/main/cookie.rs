use http::header::{HeaderMap, HeaderValue, SET_COOKIE};

use crate::shield::config::ShieldConfig;
use crate::shield::errors::ShieldError;
use crate::shield::types::{Channel, InitLevel, ShieldBlock};
use crate::utils::{cookie_header_value, header_set_cookie};

/// A cookie the shield wants on the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldCookie {
    pub name: String,
    pub value: String,
    pub secure: bool,
    pub http_only: bool,
    pub path: String,
    pub domain: Option<String>,
    /// `None` leaves a browser-session cookie
    pub max_age: Option<i64>,
}

impl ShieldCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, config: &ShieldConfig) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            secure: false,
            http_only: true,
            path: config.cookie_path.clone(),
            domain: config.cookie_domain.clone(),
            max_age: config.cookie_max_age(),
        }
    }

    pub(crate) fn verifier(channel: Channel, value: &str, config: &ShieldConfig) -> Self {
        Self {
            secure: channel == Channel::Secure,
            ..Self::new(channel.cookie_name(config), value, config)
        }
    }

    /// Deletes the channel cookie on the client. Not marked `Secure` so it also
    /// goes out over the plain channel.
    pub(crate) fn expired(channel: Channel, config: &ShieldConfig) -> Self {
        Self {
            http_only: false,
            max_age: Some(0),
            ..Self::new(channel.cookie_name(config), "", config)
        }
    }

    pub fn to_header_string(&self) -> String {
        let mut cookie = format!(
            "{}={}; SameSite=Lax; Path={}",
            self.name, self.value, self.path
        );
        if let Some(domain) = &self.domain {
            cookie.push_str(&format!("; Domain={domain}"));
        }
        if let Some(max_age) = self.max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie
    }
}

/// Response side of the HTTP boundary
pub trait CookieSink: Send + Sync {
    /// True once the response head has gone out and no cookie can be added
    fn headers_sent(&self) -> bool;

    /// Write all cookies or none of them
    fn set_cookies(&mut self, cookies: Vec<ShieldCookie>) -> Result<(), ShieldError>;
}

/// Collects `Set-Cookie` headers for a response that has not started yet
#[derive(Debug, Default)]
pub struct ResponseCookies {
    headers: HeaderMap,
    sent: bool,
}

impl ResponseCookies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the response head as transmitted; later writes fail
    pub fn mark_sent(&mut self) {
        self.sent = true;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl CookieSink for ResponseCookies {
    fn headers_sent(&self) -> bool {
        self.sent
    }

    fn set_cookies(&mut self, cookies: Vec<ShieldCookie>) -> Result<(), ShieldError> {
        if self.sent {
            return Err(ShieldError::TransportUnavailable);
        }

        // Validate everything first so a bad value never leaves a partial write
        let values = cookies
            .iter()
            .map(|c| cookie_header_value(&c.to_header_string()))
            .collect::<Result<Vec<HeaderValue>, _>>()
            .map_err(|e| ShieldError::Cookie(e.to_string()))?;

        for value in values {
            self.headers.append(SET_COOKIE, value);
        }
        Ok(())
    }
}

/// Append a single cookie to a header map outside of the shield protocol,
/// e.g. the host session id cookie.
pub fn append_cookie(headers: &mut HeaderMap, cookie: &ShieldCookie) -> Result<(), ShieldError> {
    header_set_cookie(headers, &cookie.to_header_string())?;
    Ok(())
}

/// Send the verifier cookies of every channel applicable to this request and
/// raise the block's init level for each channel that went out.
pub(crate) fn write_shield_cookies(
    block: &mut ShieldBlock,
    secure_request: bool,
    config: &ShieldConfig,
    sink: &mut dyn CookieSink,
) -> Result<(), ShieldError> {
    if sink.headers_sent() {
        return Err(ShieldError::TransportUnavailable);
    }

    let mut cookies = Vec::with_capacity(2);
    let mut reached = InitLevel::None;

    if let Some(value) = &block.plain.value {
        cookies.push(ShieldCookie::verifier(Channel::Plain, value, config));
        reached = InitLevel::Basic;
    }
    if secure_request {
        if let Some(value) = &block.secure.value {
            cookies.push(ShieldCookie::verifier(Channel::Secure, value, config));
            reached = InitLevel::Ssl;
        }
    }

    sink.set_cookies(cookies)?;
    block.raise_level(reached);
    Ok(())
}
