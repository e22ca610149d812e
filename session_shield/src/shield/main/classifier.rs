//! Request classification
//!
//! Pure functions over the incoming request. Nothing here touches the session;
//! missing data always classifies as the safe default (insecure, not ajax,
//! safe method, no cookie).

use chrono::{DateTime, Utc};
use headers::HeaderMapExt;
use http::header::{CONTENT_TYPE, HeaderMap, USER_AGENT};
use http::{Extensions, Method, Uri};

use crate::shield::config::{DeferPolicy, ShieldConfig};

/// Request extension set by a TLS listener to mark the secure channel
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureChannel;

/// Everything the shield needs to know about the current request
#[derive(Debug, Clone)]
pub struct RequestFacts {
    pub method: Method,
    pub secure: bool,
    pub ajax: bool,
    pub plugin_content: bool,
    pub legacy_client: bool,
    pub shield_enabled: bool,
    pub plain_cookie: Option<String>,
    pub secure_cookie: Option<String>,
    /// CSRF token presented by the request, from header or form field
    pub csrf_token: Option<String>,
    pub now: DateTime<Utc>,
}

impl RequestFacts {
    /// Classify a request head
    pub fn from_request(
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        extensions: &Extensions,
        config: &ShieldConfig,
    ) -> Self {
        Self {
            method: method.clone(),
            secure: is_secure_channel(uri, headers, extensions, config),
            ajax: is_ajax(headers),
            plugin_content: is_plugin_content(headers),
            legacy_client: is_legacy_client(headers),
            shield_enabled: is_shield_enabled(uri, config),
            plain_cookie: presented_cookie(headers, &config.plain_cookie_name),
            secure_cookie: presented_cookie(headers, &config.secure_cookie_name),
            csrf_token: header_str(headers, &config.csrf_header_name),
            now: Utc::now(),
        }
    }

    pub fn from_parts(parts: &http::request::Parts, config: &ShieldConfig) -> Self {
        Self::from_request(
            &parts.method,
            &parts.uri,
            &parts.headers,
            &parts.extensions,
            config,
        )
    }

    pub fn is_unsafe_method(&self) -> bool {
        is_unsafe_method(&self.method)
    }

    /// Whether the client may fail to pick up a cookie set on this response
    /// before its next action
    pub fn cannot_echo_cookies(&self, policy: DeferPolicy) -> bool {
        match policy {
            DeferPolicy::Always => self.is_unsafe_method() || self.ajax || self.plugin_content,
            DeferPolicy::LegacyClientsOnly => self.legacy_client && self.is_unsafe_method(),
        }
    }
}

pub fn is_secure_channel(
    uri: &Uri,
    headers: &HeaderMap,
    extensions: &Extensions,
    config: &ShieldConfig,
) -> bool {
    if extensions.get::<SecureChannel>().is_some() {
        return true;
    }
    if uri.scheme_str() == Some("https") {
        return true;
    }
    config.trust_forwarded_proto
        && header_str(headers, "X-Forwarded-Proto")
            .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

pub fn is_ajax(headers: &HeaderMap) -> bool {
    header_str(headers, "X-Requested-With")
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
}

/// Requests driven by a browser plugin such as Flash
pub fn is_plugin_content(headers: &HeaderMap) -> bool {
    let requested_with = header_str(headers, "X-Requested-With").unwrap_or_default();
    let user_agent = header_str(headers, USER_AGENT.as_str()).unwrap_or_default();
    let content_type = header_str(headers, CONTENT_TYPE.as_str()).unwrap_or_default();

    requested_with.contains("ShockwaveFlash")
        || user_agent.contains("Shockwave Flash")
        || content_type
            .to_ascii_lowercase()
            .starts_with("application/x-amf")
}

/// User agents known to forget freshly set cookies on non-GET requests
pub fn is_legacy_client(headers: &HeaderMap) -> bool {
    let user_agent = header_str(headers, USER_AGENT.as_str()).unwrap_or_default();
    user_agent.contains("MSIE 8.0") || user_agent.contains("Trident/4.0")
}

pub fn is_unsafe_method(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// False for request classes the shield must stay away from, such as uploads
/// performed by plugins that cannot carry cookies reliably
pub fn is_shield_enabled(uri: &Uri, config: &ShieldConfig) -> bool {
    let path = uri.path();
    if config
        .excluded_paths
        .iter()
        .any(|prefix| path.starts_with(prefix.as_str()))
    {
        tracing::debug!("Shield disabled for excluded path {}", path);
        return false;
    }

    let excluded_action = uri.query().is_some_and(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .any(|(k, v)| k == "act" && config.excluded_actions.iter().any(|a| *a == v))
    });
    if excluded_action {
        tracing::debug!("Shield disabled for excluded action");
        return false;
    }

    true
}

pub fn presented_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .typed_get::<headers::Cookie>()
        .and_then(|cookies| cookies.get(name).map(str::to_string))
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_secure_channel_detection() {
        let config = ShieldConfig::default();
        let plain_uri: Uri = "/index".parse().unwrap();
        let https_uri: Uri = "https://example.com/index".parse().unwrap();
        let empty = HeaderMap::new();

        assert!(!is_secure_channel(&plain_uri, &empty, &Extensions::new(), &config));
        assert!(is_secure_channel(&https_uri, &empty, &Extensions::new(), &config));

        let mut extensions = Extensions::new();
        extensions.insert(SecureChannel);
        assert!(is_secure_channel(&plain_uri, &empty, &extensions, &config));
    }

    #[test]
    fn test_forwarded_proto_requires_trust() {
        let uri: Uri = "/".parse().unwrap();
        let forwarded = headers(&[("x-forwarded-proto", "https")]);

        let untrusting = ShieldConfig::default();
        assert!(!is_secure_channel(&uri, &forwarded, &Extensions::new(), &untrusting));

        let trusting = ShieldConfig {
            trust_forwarded_proto: true,
            ..ShieldConfig::default()
        };
        assert!(is_secure_channel(&uri, &forwarded, &Extensions::new(), &trusting));
    }

    #[test]
    fn test_ajax_and_plugin_detection() {
        assert!(is_ajax(&headers(&[("x-requested-with", "XMLHttpRequest")])));
        assert!(!is_ajax(&HeaderMap::new()));

        assert!(is_plugin_content(&headers(&[(
            "x-requested-with",
            "ShockwaveFlash/32.0.0.465"
        )])));
        assert!(is_plugin_content(&headers(&[("user-agent", "Shockwave Flash")])));
        assert!(is_plugin_content(&headers(&[(
            "content-type",
            "application/x-amf"
        )])));
        assert!(!is_plugin_content(&headers(&[("user-agent", "Mozilla/5.0")])));
    }

    #[test]
    fn test_legacy_client_detection() {
        assert!(is_legacy_client(&headers(&[(
            "user-agent",
            "Mozilla/4.0 (compatible; MSIE 8.0; Windows NT 6.1; Trident/4.0)"
        )])));
        assert!(!is_legacy_client(&headers(&[(
            "user-agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0"
        )])));
    }

    #[test]
    fn test_unsafe_methods() {
        assert!(!is_unsafe_method(&Method::GET));
        assert!(!is_unsafe_method(&Method::HEAD));
        assert!(!is_unsafe_method(&Method::OPTIONS));
        assert!(is_unsafe_method(&Method::POST));
        assert!(is_unsafe_method(&Method::PUT));
        assert!(is_unsafe_method(&Method::DELETE));
        assert!(is_unsafe_method(&Method::PATCH));
    }

    #[test]
    fn test_shield_enabled_exclusions() {
        let config = ShieldConfig {
            excluded_paths: vec!["/upload".to_string()],
            ..ShieldConfig::default()
        };

        assert!(is_shield_enabled(&"/board?act=dispList".parse().unwrap(), &config));
        assert!(!is_shield_enabled(
            &"/index.php?mid=board&act=procFileUpload".parse().unwrap(),
            &config
        ));
        assert!(!is_shield_enabled(&"/upload/file".parse().unwrap(), &config));
    }

    #[test]
    fn test_presented_cookies() {
        let map = headers(&[("cookie", "xe_sesh1=abc; other=1; xe_sesh2=def")]);
        assert_eq!(presented_cookie(&map, "xe_sesh1").as_deref(), Some("abc"));
        assert_eq!(presented_cookie(&map, "xe_sesh2").as_deref(), Some("def"));
        assert_eq!(presented_cookie(&map, "missing"), None);
        assert_eq!(presented_cookie(&HeaderMap::new(), "xe_sesh1"), None);
    }

    #[test]
    fn test_from_request_collects_facts() {
        let config = ShieldConfig::default();
        let map = headers(&[
            ("cookie", "xe_sesh1=abc"),
            ("x-csrf-token", "T1"),
            ("x-requested-with", "XMLHttpRequest"),
        ]);
        let uri: Uri = "https://example.com/api".parse().unwrap();

        let facts =
            RequestFacts::from_request(&Method::POST, &uri, &map, &Extensions::new(), &config);

        assert!(facts.secure);
        assert!(facts.ajax);
        assert!(facts.shield_enabled);
        assert!(facts.is_unsafe_method());
        assert_eq!(facts.plain_cookie.as_deref(), Some("abc"));
        assert_eq!(facts.secure_cookie, None);
        assert_eq!(facts.csrf_token.as_deref(), Some("T1"));
    }

    #[test]
    fn test_cannot_echo_cookies_by_policy() {
        let config = ShieldConfig::default();
        let uri: Uri = "/".parse().unwrap();
        let modern = HeaderMap::new();
        let legacy = headers(&[("user-agent", "Mozilla/4.0 (compatible; MSIE 8.0)")]);

        let get =
            RequestFacts::from_request(&Method::GET, &uri, &modern, &Extensions::new(), &config);
        let post =
            RequestFacts::from_request(&Method::POST, &uri, &modern, &Extensions::new(), &config);
        let legacy_post =
            RequestFacts::from_request(&Method::POST, &uri, &legacy, &Extensions::new(), &config);

        assert!(!get.cannot_echo_cookies(DeferPolicy::Always));
        assert!(post.cannot_echo_cookies(DeferPolicy::Always));
        assert!(!post.cannot_echo_cookies(DeferPolicy::LegacyClientsOnly));
        assert!(legacy_post.cannot_echo_cookies(DeferPolicy::LegacyClientsOnly));
    }
}
