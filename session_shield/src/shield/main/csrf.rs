use subtle::ConstantTimeEq;

use crate::config::{SHIELD_CSRF_SCRIPT, SHIELD_ROUTE_PREFIX};
use crate::shield::config::ShieldConfig;
use crate::shield::errors::ShieldError;
use crate::shield::types::ShieldBlock;
use crate::utils::escape_html_attr;

use super::classifier::RequestFacts;
use super::guard::SessionShield;
use super::random::secure_random_hex;
use super::store::{AuthProvider, SessionStore};

/// Check a presented CSRF token against the block.
///
/// Safe methods, excluded requests and sessions without an issued token are
/// accepted. Anything else must present the stored token exactly.
pub fn verify_csrf_token(
    block: Option<&ShieldBlock>,
    facts: &RequestFacts,
    config: &ShieldConfig,
    presented: Option<&str>,
) -> Result<(), ShieldError> {
    if !config.csrf_enabled || !facts.shield_enabled || !facts.is_unsafe_method() {
        return Ok(());
    }
    let Some(expected) = block.and_then(|b| b.csrf_token.as_deref()) else {
        return Ok(());
    };

    match presented {
        Some(presented) if bool::from(expected.as_bytes().ct_eq(presented.as_bytes())) => Ok(()),
        _ => {
            tracing::warn!(
                method = %facts.method,
                presented = presented.is_some(),
                "CSRF token mismatch"
            );
            Err(ShieldError::CsrfMismatch)
        }
    }
}

impl<H> SessionShield<'_, H>
where
    H: SessionStore + AuthProvider + ?Sized,
{
    /// The session's CSRF token, created on first use.
    ///
    /// `None` when CSRF protection is off or the session has no shield block.
    pub async fn issue_token(&mut self) -> Result<Option<String>, ShieldError> {
        if !self.config.csrf_enabled || !self.facts.shield_enabled {
            return Ok(None);
        }
        let Some(mut block) = self.host.get_block().await? else {
            return Ok(None);
        };

        if let Some(token) = &block.csrf_token {
            return Ok(Some(token.clone()));
        }

        let token = secure_random_hex(self.random, self.config.random_bytes);
        block.csrf_token = Some(token.clone());
        self.host.set_block(block).await?;
        tracing::debug!("CSRF token issued");
        Ok(Some(token))
    }

    /// Validate the token this request presented
    pub async fn validate_token(&self, presented: Option<&str>) -> Result<(), ShieldError> {
        let block = self.host.get_block().await?;
        verify_csrf_token(block.as_ref(), self.facts, self.config, presented)
    }
}

/// `<meta>` element carrying the token for the companion script
pub fn csrf_meta_tag(token: &str, config: &ShieldConfig) -> String {
    format!(
        r#"<meta name="{}" content="{}" data-shield-header="{}">"#,
        escape_html_attr(&config.csrf_field_name),
        escape_html_attr(token),
        escape_html_attr(&config.csrf_header_name),
    )
}

pub fn csrf_script_tag() -> String {
    format!(
        r#"<script src="{}/{}" defer></script>"#,
        SHIELD_ROUTE_PREFIX.as_str(),
        SHIELD_CSRF_SCRIPT
    )
}

/// Put the token meta element and the companion script into an HTML page,
/// right before `</head>` or at the very start when the page has no head.
/// Pages that already carry the meta element are returned unchanged.
pub fn inject_token_into_html(html: &str, token: &str, config: &ShieldConfig) -> String {
    let marker = format!(r#"<meta name="{}""#, escape_html_attr(&config.csrf_field_name));
    if html.contains(&marker) {
        return html.to_string();
    }

    let snippet = format!("{}{}", csrf_meta_tag(token, config), csrf_script_tag());
    match html.to_ascii_lowercase().find("</head>") {
        Some(pos) => {
            let mut page = String::with_capacity(html.len() + snippet.len());
            page.push_str(&html[..pos]);
            page.push_str(&snippet);
            page.push_str(&html[pos..]);
            page
        }
        None => format!("{snippet}{html}"),
    }
}
