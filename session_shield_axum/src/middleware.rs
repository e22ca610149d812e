use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, SET_COOKIE};

use session_shield::{
    CachedSession, RequestFacts, ResponseCookies, SHIELD_CONFIG, SHIELD_SESSION_COOKIE_NAME,
    SYSTEM_RANDOM, SessionShield, ShieldConfig, ShieldError, ShieldOutcome, append_cookie,
    inject_token_into_html, presented_cookie,
};

use super::config::{SHIELD_INJECT_TOKEN, SHIELD_MAX_FORM_BYTES};
use super::session::ShieldContext;
use crate::IntoResponseError;

/// Runs the shield for every request passing through.
///
/// Loads (or starts) the host session, verifies and rotates the verifier
/// cookies, rejects state-changing requests without the right CSRF token and
/// hands the handler a [`ShieldContext`]. HTML responses get the token
/// injected; all cookies the shield and the host session need are appended to
/// the response.
///
/// Storage failures are logged and the request continues unshielded.
pub async fn session_shield(req: Request, next: Next) -> Response {
    let config = &*SHIELD_CONFIG;
    let (mut parts, body) = req.into_parts();
    let mut facts = RequestFacts::from_parts(&parts, config);

    let session_id = presented_cookie(&parts.headers, SHIELD_SESSION_COOKIE_NAME.as_str());
    let mut session = match CachedSession::load_or_create(session_id.as_deref()).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Host session unavailable, request continues unshielded: {}", e);
            return next.run(Request::from_parts(parts, body)).await;
        }
    };

    let body = if needs_form_token(&facts, &parts.headers, config) {
        match read_form_token(body, &config.csrf_field_name).await {
            Ok((token, body)) => {
                facts.csrf_token = token;
                body
            }
            Err(response) => return response,
        }
    } else {
        body
    };

    let mut cookies = ResponseCookies::new();
    let (outcome, csrf, token) = run_shield(config, &facts, &mut session, &mut cookies).await;
    tracing::debug!(?outcome, "Shield ran");

    if let Err(e) = session.commit().await {
        tracing::error!("Failed to commit host session: {}", e);
    }

    let mut response = match csrf {
        Err(e) => Err::<Response, ShieldError>(e)
            .into_response_error()
            .unwrap_or_else(IntoResponse::into_response),
        Ok(()) => {
            parts.extensions.insert(ShieldContext {
                session_id: (!session.is_destroyed()).then(|| session.id().to_string()),
                member_id: session.member_id(),
                csrf_token: token.clone(),
                outcome,
            });
            let response = next.run(Request::from_parts(parts, body)).await;
            match token {
                Some(token) if *SHIELD_INJECT_TOKEN => inject_token(response, &token, config).await,
                _ => response,
            }
        }
    };

    attach_cookies(response.headers_mut(), &cookies, &session, config);
    response
}

async fn run_shield(
    config: &ShieldConfig,
    facts: &RequestFacts,
    session: &mut CachedSession,
    cookies: &mut ResponseCookies,
) -> (ShieldOutcome, Result<(), ShieldError>, Option<String>) {
    let mut shield = SessionShield::new(config, &*SYSTEM_RANDOM, facts, session, cookies);

    let outcome = shield.initialize().await.unwrap_or_else(|e| {
        tracing::error!("Shield failed, request continues unshielded: {}", e);
        ShieldOutcome::Skipped
    });

    match shield.validate_token(facts.csrf_token.as_deref()).await {
        Err(ShieldError::CsrfMismatch) => return (outcome, Err(ShieldError::CsrfMismatch), None),
        Err(e) => tracing::error!("CSRF token check failed: {}", e),
        Ok(()) => {}
    }

    let token = shield.issue_token().await.unwrap_or_else(|e| {
        tracing::error!("Failed to issue CSRF token: {}", e);
        None
    });

    (outcome, Ok(()), token)
}

/// Plain HTML forms cannot set headers, so their token travels in the body
fn needs_form_token(facts: &RequestFacts, headers: &HeaderMap, config: &ShieldConfig) -> bool {
    config.csrf_enabled
        && facts.shield_enabled
        && facts.is_unsafe_method()
        && facts.csrf_token.is_none()
        && headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| {
                ct.to_ascii_lowercase()
                    .starts_with("application/x-www-form-urlencoded")
            })
}

/// Buffer the form body, pick out the token field and hand back an
/// equivalent body for the handler
async fn read_form_token(body: Body, field: &str) -> Result<(Option<String>, Body), Response> {
    let bytes = to_bytes(body, *SHIELD_MAX_FORM_BYTES).await.map_err(|e| {
        tracing::warn!("Failed to read form body: {}", e);
        (StatusCode::PAYLOAD_TOO_LARGE, "Form body too large").into_response()
    })?;

    let token = url::form_urlencoded::parse(&bytes)
        .find(|(name, _)| name == field)
        .map(|(_, value)| value.into_owned());

    Ok((token, Body::from(bytes)))
}

async fn inject_token(response: Response, token: &str, config: &ShieldConfig) -> Response {
    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"));
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("Failed to buffer HTML response: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let Ok(page) = std::str::from_utf8(&bytes) else {
        return Response::from_parts(parts, Body::from(bytes));
    };

    let page = inject_token_into_html(page, token, config);
    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(page))
}

fn attach_cookies(
    headers: &mut HeaderMap,
    cookies: &ResponseCookies,
    session: &CachedSession,
    config: &ShieldConfig,
) {
    for value in cookies.headers().get_all(SET_COOKIE) {
        headers.append(SET_COOKIE, value.clone());
    }

    if let Some(cookie) = session.session_cookie(config) {
        if let Err(e) = append_cookie(headers, &cookie) {
            tracing::error!("Failed to set session cookie: {}", e);
        }
    }
}
