use axum::extract::FromRequestParts;
use http::{StatusCode, request::Parts};

use session_shield::ShieldOutcome;

/// What the shield established for the current request, available as an
/// Axum extractor on routes behind the `session_shield` middleware.
///
/// # Example
///
/// ```no_run
/// use axum::{Router, middleware::from_fn, routing::get};
/// use session_shield_axum::{ShieldContext, session_shield};
///
/// async fn whoami(ctx: ShieldContext) -> String {
///     format!("member {}", ctx.member_id)
/// }
///
/// let app: Router = Router::new()
///     .route("/whoami", get(whoami))
///     .layer(from_fn(session_shield));
/// ```
#[derive(Clone, Debug)]
pub struct ShieldContext {
    /// Host session id; `None` once the shield tore the session down
    pub session_id: Option<String>,
    /// Logged-in member, 0 for anonymous
    pub member_id: i64,
    /// The session's CSRF token, for pages that render it themselves
    pub csrf_token: Option<String>,
    pub outcome: ShieldOutcome,
}

impl<S> FromRequestParts<S> for ShieldContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<ShieldContext>().cloned().ok_or_else(|| {
            tracing::error!("ShieldContext requested on a route without session_shield middleware");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Session shield is not installed",
            )
        })
    }
}
