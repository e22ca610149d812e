//! Routes serving the shield's client-side assets

use axum::{
    Router,
    http::{StatusCode, header::CONTENT_TYPE},
    response::Response,
    routing::get,
};
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use session_shield::SHIELD_CSRF_SCRIPT;

use crate::IntoResponseError;

/// Router for the companion CSRF script, to be nested under `SHIELD_ROUTE_PREFIX`
pub fn session_shield_router() -> Router {
    Router::new()
        .route(&format!("/{SHIELD_CSRF_SCRIPT}"), get(serve_csrf_js))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
}

async fn serve_csrf_js() -> Result<Response, (StatusCode, String)> {
    let js_content = include_str!("../static/shield_csrf.js");
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/javascript")
        .body(js_content.to_string().into())
        .into_response_error()
}
