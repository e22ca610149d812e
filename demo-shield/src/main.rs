use axum::{
    Extension, Router,
    middleware::from_fn,
    routing::{get, post},
};

use session_shield_axum::{
    SHIELD_ROUTE_PREFIX, SecureChannel, session_shield, session_shield_router,
};

mod handlers;
mod server;

use crate::{
    handlers::{comment, comment_post, index, login, logout},
    server::{Ports, init_tracing, spawn_http_server, spawn_https_server, tls_files},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install default CryptoProvider for rustls to prevent:
    // "no process-level CryptoProvider available -- call CryptoProvider::install_default() before this point"
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::warn!("A rustls CryptoProvider was already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing("demo_shield");

    session_shield_axum::init().await?;

    let app = Router::new()
        .route("/", get(index))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/comment", get(comment).post(comment_post))
        .layer(from_fn(session_shield))
        .nest(SHIELD_ROUTE_PREFIX.as_str(), session_shield_router());

    let ports = Ports::from_env();
    let http_server = spawn_http_server(ports.http, app.clone());

    match tls_files() {
        Some((cert, key)) => {
            // Requests arriving over TLS are marked before the shield sees them
            let https_app = app.layer(Extension(SecureChannel));
            let https_server = spawn_https_server(ports.https, https_app, cert, key).await?;
            tokio::try_join!(http_server, https_server)?;
        }
        None => {
            tracing::warn!("TLS certificate not found, serving plain HTTP only");
            http_server.await?;
        }
    }

    Ok(())
}
