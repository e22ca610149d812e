use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::{net::SocketAddr, path::PathBuf};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy)]
pub(crate) struct Ports {
    pub(crate) http: u16,
    pub(crate) https: u16,
}

impl Ports {
    pub(crate) fn from_env() -> Self {
        let port = |key: &str, default: u16| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        Self {
            http: port("DEMO_HTTP_PORT", 3001),
            https: port("DEMO_HTTPS_PORT", 3443),
        }
    }
}

/// Certificate and key for the HTTPS listener, if both exist
pub(crate) fn tls_files() -> Option<(PathBuf, PathBuf)> {
    let certs = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("self_signed_certs");
    let cert = std::env::var("DEMO_TLS_CERT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| certs.join("cert.pem"));
    let key = std::env::var("DEMO_TLS_KEY")
        .map(PathBuf::from)
        .unwrap_or_else(|_| certs.join("key.pem"));

    (cert.exists() && key.exists()).then_some((cert, key))
}

pub(crate) fn spawn_http_server(port: u16, app: Router) -> JoinHandle<()> {
    tokio::spawn(async move {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        tracing::info!("HTTP server listening on {}", addr);
        if let Err(e) = axum_server::bind(addr)
            .serve(app.into_make_service())
            .await
        {
            tracing::error!("HTTP server failed: {}", e);
        }
    })
}

pub(crate) async fn spawn_https_server(
    port: u16,
    app: Router,
    cert: PathBuf,
    key: PathBuf,
) -> Result<JoinHandle<()>, std::io::Error> {
    let config = RustlsConfig::from_pem_file(cert, key).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("HTTPS server listening on {}", addr);
    Ok(tokio::spawn(async move {
        if let Err(e) = axum_server::bind_rustls(addr, config)
            .serve(app.into_make_service())
            .await
        {
            tracing::error!("HTTPS server failed: {}", e);
        }
    }))
}

pub(crate) fn init_tracing(app_name: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            format!(
                "session_shield_axum=trace,session_shield=trace,{}=trace,tower_http=debug,info",
                app_name
            )
            .into()
        }

        #[cfg(not(debug_assertions))]
        {
            "info".into()
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    #[cfg(debug_assertions)]
    tracing::info!("Debug build: shield decisions are logged at debug and trace level");
    tracing::info!("Set RUST_LOG to change verbosity, e.g. RUST_LOG=session_shield=debug");
}
