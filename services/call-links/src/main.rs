//! Event call links service
//!
//! Single-binary Rust service that:
//! 1. Loads the option store holding credentials and tokens
//! 2. Exposes the OAuth callback/disconnect routes for the provider round-trip
//! 3. Serves the settings surface (field descriptors, status, credentials)
//! 4. Refreshes access tokens ahead of expiry on request

mod config;
mod error;
mod metrics;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zoom_auth::credentials::{CredentialStore, FileOptionStore};
use zoom_auth::token::TokenClient;
use zoom_auth::url::UrlBuilder;
use zoom_connector::Connector;

use crate::config::Config;
use crate::routes::{AppState, build_router};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting event-call-links");

    // Install the Prometheus recorder before any metrics are emitted
    let prometheus = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        site_base = %config.server.site_base,
        token_endpoint = %config.provider.token_endpoint,
        "configuration loaded"
    );

    let options = FileOptionStore::load(config.storage.options_path.clone())
        .context("failed to load option store")?;
    let store = CredentialStore::new(Arc::new(options), config.storage.option_prefix.clone());

    let connector = Connector::new(
        store,
        TokenClient::new(config.provider.token_endpoint.clone())
            .context("failed to build token client")?,
        UrlBuilder::new(
            config.provider.authorize_endpoint.clone(),
            config.server.site_base.clone(),
        ),
        config.redirect_uri(),
        config.refresh_margin(),
    );

    info!(
        state = %connector.status(),
        "connection state at startup"
    );

    let state = AppState {
        connector: Arc::new(connector),
        settings_url: config.server.settings_url.clone(),
        site_base: config.server.site_base.clone(),
        option_prefix: config.storage.option_prefix.clone(),
        prometheus,
    };

    let router = build_router(state);
    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen_addr))?;

    info!(addr = %config.server.listen_addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM so in-flight requests can drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}
