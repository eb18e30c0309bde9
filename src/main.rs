use std::sync::Arc;

use anyhow::Context;
use realm_gate::session::MemoryStore;
use realm_gate::{AppConfig, OidcClient, app, config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let default_level = if config::debug_requested() { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let http = config.http.build().context("failed to build HTTP client")?;

    tracing::info!(issuer = %config.oidc.issuer(), "Discovering identity provider");
    let client = OidcClient::discover(config.oidc.clone(), http)
        .await
        .context("OIDC discovery failed")?;

    let router = app::router(
        config.auth_config(client),
        Arc::new(MemoryStore::new()),
        config.session.clone(),
    );

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, base_url = %config.base_url, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
