use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::config::AppConfig;
use super::routes::app_router;
use super::store::MemorySessionStore;

/// Bind the configured address and serve until the process stops.
///
/// # Errors
///
/// Fails if the socket cannot be opened (e.g. port already in use) or the server stops with an error.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("opening {addr}"))?;
    tracing::info!(%addr, "Listening");

    launch(listener, config).await
}

/// Serve on an already bound listener with an in-memory session store.
///
/// # Errors
///
/// Fails if the server stops with an error.
pub async fn launch(listener: TcpListener, config: AppConfig) -> anyhow::Result<()> {
    tracing::info!(
        account_id = config.basecamp().account_id(),
        client_id = config.oauth().client_id(),
        redirect_uri = %config.oauth().redirect_uri(),
        "Starting basecamp-bridge"
    );

    let sessions = MemorySessionStore::new().with_session_ttl(config.session_ttl());
    let app = app_router(config, sessions).layer(TraceLayer::new_for_http());

    axum::serve(listener, app.into_make_service())
        .await
        .context("starting server")?;

    Ok(())
}
