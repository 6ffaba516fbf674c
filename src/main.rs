use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use teambot_auth::providers::{ChatOAuth, SlackClient};
use teambot_auth::store::CredentialStore;
use teambot_auth::tokens::{sweeper, TokenManager};
use teambot_auth::{AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teambot_auth=info".into()),
        )
        .init();

    // Load config
    let config = Config::from_env()?;
    info!("teambot-auth v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);
    info!("Token store: {}", config.token_file.display());

    // Initialize components
    let chat: Arc<dyn ChatOAuth> = Arc::new(SlackClient::new(
        config.client_id.clone(),
        config.client_secret.clone(),
    ));
    let store = CredentialStore::new(&config.token_file);
    let manager = Arc::new(TokenManager::new(store, chat.clone()));

    // Start the refresh sweeper with a shutdown handle held here
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = tokio::spawn(sweeper::run(
        manager.clone(),
        sweeper::SWEEP_INTERVAL,
        shutdown_rx,
    ));

    // Build shared state and router
    let state: SharedState = Arc::new(AppState {
        config: config.clone(),
        chat,
        manager,
    });
    let app = teambot_auth::api::router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server ready ✓");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the sweeper before exiting
    let _ = shutdown_tx.send(true);
    let _ = sweeper_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
