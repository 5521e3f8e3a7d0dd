use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use lifechanger_sync::crypto::CryptoEngine;
use lifechanger_sync::session::SessionManager;
use lifechanger_sync::store::EncryptedFileStore;
use lifechanger_sync::{api, providers, AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lifechanger_sync=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("lifechanger-sync v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", config.bind_addr());

    let crypto = Arc::new(
        CryptoEngine::new(&config.master_key, &config.hmac_secret)
            .context("Failed to initialise token encryption")?,
    );
    let store = EncryptedFileStore::new(&config.token_store_path, crypto.clone());
    info!("Token store at {}", store.path().display());

    let provider = providers::garmin_from_config(&config);
    let session = SessionManager::new(
        Arc::new(provider),
        Arc::new(store),
        &config.garmin_api_base_url,
    );
    if session.restore().await {
        info!("Garmin session restored ✓");
    } else {
        info!("No Garmin session yet; waiting for authorization");
    }

    let state: SharedState = Arc::new(AppState::new(config.clone(), crypto, session));
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!("Server ready ✓");
    axum::serve(listener, app).await?;

    Ok(())
}
