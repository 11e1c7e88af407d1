use anyhow::Result;
use std::sync::Arc;

use procurement_backend::{
    app, auth,
    config::{self, StorageBackend},
    db, logging,
    persistence::{InMemoryStore, PgStore, Store},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = config::Settings::from_env()?;

    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        storage = ?settings.storage_backend,
        "Starting procurement backend"
    );

    let store: Arc<dyn Store> = match settings.storage_backend {
        StorageBackend::Postgres => Arc::new(PgStore::new(db::create_pool(&settings).await?)),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            Arc::new(InMemoryStore::new())
        }
    };

    let jwks_cache = auth::JwksCache::new(
        settings.jwt_jwks_url.clone(),
        settings.jwt_issuer.clone(),
        settings.jwt_audience.clone(),
        settings.jwks_cache_ttl_seconds,
    )?;

    // Optionally warm the JWKS cache
    if let Err(e) = jwks_cache.warm_cache().await {
        tracing::warn!(error = %e, "Failed to warm JWKS cache - will fetch on first request");
    }

    let state = app::AppState::new(store, settings.clone(), jwks_cache);
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
