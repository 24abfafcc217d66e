use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use glance_core::{
    FaceDetector, FaceEmbedder, FaceNetEmbedder, IdentityMatcher, ThresholdMatcher,
    UltraFaceDetector,
};
use glance_store::{FaceCache, IdentityStore};
use glanced::{config::Config, routes, state::AppState};
use tracing_subscriber::EnvFilter;

/// How often expired cache entries are swept.
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("glanced starting");
    let config = Config::from_env();

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = IdentityStore::open(&config.db_path).await?;
    tracing::info!(path = %config.db_path.display(), "identity store opened");

    // Models are loaded once here and shared by every session (fail-fast if
    // either file is missing).
    let detector: Arc<dyn FaceDetector> =
        Arc::new(UltraFaceDetector::load(&config.detector_model_path())?);
    let embedder: Arc<dyn FaceEmbedder> =
        Arc::new(FaceNetEmbedder::load(&config.embedder_model_path())?);
    let matcher: Arc<dyn IdentityMatcher> =
        Arc::new(ThresholdMatcher::new(config.match_threshold));

    let cache = Arc::new(FaceCache::new());
    let purge_cache = cache.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let removed = purge_cache.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, "purged expired face cache entries");
            }
        }
    });

    let state = AppState {
        detector,
        embedder,
        matcher,
        store,
        cache,
        cache_ttl: Duration::from_secs(config.cache_ttl_secs),
    };
    let app = routes::router(state, config.body_limit_mb);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "glanced ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("glanced shutting down");
        })
        .await?;

    Ok(())
}
