use std::sync::Arc;
use std::time::Duration;

use glance_core::{
    DetectError, EmbedError, Embedding, FaceDetector, FaceEmbedder, FaceRegion, IdentityMatcher,
};
use glance_store::{FaceCache, IdentityStore};
use image::RgbImage;

/// Shared application state.
///
/// The detection and embedding models are loaded once at startup and owned
/// by the process for its lifetime; sessions hold shared, read-only
/// references and never re-instantiate them.
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn FaceDetector>,
    pub embedder: Arc<dyn FaceEmbedder>,
    pub matcher: Arc<dyn IdentityMatcher>,
    pub store: IdentityStore,
    pub cache: Arc<FaceCache>,
    pub cache_ttl: Duration,
}

impl AppState {
    /// Run detection on the blocking pool; inference stalls must not pin an
    /// async worker thread.
    pub async fn detect(&self, image: Arc<RgbImage>) -> Result<Vec<FaceRegion>, DetectError> {
        let detector = self.detector.clone();
        tokio::task::spawn_blocking(move || detector.detect(&image))
            .await
            .unwrap_or_else(|e| {
                Err(DetectError::InferenceFailed(format!(
                    "detection task failed: {e}"
                )))
            })
    }

    /// Run embedding extraction on the blocking pool.
    pub async fn embed(&self, face: RgbImage) -> Result<Embedding, EmbedError> {
        let embedder = self.embedder.clone();
        tokio::task::spawn_blocking(move || embedder.embed(&face))
            .await
            .unwrap_or_else(|e| {
                Err(EmbedError::InferenceFailed(format!(
                    "embedding task failed: {e}"
                )))
            })
    }
}
