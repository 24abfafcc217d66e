//! Router configuration: routes, middleware layers, shared state.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::session;
use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState, body_limit_mb: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/recognition/detect", post(handlers::detect))
        .route("/api/recognition/recognize", post(handlers::recognize))
        .route("/api/recognition/register", post(handlers::register))
        .route("/api/recognition/ws", get(session::ws_handler))
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(body_limit_mb * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
