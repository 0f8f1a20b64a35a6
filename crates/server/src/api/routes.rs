use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, library, media, middleware::metrics_middleware, stream, transcode};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics))
        // Library
        .route("/media", get(media::list_media))
        .route("/media/{id}", get(media::get_media))
        .route("/library/scan", post(library::scan_library))
        .route("/library/stats", get(library::get_stats))
        // Delivery
        .route("/stream/{id}", get(stream::stream_media))
        // Background transcodes
        .route("/transcode", post(transcode::start_transcodes))
        .route("/transcode/status", get(transcode::get_status))
        .route("/transcode/{job_id}", delete(transcode::cancel_job))
        .route_layer(middleware::from_fn(metrics_middleware))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}
