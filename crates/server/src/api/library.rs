//! Library maintenance handlers.

use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::info;
use tunecast_core::{DiscoveryReport, LibraryStats};

use super::ApiError;
use crate::state::AppState;

/// Scan the configured media directories now.
///
/// Blocks until the scan finishes.
pub async fn scan_library(State(state): State<Arc<AppState>>) -> Json<DiscoveryReport> {
    let roots = &state.config().library.media_dirs;
    info!("Library scan requested ({} directories)", roots.len());
    Json(state.discovery().scan(roots).await)
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<LibraryStats>, ApiError> {
    Ok(Json(state.library().stats()?))
}
