//! Media library API handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tunecast_core::{MediaDetails, MediaItem};

use super::ApiError;
use crate::state::AppState;

/// Response for listing media
#[derive(Debug, Serialize)]
pub struct ListMediaResponse {
    pub items: Vec<MediaItem>,
    pub total: usize,
}

/// List every item in the library
pub async fn list_media(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListMediaResponse>, ApiError> {
    let items = state.library().list()?;
    Ok(Json(ListMediaResponse {
        total: items.len(),
        items,
    }))
}

/// Get one item with its tags
pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<MediaDetails>, ApiError> {
    let library = state.library();
    let item = library.get_item(id)?;
    let tags = library.tags(id)?;
    Ok(Json(MediaDetails { item, tags }))
}
