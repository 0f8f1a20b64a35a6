//! Background transcode API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use tunecast_core::{AcceptList, JobSnapshot, RequestMode};

use super::ApiError;
use crate::state::AppState;

/// Request body for warming the cache
#[derive(Debug, Deserialize)]
pub struct TranscodeBody {
    pub media_ids: Vec<i64>,
    /// Accept header value to negotiate with; defaults to the background format.
    pub accept: Option<String>,
}

/// Outcome of negotiating one item
#[derive(Debug, Serialize)]
pub struct TranscodeItem {
    pub id: i64,
    pub mime: String,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct TranscodeResponse {
    pub items: Vec<TranscodeItem>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Whether any job was still running after this poll.
    pub running: bool,
    pub jobs: Vec<JobSnapshot>,
}

/// Start background transcodes for a set of items.
///
/// Every id is resolved before any job starts, so an unknown id fails the
/// whole request.
pub async fn start_transcodes(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TranscodeBody>,
) -> Result<(StatusCode, Json<TranscodeResponse>), ApiError> {
    let mut items = body
        .media_ids
        .iter()
        .map(|&id| state.library().get_item(id))
        .collect::<Result<Vec<_>, _>>()?;

    let accept = match &body.accept {
        Some(value) => AcceptList::parse(value),
        None => AcceptList::parse(state.engine().config().background.container.mime()),
    };

    let mut results = Vec::with_capacity(items.len());
    for item in &mut items {
        let negotiation = state
            .engine()
            .negotiate(item, &accept, RequestMode::Background)
            .await?;
        results.push(TranscodeItem {
            id: item.id,
            job_id: negotiation.job_id(),
            mime: negotiation.mime,
            cached: negotiation.cached,
        });
    }

    let status = if results.iter().all(|r| r.cached) {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(TranscodeResponse { items: results })))
}

/// Reap finished jobs and list the ones still running.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let engine = state.engine();
    let running = engine.check_background().await?;
    let jobs = engine.supervisor().status().await?;
    Ok(Json(StatusResponse { running, jobs }))
}

/// Kill a running job.
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.engine().supervisor().terminate(job_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("No running job {}", job_id)))
    }
}
