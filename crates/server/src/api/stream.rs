//! Audio delivery handler.
//!
//! Files already on disk are served with range support. A transcode that is
//! still running is sent as a chunked body; it has no length yet, so only a
//! request for the whole resource can be answered.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;
use tunecast_core::{AcceptList, Delivery, RequestMode};

use super::ApiError;
use crate::state::AppState;

const X_CONTENT_DURATION: HeaderName = HeaderName::from_static("x-content-duration");

/// Negotiate a representation of an item and send it.
pub async fn stream_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Response, ApiError> {
    let mut item = state.library().get_item(id)?;

    let (accept, partial_range) = {
        let headers = request.headers();
        let accept = match headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
            Some(value) => AcceptList::parse(value),
            None => AcceptList::any(),
        };
        let partial_range = headers
            .get(header::RANGE)
            .is_some_and(|range| !is_initial_range(range));
        (accept, partial_range)
    };

    let engine = state.engine();
    let negotiation = engine
        .negotiate(&mut item, &accept, RequestMode::Foreground)
        .await?;

    if partial_range && negotiation.is_streaming() {
        debug!("Range request for item {} while transcoding", item.id);
        engine.discard(negotiation).await?;
        return Ok(StatusCode::RANGE_NOT_SATISFIABLE.into_response());
    }

    let duration = item.length_secs;
    match engine.deliver(&item, negotiation).await? {
        Delivery::File { path, mime } => {
            let mime = header_value(&mime)?;
            let response = match ServeFile::new(&path).oneshot(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            };
            let mut response = response.map(Body::new);
            // ServeFile guesses from the extension; the negotiated type wins
            if response.status().is_success() {
                response.headers_mut().insert(header::CONTENT_TYPE, mime);
            }
            set_duration(&mut response, duration);
            Ok(response)
        }
        Delivery::Stream { mime, stream, .. } => {
            let mut response = Body::from_stream(stream).into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, header_value(&mime)?);
            headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
            headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
            set_duration(&mut response, duration);
            Ok(response)
        }
    }
}

/// `bytes=0-` asks for everything, which a growing file can still answer.
fn is_initial_range(range: &HeaderValue) -> bool {
    range
        .to_str()
        .map(|value| {
            let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
            compact.eq_ignore_ascii_case("bytes=0-")
        })
        .unwrap_or(false)
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|_| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("invalid content type: {:?}", value),
        )
    })
}

fn set_duration(response: &mut Response, length_secs: Option<u64>) {
    if let Some(secs) = length_secs {
        response
            .headers_mut()
            .insert(X_CONTENT_DURATION, HeaderValue::from(secs));
    }
}
