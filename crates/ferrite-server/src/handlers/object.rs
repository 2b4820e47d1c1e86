//! The proxy endpoint: serve an object from cache, fetching it on a miss.

use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use ferrite_core::ObjectKey;

use crate::state::AppState;
use crate::stream::{QosSlot, stream_body};

/// Query parameters of `GET /object`. All three are required; the client id
/// is caller-supplied and unauthenticated.
#[derive(Deserialize)]
pub struct ObjectParams {
    pub bucket: Option<String>,
    pub file: Option<String>,
    pub client_id: Option<String>,
}

pub async fn get_object(
    State(state): State<AppState>,
    Query(params): Query<ObjectParams>,
) -> Response {
    let (Some(bucket), Some(file), Some(client_id)) =
        (params.bucket, params.file, params.client_id)
    else {
        warn!("missing one or more required query parameters: 'bucket', 'file', 'client_id'");
        return (
            StatusCode::BAD_REQUEST,
            "Missing one or more required query parameters: 'bucket', 'file', 'client_id'",
        )
            .into_response();
    };

    let key = match ObjectKey::new(bucket, file) {
        Ok(key) => key,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    // Admission is checked once here; the slot is held for the entire
    // transfer so the cap bounds concurrent streams, not just lookups.
    if !state.qos.admit(&client_id) {
        return StatusCode::TOO_MANY_REQUESTS.into_response();
    }
    let slot = QosSlot::new(state.qos.clone(), client_id.clone());

    let (path, size) = match state.cache.get_or_fetch(&key).await {
        Ok(resolved) => resolved,
        Err(err) => {
            warn!(%key, client = %client_id, %err, "failed to resolve object");
            // Dropping the slot releases the admission.
            return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
        }
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(err) => {
            warn!(%key, path = %path.display(), %err, "failed to open cached file");
            return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
        }
    };

    info!(%key, client = %client_id, size, "streaming object");
    let body = stream_body(file, slot, state.budget.clone());
    ([(header::CONTENT_TYPE, "application/octet-stream")], body).into_response()
}
