//! Handlers for audit chain endpoints.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/audit/{partition}
///
/// All events in a partition, oldest first.
pub async fn list_partition(
    State(state): State<AppState>,
    Path(partition): Path<String>,
) -> AppResult<impl IntoResponse> {
    let events = state.engine.chain().list(&partition).await?;
    Ok(Json(DataResponse { data: events }))
}

/// GET /api/v1/audit/{partition}/verify
///
/// Walk the partition's hash chain and report the verification result.
/// Read-only; a broken chain is reported, never repaired.
pub async fn verify_partition(
    State(state): State<AppState>,
    Path(partition): Path<String>,
) -> AppResult<impl IntoResponse> {
    let report = state.engine.chain().verify(&partition).await?;
    Ok(Json(DataResponse { data: report }))
}
