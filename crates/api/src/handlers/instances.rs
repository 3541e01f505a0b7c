//! Handlers for workflow instance endpoints: lifecycle, guarded
//! transitions, field edits, votes, and derived history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use conclave_core::instance::WorkflowInstance;
use conclave_core::types::InstanceId;
use conclave_core::voting::{VoteChoice, VoteTally};
use conclave_engine::{ExecuteOptions, StartRequest, TransitionOutcome, VoteOutcome};
use conclave_store::InstanceQuery;

use crate::error::AppResult;
use crate::extract::Actor;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response DTOs
// ---------------------------------------------------------------------------

/// Request body for updating field values outside a transition.
#[derive(Debug, Deserialize)]
pub struct UpdateFieldsRequest {
    pub values: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// Request body for casting a ballot.
#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub vote: VoteChoice,
    #[serde(default)]
    pub comment: Option<String>,
    /// Idempotency token; derived from the ballot's revision when
    /// absent, so retrying the same ballot never double-logs.
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// Response for a transition attempt.
#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub status: &'static str,
    pub instance: WorkflowInstance,
}

impl From<TransitionOutcome> for TransitionResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        match outcome {
            TransitionOutcome::Completed(instance) => TransitionResponse {
                status: "completed",
                instance,
            },
            TransitionOutcome::AwaitingVotes(instance) => TransitionResponse {
                status: "awaiting-votes",
                instance,
            },
        }
    }
}

/// Response for a cast ballot.
#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub status: &'static str,
    pub tally: VoteTally,
    /// Present only when the vote passed and the transition completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<WorkflowInstance>,
}

impl From<VoteOutcome> for VoteResponse {
    fn from(outcome: VoteOutcome) -> Self {
        match outcome {
            VoteOutcome::Pending { tally } => VoteResponse {
                status: "pending",
                tally,
                instance: None,
            },
            VoteOutcome::Passed { instance, tally } => VoteResponse {
                status: "passed",
                tally,
                instance: Some(instance),
            },
            VoteOutcome::Failed { tally } => VoteResponse {
                status: "failed",
                tally,
                instance: None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/definitions/{id}/instances
pub async fn start_workflow(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(definition_id): Path<conclave_core::types::DefinitionId>,
    Json(body): Json<StartRequest>,
) -> AppResult<impl IntoResponse> {
    let instance = state
        .engine
        .start_workflow(definition_id, body, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: instance })))
}

/// GET /api/v1/instances
pub async fn list_instances(
    State(state): State<AppState>,
    Query(query): Query<InstanceQuery>,
) -> AppResult<impl IntoResponse> {
    let instances = state.engine.list_instances(&query).await?;
    Ok(Json(DataResponse { data: instances }))
}

/// GET /api/v1/instances/{id}
pub async fn get_instance(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
) -> AppResult<impl IntoResponse> {
    let instance = state.engine.get_instance(id).await?;
    Ok(Json(DataResponse { data: instance }))
}

/// GET /api/v1/instances/{id}/transitions
pub async fn list_available_transitions(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
) -> AppResult<impl IntoResponse> {
    let transitions = state.engine.list_available_transitions(id).await?;
    Ok(Json(DataResponse { data: transitions }))
}

/// POST /api/v1/instances/{id}/transitions/{transition_id}
pub async fn execute_transition(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((id, transition_id)): Path<(InstanceId, String)>,
    Json(body): Json<ExecuteOptions>,
) -> AppResult<impl IntoResponse> {
    let outcome = state
        .engine
        .execute_transition(id, &transition_id, &actor, body)
        .await?;
    Ok(Json(DataResponse {
        data: TransitionResponse::from(outcome),
    }))
}

/// PATCH /api/v1/instances/{id}/fields
pub async fn update_field_values(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<InstanceId>,
    Json(body): Json<UpdateFieldsRequest>,
) -> AppResult<impl IntoResponse> {
    let instance = state
        .engine
        .update_field_values(id, body.values, &actor, body.correlation_id)
        .await?;
    Ok(Json(DataResponse { data: instance }))
}

/// POST /api/v1/instances/{id}/transitions/{transition_id}/votes
pub async fn cast_vote(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((id, transition_id)): Path<(InstanceId, String)>,
    Json(body): Json<CastVoteRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = state
        .engine
        .cast_vote(
            id,
            &transition_id,
            &actor,
            body.vote,
            body.comment,
            body.correlation_id,
        )
        .await?;
    Ok(Json(DataResponse {
        data: VoteResponse::from(outcome),
    }))
}

/// GET /api/v1/instances/{id}/history
pub async fn instance_history(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
) -> AppResult<impl IntoResponse> {
    let events = state.engine.instance_history(id).await?;
    Ok(Json(DataResponse { data: events }))
}
