//! Handlers for workflow definition endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use conclave_core::definition::{
    AssignmentRule, Automation, DefinitionSettings, State as WorkflowState, Transition,
};
use conclave_core::fields::FieldSchema;
use conclave_core::types::DefinitionId;
use conclave_engine::DefinitionDraft;
use conclave_store::DefinitionQuery;

use crate::error::AppResult;
use crate::extract::Actor;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// Request body for creating a workflow definition.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDefinitionRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
    pub states: Vec<WorkflowState>,
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub assignment_rules: Vec<AssignmentRule>,
    #[serde(default)]
    pub automations: Vec<Automation>,
    #[serde(default)]
    pub settings: DefinitionSettings,
}

fn default_version() -> u32 {
    1
}

impl From<CreateDefinitionRequest> for DefinitionDraft {
    fn from(req: CreateDefinitionRequest) -> Self {
        DefinitionDraft {
            name: req.name,
            category: req.category,
            version: req.version,
            states: req.states,
            transitions: req.transitions,
            fields: req.fields,
            assignment_rules: req.assignment_rules,
            automations: req.automations,
            settings: req.settings,
        }
    }
}

/// Request body for flipping a definition's active flag.
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/definitions
pub async fn create_definition(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(body): Json<CreateDefinitionRequest>,
) -> AppResult<impl IntoResponse> {
    body.validate()?;
    let definition = state.engine.create_definition(body.into(), &actor).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse { data: definition }),
    ))
}

/// GET /api/v1/definitions
pub async fn list_definitions(
    State(state): State<AppState>,
    Query(query): Query<DefinitionQuery>,
) -> AppResult<impl IntoResponse> {
    let definitions = state.engine.list_definitions(&query).await?;
    Ok(Json(DataResponse { data: definitions }))
}

/// GET /api/v1/definitions/{id}
pub async fn get_definition(
    State(state): State<AppState>,
    Path(id): Path<DefinitionId>,
) -> AppResult<impl IntoResponse> {
    let definition = state.engine.get_definition(id).await?;
    Ok(Json(DataResponse { data: definition }))
}

/// PUT /api/v1/definitions/{id}/active
pub async fn set_definition_active(
    State(state): State<AppState>,
    Path(id): Path<DefinitionId>,
    Json(body): Json<SetActiveRequest>,
) -> AppResult<impl IntoResponse> {
    let definition = state
        .engine
        .set_definition_active(id, body.is_active)
        .await?;
    Ok(Json(DataResponse { data: definition }))
}
