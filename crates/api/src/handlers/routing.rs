//! Handlers for document routing endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use conclave_core::instance::WorkflowInstance;
use conclave_core::routing::RoutingContext;
use conclave_engine::RouteOutcome;

use crate::error::AppResult;
use crate::extract::Actor;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response for a routing attempt.
#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub routed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<WorkflowInstance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<conclave_core::types::DefinitionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_priority: Option<i32>,
}

/// POST /api/v1/routing/suggestions
///
/// Preview which workflows would accept the document; starts nothing.
pub async fn suggest_workflows(
    State(state): State<AppState>,
    Json(ctx): Json<RoutingContext>,
) -> AppResult<impl IntoResponse> {
    let suggestions = state.engine.suggest_workflows(&ctx).await?;
    Ok(Json(DataResponse { data: suggestions }))
}

/// POST /api/v1/routing/route
///
/// Route the document to the best-matching workflow and start an
/// instance. A document no rule matches routes nowhere and returns
/// `routed: false` with 200, not an error.
pub async fn route_document(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(ctx): Json<RoutingContext>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.engine.route_document(&ctx, &actor).await?;
    let (status, response) = match outcome {
        RouteOutcome::Routed {
            instance,
            definition_id,
            rule_priority,
        } => (
            StatusCode::CREATED,
            RouteResponse {
                routed: true,
                instance: Some(instance),
                definition_id: Some(definition_id),
                rule_priority: Some(rule_priority),
            },
        ),
        RouteOutcome::NoMatch => (
            StatusCode::OK,
            RouteResponse {
                routed: false,
                instance: None,
                definition_id: None,
                rule_priority: None,
            },
        ),
    };
    Ok((status, Json(DataResponse { data: response })))
}
