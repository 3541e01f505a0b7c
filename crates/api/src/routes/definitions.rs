//! Route definitions for workflow definition management.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{definitions, instances};
use crate::state::AppState;

/// Definition routes mounted at `/definitions`.
///
/// ```text
/// GET  /                 -> list_definitions
/// POST /                 -> create_definition
/// GET  /{id}             -> get_definition
/// PUT  /{id}/active      -> set_definition_active
/// POST /{id}/instances   -> start_workflow
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(definitions::list_definitions).post(definitions::create_definition),
        )
        .route("/{id}", get(definitions::get_definition))
        .route("/{id}/active", put(definitions::set_definition_active))
        .route("/{id}/instances", post(instances::start_workflow))
}
