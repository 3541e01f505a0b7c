//! Route definitions for workflow instances.

use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers::instances;
use crate::state::AppState;

/// Instance routes mounted at `/instances`.
///
/// ```text
/// GET   /                              -> list_instances
/// GET   /{id}                          -> get_instance
/// GET   /{id}/transitions              -> list_available_transitions
/// POST  /{id}/transitions/{tid}        -> execute_transition
/// POST  /{id}/transitions/{tid}/votes  -> cast_vote
/// PATCH /{id}/fields                   -> update_field_values
/// GET   /{id}/history                  -> instance_history
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(instances::list_instances))
        .route("/{id}", get(instances::get_instance))
        .route(
            "/{id}/transitions",
            get(instances::list_available_transitions),
        )
        .route(
            "/{id}/transitions/{transition_id}",
            post(instances::execute_transition),
        )
        .route(
            "/{id}/transitions/{transition_id}/votes",
            post(instances::cast_vote),
        )
        .route("/{id}/fields", patch(instances::update_field_values))
        .route("/{id}/history", get(instances::instance_history))
}
