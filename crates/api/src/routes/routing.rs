//! Route definitions for the document router.

use axum::routing::post;
use axum::Router;

use crate::handlers::routing;
use crate::state::AppState;

/// Routing routes mounted at `/routing`.
///
/// ```text
/// POST /suggestions -> suggest_workflows
/// POST /route       -> route_document
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/suggestions", post(routing::suggest_workflows))
        .route("/route", post(routing::route_document))
}
