//! Route definitions for the audit chain.

use axum::routing::get;
use axum::Router;

use crate::handlers::audit;
use crate::state::AppState;

/// Audit routes mounted at `/audit`.
///
/// ```text
/// GET /{partition}        -> list_partition
/// GET /{partition}/verify -> verify_partition
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{partition}", get(audit::list_partition))
        .route("/{partition}/verify", get(audit::verify_partition))
}
