pub mod audit;
pub mod definitions;
pub mod health;
pub mod instances;
pub mod routing;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /definitions                                      list, create
/// /definitions/{id}                                 get
/// /definitions/{id}/active                          flip active flag (PUT)
/// /definitions/{id}/instances                       start instance (POST)
///
/// /instances                                        list
/// /instances/{id}                                   get
/// /instances/{id}/transitions                       available transitions
/// /instances/{id}/transitions/{tid}                 execute (POST)
/// /instances/{id}/transitions/{tid}/votes           cast ballot (POST)
/// /instances/{id}/fields                            update fields (PATCH)
/// /instances/{id}/history                           audit-derived history
///
/// /routing/suggestions                              preview matches (POST)
/// /routing/route                                    route a document (POST)
///
/// /audit/{partition}                                list chain events
/// /audit/{partition}/verify                         verify hash chain
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/definitions", definitions::router())
        .nest("/instances", instances::router())
        .nest("/routing", routing::router())
        .nest("/audit", audit::router())
}
