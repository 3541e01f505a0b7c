use std::sync::Arc;

use conclave_engine::WorkflowEngine;
use conclave_events::NotificationBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// The workflow engine facade.
    pub engine: Arc<WorkflowEngine>,
    /// In-process notification bus (consumed by delivery adapters).
    pub bus: Arc<NotificationBus>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
