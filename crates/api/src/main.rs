use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conclave_api::config::ServerConfig;
use conclave_api::router::build_app_router;
use conclave_api::state::AppState;
use conclave_engine::{
    AuditChain, DefaultVoterAuthorizer, SideEffectRunner, SlaScheduler, SlaSchedulerConfig,
    WorkflowEngine,
};
use conclave_events::{BusDispatcher, NotificationBus, NullDocumentCollaborator};
use conclave_store::MemoryStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conclave_api=debug,conclave_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Storage ---
    let store = Arc::new(MemoryStore::new());
    tracing::info!("In-memory store created");

    // --- Notification bus ---
    let bus = Arc::new(NotificationBus::default());

    // --- Engine ---
    let chain = AuditChain::new(store.clone());
    let effects = SideEffectRunner::new(
        Arc::new(BusDispatcher::new(bus.clone())),
        Arc::new(NullDocumentCollaborator),
    );
    let engine = Arc::new(WorkflowEngine::new(
        store.clone(),
        store.clone(),
        chain,
        effects,
        Arc::new(DefaultVoterAuthorizer),
    ));
    tracing::info!("Workflow engine created");

    // --- SLA scheduler ---
    let sla_cancel = tokio_util::sync::CancellationToken::new();
    let scheduler = SlaScheduler::with_config(
        engine.clone(),
        SlaSchedulerConfig {
            sweep_interval: Duration::from_secs(config.sla_sweep_interval_secs),
        },
    );
    let sla_cancel_clone = sla_cancel.clone();
    let sla_handle = tokio::spawn(async move {
        scheduler.run(sla_cancel_clone).await;
    });
    tracing::info!(
        interval_secs = config.sla_sweep_interval_secs,
        "SLA scheduler started"
    );

    // --- App state ---
    let state = AppState {
        engine,
        bus,
        config: Arc::new(config.clone()),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sla_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sla_handle).await;
    tracing::info!("SLA scheduler stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
