use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lessonline_api::config::ServerConfig;
use lessonline_api::router::build_app_router;
use lessonline_api::state::AppState;
use lessonline_api::{background, ws};
use lessonline_db::store::PgStore;
use lessonline_events::{EventBus, Notifier};
use lessonline_lifecycle::{Coordinator, Ports};
use lessonline_payments::HttpPaymentGateway;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lessonline_api=debug,lessonline_lifecycle=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid configuration");
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = lessonline_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    lessonline_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    lessonline_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- WebSocket manager ---
    let cancel = CancellationToken::new();
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat = ws::start_heartbeat(Arc::clone(&ws_manager), ws::HEARTBEAT_PERIOD, cancel.child_token());

    // --- Lifecycle collaborators ---
    let store = Arc::new(PgStore::new(pool.clone()));
    let gateway = HttpPaymentGateway::new(config.gateway.clone())
        .expect("Failed to build payment gateway client");
    let event_bus = Arc::new(EventBus::default());
    let ports = Ports {
        sessions: store.clone(),
        availability: store.clone(),
        gateway: Arc::new(gateway),
        ledger: store.clone(),
        fanout: Arc::new(Notifier::new(store.clone(), ws_manager.clone())),
        users: store,
        events: Arc::clone(&event_bus),
    };
    let coordinator = Coordinator::new(ports.clone(), config.lifecycle.coordinator.clone());

    // --- Background tasks ---
    let tasks = background::spawn_all(pool.clone(), &ports, &config.lifecycle, cancel.clone());

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        ports,
        coordinator: coordinator.clone(),
    };

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

    // Pending booking deadlines are dropped; their sessions stay as persisted.
    coordinator.shutdown().await;
    tracing::info!("Booking timers disarmed");

    cancel.cancel();
    tasks
        .join(Duration::from_secs(config.shutdown_timeout_secs))
        .await;

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    if let Err(e) = heartbeat.await {
        tracing::warn!(error = %e, "Heartbeat task ended abnormally");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
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
