use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dispatch_api::config::ServerConfig;
use dispatch_api::router::build_app_router;
use dispatch_api::state::AppState;
use dispatch_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dispatch_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = dispatch_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    dispatch_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    dispatch_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Connection registry and rate limiter ---
    let registry = Arc::new(ws::ConnectionRegistry::new());
    let rate_limiter = Arc::new(ws::RateLimiter::new(Duration::from_secs(
        config.ws_rate_limit_window_secs,
    )));

    // --- Event bus ---
    let event_bus = Arc::new(dispatch_events::EventBus::default());
    tracing::info!("Event bus created");

    // Spawn the event broadcaster (fans bus events out to matching sockets).
    let broadcaster = ws::EventBroadcaster::new(Arc::clone(&registry));
    let broadcaster_handle = tokio::spawn(broadcaster.run(event_bus.subscribe()));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        registry: Arc::clone(&registry),
        rate_limiter,
        event_bus: Arc::clone(&event_bus),
    };

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(state.clone());

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

    // The heartbeat task holds a state clone with an event bus sender, so it
    // must stop before dropping ours actually closes the channel.
    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    // Drop the event bus sender to close the broadcast channel, which lets
    // the broadcaster loop exit on its own.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), broadcaster_handle).await;
    tracing::info!("Event broadcaster shut down");

    let ws_count = registry.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    registry.shutdown_all().await;

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
