//! Classbank Backend Service
//!
//! Main entry point for the classroom banking backend.
//! This service provides:
//! - HTTP API for ledger, profile, and time travel operations
//! - WebSocket server for presence, messaging, and live account pushes
//! - Background scheduler for recurring bills and payments

use classbank_backend::http::build_router;
use classbank_backend::store::MemoryStore;
use classbank_backend::websocket::WebSocketServer;
use classbank_backend::{AppConfig, AppError, AppResult, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    // Initialize tracing/logging with config
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("classbank_backend={},tungstenite=info", config.log_level).into()
            }),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Classbank Backend Service Starting              ║");
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("HTTP port: {}", config.http_port);
    info!("WebSocket port: {}", config.ws_port);

    // =========================================================================
    // STORE SETUP
    // =========================================================================
    info!("Initializing document store...");

    let store = Arc::new(MemoryStore::new());
    info!("✓ In-memory document store ready");

    // =========================================================================
    // CORE SERVICES INITIALIZATION
    // =========================================================================
    info!("Initializing core services...");

    // Initialize application state with repositories and services
    let app_state = Arc::new(AppState::new(store, config.clone()));
    info!("✓ Application state initialized with repositories");

    // Initialize WebSocket server
    let ws_server = Arc::new(WebSocketServer::new(
        app_state.presence.clone(),
        app_state.messaging.clone(),
    ));
    info!("✓ WebSocket server initialized");

    // =========================================================================
    // BACKGROUND TASKS
    // =========================================================================
    info!("Starting background tasks...");

    // Prime the scheduler with every obligation already on record
    let primed = app_state.scheduler.register_all().await?;
    info!("✓ Recurring scheduler primed from {} profiles", primed);

    // Start scheduler tick loop in background
    let scheduler = app_state.scheduler.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler.start().await;
    });
    info!(
        "✓ Recurring scheduler background task started ({}s interval)",
        config.scheduler.tick_secs
    );

    // =========================================================================
    // START SERVERS
    // =========================================================================

    // Start HTTP server
    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port)
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid HTTP address: {}", e)))?;

    info!("Starting HTTP server on {}...", http_addr);

    let app = build_router(app_state.clone());
    let http_listener = TcpListener::bind(http_addr)
        .await
        .map_err(|e| AppError::Message(format!("Failed to bind HTTP server: {}", e)))?;

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, app).await {
            error!("HTTP server error: {}", e);
        }
    });

    info!("✓ HTTP server started on {}", http_addr);

    // Start WebSocket server
    let ws_addr: SocketAddr = format!("0.0.0.0:{}", config.ws_port)
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid WebSocket address: {}", e)))?;

    info!("Starting WebSocket server on {}...", ws_addr);

    let ws_listener = TcpListener::bind(ws_addr)
        .await
        .map_err(|e| AppError::Message(format!("Failed to bind WebSocket server: {}", e)))?;

    let ws_server_clone = ws_server.clone();
    let ws_handle = tokio::spawn(async move {
        loop {
            match ws_listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New WebSocket connection from {}", addr);
                    let ws = ws_server_clone.clone();
                    tokio::spawn(async move {
                        if let Err(e) = ws.handle_connection(stream).await {
                            error!("WebSocket connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("WebSocket accept error: {}", e);
                }
            }
        }
    });

    info!("✓ WebSocket server started on {}", ws_addr);

    // =========================================================================
    // READY
    // =========================================================================
    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Classbank Backend Service Ready!                ║");
    info!("╠══════════════════════════════════════════════════════════╣");
    info!("║  HTTP API:     0.0.0.0:{}                              ║", config.http_port);
    info!("║  WebSocket:    0.0.0.0:{}                              ║", config.ws_port);
    info!("║  Environment:  {}                                    ║", config.environment);
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = http_handle => {
            error!("HTTP server exited unexpectedly");
        }
        _ = ws_handle => {
            error!("WebSocket server exited unexpectedly");
        }
        _ = scheduler_handle => {
            error!("Scheduler task exited unexpectedly");
        }
    }

    info!("Classbank backend service shutdown complete");
    Ok(())
}
