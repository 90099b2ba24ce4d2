//! HTTP/WebSocket server exposing the queue, agentic tasks and worktrees
//!
//! Voice clients connect to `/ws` and exchange JSON frames (see `messages`).

pub mod messages;
pub mod state;
mod ws;

pub use messages::{ClientMessage, ServerMessage};
pub use state::ServerAppState;

use anyhow::{Context, Result};
use axum::{
    http::header::{ACCEPT, CONTENT_TYPE},
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Version information for the server
#[derive(serde::Serialize)]
struct VersionInfo {
    name: &'static str,
    version: &'static str,
}

/// Build the router with all routes and layers
pub fn router(state: ServerAppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health_handler))
        .route("/api/version", get(version_handler))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP/WebSocket server until shutdown is requested
pub async fn run_server(state: ServerAppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.server.bind, state.config.server.port)
        .parse()
        .context("Invalid bind address")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    log::info!("[Server] Listening on http://{}", addr);
    log::info!(
        "[Server] Workspace {} (worktrees in {})",
        state.config.workspace.work_dir.display(),
        state.config.worktrees_dir().display()
    );

    let shutdown_state = state.shutdown_state.clone();
    let shutdown_signal = async move {
        shutdown_state.wait().await;
        log::info!("[Server] Shutdown signal received, stopping server...");
    };

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn version_handler() -> Json<VersionInfo> {
    Json(VersionInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}
