//! Legions Server - game sessions over HTTP
//!
//! This crate provides the session layer:
//! - A lobby of hosted games, each behind its own lock
//! - Command dispatch and action fan-out to subscribers
//! - Bot seats driven from game snapshots
//! - A JSON API for the command channel

pub mod host;
mod routes;
mod state;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use host::{spawn_bot_driver, GameHost, HostError};
pub use routes::games::GameSummary;
pub use state::{ApiError, ServerState};

/// Server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Search budget for each bot seat, in milliseconds
    pub bot_time_limit_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8002,
            bot_time_limit_ms: 2_000,
        }
    }
}

/// Create the router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/status", get(routes::status::status_handler))
        .route(
            "/api/games",
            get(routes::games::list_games).post(routes::games::create_game),
        )
        .route("/api/games/:id", get(routes::games::get_game))
        .route("/api/games/:id/commands", post(routes::games::post_command))
        .route("/api/games/:id/actions", get(routes::games::get_actions))
        .route("/api/games/:id/legions/:marker/moves", get(routes::games::get_moves))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(ServerState::new(config.clone()));
    let router = create_router(state);

    tracing::info!("Legions server starting on http://0.0.0.0:{}", config.port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, router).await.context("serving HTTP")?;

    Ok(())
}
