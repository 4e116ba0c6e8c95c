//! Server state management
//!
//! The lobby of hosted games plus the error type handlers return.

use crate::host::{spawn_bot_driver, GameHost};
use crate::ServerConfig;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use legions_bot::{Bot, BotConfig};
use legions_core::{Game, GameConfig, GameError};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors a handler can answer with
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no game {0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Rejected(#[from] GameError),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Rejected(GameError::IllegalMove(_)) => "illegal_move",
            ApiError::Rejected(GameError::IllegalRecruit(_)) => "illegal_recruit",
            ApiError::Rejected(GameError::OutOfTurn(_)) => "out_of_turn",
            ApiError::Rejected(GameError::InvariantViolation(_)) => "invariant_violation",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Rejected(GameError::OutOfTurn(_)) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) | ApiError::Rejected(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

/// Server-wide shared state
pub struct ServerState {
    pub config: ServerConfig,
    games: RwLock<BTreeMap<String, Arc<GameHost>>>,
    next_id: AtomicU64,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            games: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn game(&self, id: &str) -> Result<Arc<GameHost>, ApiError> {
        self.games
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }

    pub async fn games(&self) -> Vec<Arc<GameHost>> {
        self.games.read().await.values().cloned().collect()
    }

    /// Start a game with the named human seats followed by `bots` bot seats
    pub async fn create_game(
        &self,
        humans: &[String],
        bots: usize,
        config: GameConfig,
    ) -> Result<Arc<GameHost>, ApiError> {
        let id = format!("g{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut game = Game::new(&id, config);
        for name in humans {
            game.add_player(name)?;
        }

        let mut seated = Vec::with_capacity(bots);
        for i in 1..=bots {
            let mut name = format!("bot{i}");
            while game.player(&name).is_some() {
                name.push('_');
            }
            game.add_player(&name)?;
            let mut bot_config = BotConfig::default().with_time_limit_ms(self.config.bot_time_limit_ms);
            if let Some(seed) = game.config.seed {
                bot_config = bot_config.with_seed(seed.wrapping_add(i as u64));
            }
            seated.push(Bot::new(&name, bot_config));
        }
        if game.players.len() < 2 {
            return Err(ApiError::BadRequest("a game needs at least two players".to_string()));
        }
        game.start()?;

        let host = GameHost::new(&id, game, seated);
        if host.has_bots().await {
            spawn_bot_driver(host.clone());
        }
        self.games.write().await.insert(id.clone(), host.clone());
        tracing::info!("created game {} ({} humans, {} bots)", id, humans.len(), bots);
        Ok(host)
    }
}
