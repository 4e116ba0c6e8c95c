//! Game API endpoints
//!
//! Commands arrive as `{"player": ..., "verb": ..., args...}` and answer with
//! the actions they produced. Clients keep a mirror current by polling the
//! action log with `?since=`.

use crate::state::{ApiError, ServerState};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use legions_core::{find_all_moves, Action, Command, EntrySide, Game, GameConfig, HexLabel, Phase};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lobby listing entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameSummary {
    pub id: String,
    pub players: Vec<String>,
    pub turn: u32,
    pub phase: Phase,
    pub over: bool,
    /// Player the game is waiting on
    pub waiting_on: Option<String>,
}

impl GameSummary {
    fn of(id: &str, game: &Game) -> Self {
        Self {
            id: id.to_string(),
            players: game.players.iter().map(|p| p.name.clone()).collect(),
            turn: game.turn,
            phase: game.phase,
            over: game.over,
            waiting_on: game.decision_maker().map(str::to_string),
        }
    }
}

pub async fn list_games(State(state): State<Arc<ServerState>>) -> Json<Vec<GameSummary>> {
    let mut summaries = Vec::new();
    for host in state.games().await {
        summaries.push(GameSummary::of(host.id(), &host.snapshot().await));
    }
    Json(summaries)
}

#[derive(Deserialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub players: Vec<String>,
    #[serde(default)]
    pub bots: usize,
    #[serde(default)]
    pub config: GameConfig,
}

pub async fn create_game(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<GameSummary>), ApiError> {
    let host = state.create_game(&req.players, req.bots, req.config).await?;
    let summary = GameSummary::of(host.id(), &host.snapshot().await);
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Full game state
pub async fn get_game(State(state): State<Arc<ServerState>>, Path(id): Path<String>) -> Result<Json<Game>, ApiError> {
    let host = state.game(&id).await?;
    Ok(Json(host.snapshot().await))
}

#[derive(Deserialize)]
pub struct CommandRequest {
    pub player: String,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Serialize)]
pub struct CommandResponse {
    pub actions: Vec<Action>,
}

pub async fn post_command(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let host = state.game(&id).await?;
    let actions = host.submit(&req.player, req.command).await?;
    Ok(Json(CommandResponse { actions }))
}

#[derive(Deserialize)]
pub struct SinceParams {
    #[serde(default)]
    pub since: usize,
}

#[derive(Serialize)]
pub struct ActionLog {
    /// Index to pass as `since` next time
    pub next: usize,
    pub actions: Vec<Action>,
}

pub async fn get_actions(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Query(params): Query<SinceParams>,
) -> Result<Json<ActionLog>, ApiError> {
    let host = state.game(&id).await?;
    let game = host.snapshot().await;
    let actions = game.history.get(params.since..).map(<[Action]>::to_vec).unwrap_or_default();
    Ok(Json(ActionLog {
        next: game.history.len(),
        actions,
    }))
}

#[derive(Serialize)]
pub struct LegalMove {
    pub hex: HexLabel,
    pub entry_side: EntrySide,
}

/// Legal master-board moves for one legion at its owner's current roll
pub async fn get_moves(
    State(state): State<Arc<ServerState>>,
    Path((id, marker)): Path<(String, String)>,
) -> Result<Json<Vec<LegalMove>>, ApiError> {
    let host = state.game(&id).await?;
    let game = host.snapshot().await;
    let legion = game
        .legion(&marker)
        .ok_or_else(|| ApiError::BadRequest(format!("no legion {marker}")))?;
    let owner = game
        .player(&legion.owner)
        .ok_or_else(|| ApiError::BadRequest(format!("no player {}", legion.owner)))?;
    let moves = find_all_moves(legion, &game.legions(), game.move_context(owner))
        .into_iter()
        .map(|(hex, entry_side)| LegalMove { hex, entry_side })
        .collect();
    Ok(Json(moves))
}
