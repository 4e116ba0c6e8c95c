//! One hosted game: the lock around it, its subscribers and its bot seats
//!
//! Every command for a game goes through `GameHost::submit`, which holds the
//! game's mutex for the whole validate-and-apply step. Successful actions are
//! pushed to every subscriber channel after the mutation; closed channels are
//! dropped on the next send.

use legions_bot::Bot;
use legions_core::{Action, Command, Game, GameError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

/// Rejections in a row before a bot seat is declared stuck
const MAX_BOT_FAILURES: usize = 8;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("bot {0} is stuck: {1}")]
    BotStuck(String, GameError),

    #[error("bot task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

struct Session {
    game: Game,
    subscribers: Vec<UnboundedSender<Action>>,
}

pub struct GameHost {
    id: String,
    session: Mutex<Session>,
    bots: Mutex<HashMap<String, Bot>>,
}

impl GameHost {
    pub fn new(id: &str, game: Game, bots: Vec<Bot>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            session: Mutex::new(Session {
                game,
                subscribers: Vec::new(),
            }),
            bots: Mutex::new(bots.into_iter().map(|b| (b.name().to_string(), b)).collect()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// A copy of the game as it stands
    pub async fn snapshot(&self) -> Game {
        self.session.lock().await.game.clone()
    }

    /// Receive every action applied from now on
    pub async fn subscribe(&self) -> UnboundedReceiver<Action> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.session.lock().await.subscribers.push(tx);
        rx
    }

    pub async fn subscriber_count(&self) -> usize {
        self.session.lock().await.subscribers.len()
    }

    pub async fn has_bots(&self) -> bool {
        !self.bots.lock().await.is_empty()
    }

    /// Validate and apply one command, then fan the actions out
    pub async fn submit(&self, player: &str, command: Command) -> Result<Vec<Action>, GameError> {
        let mut session = self.session.lock().await;
        let verb = command.verb();
        let actions = match session.game.execute(player, command) {
            Ok(actions) => actions,
            Err(e) => {
                tracing::debug!("{}: {} rejected {} from {}", self.id, e, verb, player);
                return Err(e);
            }
        };
        session
            .subscribers
            .retain(|tx| actions.iter().all(|action| tx.send(action.clone()).is_ok()));
        Ok(actions)
    }

    /// Play bot seats until a human must act or the game ends. Returns the
    /// number of commands the bots sent.
    pub async fn drive_bots(&self) -> Result<usize, HostError> {
        let mut sent = 0;
        let mut failures = 0;
        loop {
            let snapshot = self.snapshot().await;
            let Some(name) = snapshot.decision_maker().map(str::to_string) else {
                return Ok(sent);
            };
            let Some(mut bot) = self.bots.lock().await.remove(&name) else {
                return Ok(sent);
            };

            // The search can take seconds, so it runs off the async workers
            // on a snapshot while the lock is free
            let (bot, command) = tokio::task::spawn_blocking(move || {
                if failures > 0 {
                    bot.reset_plan();
                }
                // Replan once from the fresh snapshot before falling back
                let command = if failures < 2 {
                    bot.choose(&snapshot)
                } else {
                    bot.fallback(&snapshot)
                };
                (bot, command)
            })
            .await?;
            self.bots.lock().await.insert(name.clone(), bot);

            let Some(command) = command else {
                return Ok(sent);
            };
            match self.submit(&name, command).await {
                Ok(_) => {
                    failures = 0;
                    sent += 1;
                }
                // A stale snapshot or a bad choice; try again from fresh state
                Err(e) => {
                    tracing::warn!("{}: bot {} command rejected: {}", self.id, name, e);
                    failures += 1;
                    if failures > MAX_BOT_FAILURES {
                        return Err(HostError::BotStuck(name, e));
                    }
                }
            }
        }
    }
}

/// Run bot seats in the background, waking on every applied action
pub fn spawn_bot_driver(host: Arc<GameHost>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut actions = host.subscribe().await;
        loop {
            match host.drive_bots().await {
                Ok(sent) if sent > 0 => tracing::debug!("{}: bots sent {} commands", host.id(), sent),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("{}: stopping bot driver: {}", host.id(), e);
                    return;
                }
            }
            if host.snapshot().await.over {
                tracing::info!("{}: game over, bot driver done", host.id());
                return;
            }
            // Wait for a human move, then skip the backlog
            if actions.recv().await.is_none() {
                return;
            }
            while actions.try_recv().is_ok() {}
        }
    })
}
