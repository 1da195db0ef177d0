//! The game service: validator -> rule engine -> move transaction.
//!
//! `GameService` is generic over the storage seams so the same orchestration
//! runs against PostgreSQL in production and the in-memory store in tests.
//! It holds no game state of its own: every request reads a snapshot,
//! computes the successor purely, and hands both to the store's single
//! serialization point.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::board::Tile;
use crate::error::ServiceError;
use crate::game::{GameRecord, MoveCommit, MoveLogEntry, Player};
use crate::rules::{apply_move, outcome};
use crate::store::{GameStore, IdentityStore};
use crate::validate::{validate_move, validate_registration};

/// Tunables for the service. Everything else (pool sizing, transport) is
/// the embedding process's concern.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How often `watch_moves` polls for new log entries.
    pub poll_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
        }
    }
}

pub struct GameService<S> {
    store: Arc<S>,
    config: ServiceConfig,
}

impl<S> Clone for GameService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S> GameService<S>
where
    S: GameStore + IdentityStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, ServiceConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    /// Registers a player after checking the credential bounds.
    pub async fn register_player(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Player, ServiceError> {
        validate_registration(username, password).map_err(ServiceError::Rejected)?;
        let player = self.store.insert_player(username, password).await?;
        info!(player_id = %player.id, username = %player.username, "registered player");
        Ok(player)
    }

    /// Verifies credentials and opens a session, returning its token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ServiceError> {
        let player = self.store.verify_player(username, password).await?;
        let token = self.store.open_session(player.id).await?;
        info!(player_id = %player.id, "opened session");
        Ok(token)
    }

    /// Resolves a session token to its player.
    pub async fn whoami(&self, token: &str) -> Result<Player, ServiceError> {
        Ok(self.store.player_for_token(token).await?)
    }

    /// Creates a game with the requester seated as X. The O seat stays empty
    /// until the external join path binds an opponent.
    pub async fn create_game(&self, token: &str) -> Result<GameRecord, ServiceError> {
        let player = self.store.player_for_token(token).await?;
        let game = GameRecord::new(player.id);
        self.store.insert_game(&game).await?;
        info!(game_id = %game.id, x_player = %player.id, "created game");
        Ok(game)
    }

    /// Current snapshot of a game together with its full move log.
    ///
    /// The two reads are independent and run concurrently; the first failure
    /// cancels the sibling and fails the request.
    pub async fn get_game(
        &self,
        id: Uuid,
    ) -> Result<(GameRecord, Vec<MoveLogEntry>), ServiceError> {
        let (game, moves) =
            tokio::try_join!(self.store.fetch_game(id), self.store.fetch_moves(id))?;
        Ok((game, moves))
    }

    /// Applies one move end to end: concurrent identity + game fetch,
    /// precondition validation, pure rule application, atomic commit.
    ///
    /// Precondition violations and malformed input are never retried; an
    /// infrastructure failure (`err.retryable()`) may be retried by running
    /// the whole cycle again, since the game may have moved on.
    pub async fn make_move(
        &self,
        token: &str,
        game_id: Uuid,
        tile: Tile,
    ) -> Result<GameRecord, ServiceError> {
        let (player, game) = tokio::try_join!(
            self.store.player_for_token(token),
            self.store.fetch_game(game_id),
        )?;

        validate_move(&game, player.id).map_err(|violations| {
            debug!(game_id = %game_id, player_id = %player.id, ?violations, "move rejected");
            ServiceError::Rejected(violations)
        })?;

        let (board, x_turn) = apply_move(&game.board, game.x_turn, tile)?;
        let next_outcome = outcome(&board);

        let commit = MoveCommit {
            game_id,
            tile,
            prior_board: game.board,
            board,
            x_turn,
            outcome: next_outcome,
        };
        let (updated, entry) = self.store.commit_move(commit).await.map_err(|err| {
            warn!(game_id = %game_id, error = %err, "move transaction failed");
            err
        })?;

        info!(
            game_id = %game_id,
            ord = entry.ord,
            outcome = ?updated.outcome,
            "committed move"
        );
        Ok(updated)
    }

    /// Streams a game's move log in ordinal order.
    ///
    /// A lazy, single-consumer pull loop: entries already logged are yielded
    /// immediately, then the latest ordinal is polled at the configured
    /// interval. The stream ends after yielding an entry with a terminal
    /// outcome — or, when the game record itself shows a conclusion the
    /// watcher has already seen (a reconnect resuming at the final ordinal,
    /// or an external forfeit that logs no move), without yielding anything —
    /// so it is finite once the game concludes. Reconnecting clients resume
    /// from their last seen ordinal via `resume_after`.
    pub fn watch_moves(
        &self,
        game_id: Uuid,
        resume_after: Option<i32>,
    ) -> impl Stream<Item = Result<MoveLogEntry, ServiceError>> {
        struct Watch<S> {
            store: Arc<S>,
            last_ord: Option<i32>,
            pending: VecDeque<MoveLogEntry>,
            concluded: bool,
            done: bool,
        }

        let state = Watch {
            store: Arc::clone(&self.store),
            last_ord: resume_after,
            pending: VecDeque::new(),
            concluded: false,
            done: false,
        };
        let poll_interval = self.config.poll_interval;

        stream::unfold(state, move |mut state| async move {
            if state.done {
                return None;
            }
            loop {
                if let Some(entry) = state.pending.pop_front() {
                    state.last_ord = Some(entry.ord);
                    if entry.outcome_after.is_terminal() {
                        state.done = true;
                    }
                    return Some((Ok(entry), state));
                }

                match state.store.moves_after(game_id, state.last_ord).await {
                    Ok(batch) if !batch.is_empty() => {
                        state.pending.extend(batch);
                        continue;
                    }
                    // The log was drained again after the conclusion was
                    // observed; commits are atomic, so nothing is in flight.
                    Ok(_) if state.concluded => {
                        state.done = true;
                        return None;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        state.done = true;
                        return Some((Err(err.into()), state));
                    }
                }

                match state.store.fetch_game(game_id).await {
                    Ok(game) if game.outcome.is_terminal() => state.concluded = true,
                    Ok(_) => tokio::time::sleep(poll_interval).await,
                    Err(err) => {
                        state.done = true;
                        return Some((Err(err.into()), state));
                    }
                }
            }
        })
    }
}
