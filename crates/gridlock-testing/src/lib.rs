//! In-memory implementations of the gridlock storage seams.
//!
//! `MemoryGameStore` implements the same contract as the PostgreSQL store —
//! per-game serialization, compare-and-set re-validation, append-only move
//! log — so service behavior can be exercised without a database. A game's
//! record and its move log live in one map entry; holding that entry's lock
//! for the duration of `commit_move` makes the two writes atomic with
//! respect to every reader.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gridlock_core::{
    GameRecord, GameStore, IdentityStore, MoveCommit, MoveLogEntry, Player, StoreError,
};
use uuid::Uuid;

struct StoredGame {
    record: GameRecord,
    moves: Vec<MoveLogEntry>,
}

struct StoredPlayer {
    player: Player,
    password: String,
}

/// In-memory game and identity store.
#[derive(Default)]
pub struct MemoryGameStore {
    games: DashMap<Uuid, StoredGame>,
    players: DashMap<Uuid, StoredPlayer>,
    usernames: DashMap<String, Uuid>,
    sessions: DashMap<String, Uuid>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seats a second player, standing in for the external join path so
    /// tests can drive games past the not-started state.
    pub fn bind_opponent(&self, game_id: Uuid, player_id: Uuid) -> Result<(), StoreError> {
        let mut stored = self
            .games
            .get_mut(&game_id)
            .ok_or(StoreError::GameNotFound { id: game_id })?;
        stored.record.o_player = Some(player_id);
        stored.record.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl GameStore for MemoryGameStore {
    async fn insert_game(&self, game: &GameRecord) -> Result<(), StoreError> {
        self.games.insert(
            game.id,
            StoredGame {
                record: game.clone(),
                moves: Vec::new(),
            },
        );
        Ok(())
    }

    async fn fetch_game(&self, id: Uuid) -> Result<GameRecord, StoreError> {
        self.games
            .get(&id)
            .map(|stored| stored.record.clone())
            .ok_or(StoreError::GameNotFound { id })
    }

    async fn fetch_moves(&self, id: Uuid) -> Result<Vec<MoveLogEntry>, StoreError> {
        self.games
            .get(&id)
            .map(|stored| stored.moves.clone())
            .ok_or(StoreError::GameNotFound { id })
    }

    async fn moves_after(
        &self,
        id: Uuid,
        after: Option<i32>,
    ) -> Result<Vec<MoveLogEntry>, StoreError> {
        let stored = self
            .games
            .get(&id)
            .ok_or(StoreError::GameNotFound { id })?;
        let floor = after.unwrap_or(-1);
        Ok(stored
            .moves
            .iter()
            .filter(|entry| entry.ord > floor)
            .cloned()
            .collect())
    }

    async fn commit_move(
        &self,
        commit: MoveCommit,
    ) -> Result<(GameRecord, MoveLogEntry), StoreError> {
        // The entry lock is held until return; readers and racing commits
        // block on it, which is this store's per-game serialization point.
        let mut stored = self
            .games
            .get_mut(&commit.game_id)
            .ok_or(StoreError::GameNotFound { id: commit.game_id })?;

        if stored.record.board != commit.prior_board {
            return Err(StoreError::StaleGame { id: commit.game_id });
        }

        let now = Utc::now();
        let ord = stored.moves.last().map_or(0, |entry| entry.ord + 1);
        let entry = MoveLogEntry {
            game_id: commit.game_id,
            ord,
            board_before: commit.prior_board,
            tile: commit.tile,
            x_turn_after: commit.x_turn,
            outcome_after: commit.outcome,
            played_at: now,
        };

        stored.record.board = commit.board;
        stored.record.x_turn = commit.x_turn;
        stored.record.outcome = commit.outcome;
        stored.record.updated_at = now;
        stored.moves.push(entry.clone());

        Ok((stored.record.clone(), entry))
    }
}

#[async_trait]
impl IdentityStore for MemoryGameStore {
    async fn insert_player(&self, username: &str, password: &str) -> Result<Player, StoreError> {
        match self.usernames.entry(username.to_owned()) {
            Entry::Occupied(_) => Err(StoreError::UsernameTaken {
                username: username.to_owned(),
            }),
            Entry::Vacant(slot) => {
                let player = Player {
                    id: Uuid::new_v4(),
                    username: username.to_owned(),
                };
                slot.insert(player.id);
                self.players.insert(
                    player.id,
                    StoredPlayer {
                        player: player.clone(),
                        password: password.to_owned(),
                    },
                );
                Ok(player)
            }
        }
    }

    async fn verify_player(&self, username: &str, password: &str) -> Result<Player, StoreError> {
        let id = *self
            .usernames
            .get(username)
            .ok_or(StoreError::Unauthenticated)?;
        let stored = self.players.get(&id).ok_or(StoreError::Unauthenticated)?;
        if stored.password != password {
            return Err(StoreError::Unauthenticated);
        }
        Ok(stored.player.clone())
    }

    async fn open_session(&self, player_id: Uuid) -> Result<String, StoreError> {
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(token.clone(), player_id);
        Ok(token)
    }

    async fn player_for_token(&self, token: &str) -> Result<Player, StoreError> {
        let player_id = *self
            .sessions
            .get(token)
            .ok_or(StoreError::Unauthenticated)?;
        self.players
            .get(&player_id)
            .map(|stored| stored.player.clone())
            .ok_or(StoreError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridlock_core::{apply_move, outcome, Board, Tile};

    #[tokio::test]
    async fn register_login_and_token_lookup() {
        let store = MemoryGameStore::new();
        let player = store.insert_player("user1", "password123").await.unwrap();

        let verified = store.verify_player("user1", "password123").await.unwrap();
        assert_eq!(verified, player);
        assert!(matches!(
            store.verify_player("user1", "wrong").await,
            Err(StoreError::Unauthenticated)
        ));

        let token = store.open_session(player.id).await.unwrap();
        assert_eq!(store.player_for_token(&token).await.unwrap(), player);
        assert!(matches!(
            store.player_for_token("bogus").await,
            Err(StoreError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn duplicate_usernames_are_rejected() {
        let store = MemoryGameStore::new();
        store.insert_player("user1", "password123").await.unwrap();
        assert!(matches!(
            store.insert_player("user1", "other-pass").await,
            Err(StoreError::UsernameTaken { .. })
        ));
    }

    #[tokio::test]
    async fn commit_assigns_strictly_increasing_ordinals() {
        let store = MemoryGameStore::new();
        let game = GameRecord::new(Uuid::new_v4());
        store.insert_game(&game).await.unwrap();

        let mut board = Board::empty();
        let mut x_turn = true;
        for (i, tile) in [Tile::new(0, 0), Tile::new(1, 1), Tile::new(2, 2)]
            .into_iter()
            .enumerate()
        {
            let (next, turn) = apply_move(&board, x_turn, tile).unwrap();
            let (_, entry) = store
                .commit_move(MoveCommit {
                    game_id: game.id,
                    tile,
                    prior_board: board,
                    board: next,
                    x_turn: turn,
                    outcome: outcome(&next),
                })
                .await
                .unwrap();
            assert_eq!(entry.ord, i as i32);
            board = next;
            x_turn = turn;
        }

        let moves = store.fetch_moves(game.id).await.unwrap();
        assert_eq!(moves.len(), 3);
        assert_eq!(
            store.moves_after(game.id, Some(0)).await.unwrap().len(),
            2
        );
        assert_eq!(store.moves_after(game.id, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn stale_commits_are_rejected_and_append_nothing() {
        let store = MemoryGameStore::new();
        let game = GameRecord::new(Uuid::new_v4());
        store.insert_game(&game).await.unwrap();

        let tile = Tile::new(0, 0);
        let (next, turn) = apply_move(&game.board, true, tile).unwrap();
        let commit = MoveCommit {
            game_id: game.id,
            tile,
            prior_board: game.board,
            board: next,
            x_turn: turn,
            outcome: outcome(&next),
        };

        store.commit_move(commit.clone()).await.unwrap();
        // Same prior snapshot again: the row has moved on.
        assert!(matches!(
            store.commit_move(commit).await,
            Err(StoreError::StaleGame { .. })
        ));

        let moves = store.fetch_moves(game.id).await.unwrap();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].ord, 0);
    }
}
