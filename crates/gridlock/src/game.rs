//! Persisted domain records: players, games, and the append-only move log.
//!
//! The store owns these rows; the core only ever sees immutable snapshots
//! and produces new ones. The single mutation path is
//! [`GameStore::commit_move`](crate::store::GameStore::commit_move).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board::{Board, Tile};
use crate::rules::Outcome;

/// A registered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub username: String,
}

/// Snapshot of one game row.
///
/// The first player is always present and plays X. The second slot stays
/// empty until an opponent is bound to the game by the external join path;
/// until then the game has not started and no move is legal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: Uuid,
    pub x_player: Uuid,
    pub o_player: Option<Uuid>,
    pub board: Board,
    pub x_turn: bool,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameRecord {
    /// A freshly created game: empty board, X to move, still in play.
    pub fn new(x_player: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            x_player,
            o_player: None,
            board: Board::empty(),
            x_turn: true,
            outcome: Outcome::Playing,
            started_at: now,
            updated_at: now,
        }
    }

    /// The player whose turn it is, if that seat is filled.
    pub fn turn_player(&self) -> Option<Uuid> {
        if self.x_turn {
            Some(self.x_player)
        } else {
            self.o_player
        }
    }
}

/// One committed move, recorded for audit, replay, and streaming.
///
/// Entries are append-only: never updated, never deleted, with a strictly
/// increasing per-game `ord` assigned by the store inside the move
/// transaction. `board_before` is the board the move was played on, which
/// together with the tile makes the game replayable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveLogEntry {
    pub game_id: Uuid,
    pub ord: i32,
    pub board_before: Board,
    pub tile: Tile,
    pub x_turn_after: bool,
    pub outcome_after: Outcome,
    pub played_at: DateTime<Utc>,
}

/// Input to the move transaction: the new state to persist plus the prior
/// board, which serves both as the log entry's replay snapshot and as the
/// compare-and-set guard the store re-checks against the locked row.
#[derive(Debug, Clone)]
pub struct MoveCommit {
    pub game_id: Uuid,
    pub tile: Tile,
    pub prior_board: Board,
    pub board: Board,
    pub x_turn: bool,
    pub outcome: Outcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_games_start_empty_with_x_to_move() {
        let x_player = Uuid::new_v4();
        let game = GameRecord::new(x_player);
        assert_eq!(game.board, Board::empty());
        assert!(game.x_turn);
        assert_eq!(game.outcome, Outcome::Playing);
        assert_eq!(game.o_player, None);
        assert_eq!(game.turn_player(), Some(x_player));
    }

    #[test]
    fn turn_player_is_absent_when_o_moves_before_joining() {
        let mut game = GameRecord::new(Uuid::new_v4());
        game.x_turn = false;
        assert_eq!(game.turn_player(), None);
    }
}
