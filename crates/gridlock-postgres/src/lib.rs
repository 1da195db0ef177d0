//! PostgreSQL implementation of the gridlock storage seams.
//!
//! This crate provides the production implementation of the `GameStore` and
//! `IdentityStore` traits from `gridlock-core`.
//!
//! # Features
//!
//! - Per-game serialization with `SELECT ... FOR UPDATE` row locking
//! - Compare-and-set re-validation against the locked row, so a move
//!   validated against a stale snapshot fails cleanly instead of
//!   double-applying
//! - Store-assigned, strictly increasing move ordinals with a
//!   `(game_id, ord)` primary key as the append-only backstop
//! - Bounded commit deadline with rollback on timeout
//!
//! # Database Schema
//!
//! ```sql
//! CREATE TABLE players (
//!     id UUID PRIMARY KEY,
//!     username TEXT NOT NULL UNIQUE,
//!     passwd TEXT NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE TABLE sessions (
//!     token TEXT PRIMARY KEY,
//!     player_id UUID NOT NULL REFERENCES players (id),
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE TABLE games (
//!     id UUID PRIMARY KEY,
//!     x_player UUID NOT NULL REFERENCES players (id),
//!     o_player UUID REFERENCES players (id),
//!     board TEXT NOT NULL,
//!     x_turn BOOLEAN NOT NULL,
//!     outcome TEXT NOT NULL DEFAULT 'playing',
//!     started_at TIMESTAMPTZ NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE game_moves (
//!     game_id UUID NOT NULL REFERENCES games (id),
//!     ord INTEGER NOT NULL,
//!     board_before TEXT NOT NULL,
//!     move_row SMALLINT NOT NULL,
//!     move_col SMALLINT NOT NULL,
//!     x_turn BOOLEAN NOT NULL,
//!     outcome TEXT NOT NULL,
//!     played_at TIMESTAMPTZ NOT NULL,
//!     PRIMARY KEY (game_id, ord)
//! );
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use gridlock_core::GameService;
//! use gridlock_postgres::PgGameStore;
//! use sqlx::PgPool;
//! use std::sync::Arc;
//!
//! let pool = PgPool::connect("postgres://localhost/gridlock").await?;
//! let service = GameService::new(Arc::new(PgGameStore::new(pool)));
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gridlock_core::{
    Board, GameRecord, GameStore, IdentityStore, MoveCommit, MoveLogEntry, Outcome, Player,
    StoreError, Tile,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};
use uuid::Uuid;

/// PostgreSQL game and identity store.
#[derive(Clone)]
pub struct PgGameStore {
    pool: PgPool,
    commit_timeout_ms: i64,
}

impl PgGameStore {
    /// Create a new PostgreSQL store.
    ///
    /// # Default Settings
    ///
    /// - Move transaction deadline: 5 seconds
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            commit_timeout_ms: 5_000,
        }
    }

    /// Create a store with a custom move transaction deadline.
    ///
    /// A commit that exceeds the deadline is aborted and rolled back; the
    /// caller must re-read and re-validate before trying again.
    pub fn with_commit_timeout(pool: PgPool, timeout_ms: i64) -> Self {
        Self {
            pool,
            commit_timeout_ms: timeout_ms,
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The move transaction body. Dropping the `Transaction` on any early
    /// return (or when the timeout cancels this future mid-await) rolls
    /// everything back, so no exit path leaves a half-applied move.
    async fn commit_move_locked(
        &self,
        commit: &MoveCommit,
    ) -> Result<(GameRecord, MoveLogEntry), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Lock the game row: the sole serialization point for this game.
        let row = sqlx::query(
            r#"
            SELECT x_player, o_player, board, started_at
            FROM games
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(commit.game_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?
        .ok_or(StoreError::GameNotFound { id: commit.game_id })?;

        // Re-validate against the row as locked, not the caller's snapshot.
        let locked_board: String = row.get("board");
        if locked_board != commit.prior_board.encode() {
            return Err(StoreError::StaleGame { id: commit.game_id });
        }

        let played_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE games
            SET board = $1,
                x_turn = $2,
                outcome = $3,
                updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(commit.board.encode())
        .bind(commit.x_turn)
        .bind(commit.outcome.as_tag())
        .bind(played_at)
        .bind(commit.game_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| StoreError::GameUpdateFailed {
            id: commit.game_id,
            source: err.into(),
        })?;

        let ord: i32 = sqlx::query(
            r#"
            SELECT COALESCE(MAX(ord) + 1, 0) AS ord
            FROM game_moves
            WHERE game_id = $1
            "#,
        )
        .bind(commit.game_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| StoreError::MoveAppendFailed {
            id: commit.game_id,
            source: err.into(),
        })?
        .get("ord");

        sqlx::query(
            r#"
            INSERT INTO game_moves
                (game_id, ord, board_before, move_row, move_col, x_turn, outcome, played_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(commit.game_id)
        .bind(ord)
        .bind(commit.prior_board.encode())
        .bind(i16::from(commit.tile.row))
        .bind(i16::from(commit.tile.col))
        .bind(commit.x_turn)
        .bind(commit.outcome.as_tag())
        .bind(played_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| StoreError::MoveAppendFailed {
            id: commit.game_id,
            source: err.into(),
        })?;

        tx.commit().await.map_err(backend)?;
        debug!(game_id = %commit.game_id, ord, "committed game update and move append");

        let record = GameRecord {
            id: commit.game_id,
            x_player: row.get("x_player"),
            o_player: row.get("o_player"),
            board: commit.board,
            x_turn: commit.x_turn,
            outcome: commit.outcome,
            started_at: row.get("started_at"),
            updated_at: played_at,
        };
        let entry = MoveLogEntry {
            game_id: commit.game_id,
            ord,
            board_before: commit.prior_board,
            tile: commit.tile,
            x_turn_after: commit.x_turn,
            outcome_after: commit.outcome,
            played_at,
        };
        Ok((record, entry))
    }
}

#[async_trait]
impl GameStore for PgGameStore {
    async fn insert_game(&self, game: &GameRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO games
                (id, x_player, o_player, board, x_turn, outcome, started_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(game.id)
        .bind(game.x_player)
        .bind(game.o_player)
        .bind(game.board.encode())
        .bind(game.x_turn)
        .bind(game.outcome.as_tag())
        .bind(game.started_at)
        .bind(game.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn fetch_game(&self, id: Uuid) -> Result<GameRecord, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, x_player, o_player, board, x_turn, outcome, started_at, updated_at
            FROM games
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::GameNotFound { id })?;

        row_to_game(&row)
    }

    async fn fetch_moves(&self, id: Uuid) -> Result<Vec<MoveLogEntry>, StoreError> {
        self.moves_after(id, None).await
    }

    async fn moves_after(
        &self,
        id: Uuid,
        after: Option<i32>,
    ) -> Result<Vec<MoveLogEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT game_id, ord, board_before, move_row, move_col, x_turn, outcome, played_at
            FROM game_moves
            WHERE game_id = $1
              AND ($2::INT4 IS NULL OR ord > $2)
            ORDER BY ord ASC
            "#,
        )
        .bind(id)
        .bind(after)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(row_to_entry).collect()
    }

    /// Bounded move transaction: update the game row and append the move
    /// log entry as one unit of work, within the configured deadline.
    async fn commit_move(
        &self,
        commit: MoveCommit,
    ) -> Result<(GameRecord, MoveLogEntry), StoreError> {
        let deadline = Duration::from_millis(self.commit_timeout_ms.max(0) as u64);
        match tokio::time::timeout(deadline, self.commit_move_locked(&commit)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    game_id = %commit.game_id,
                    timeout_ms = self.commit_timeout_ms,
                    "move transaction timed out; rolled back"
                );
                Err(StoreError::CommitTimeout {
                    id: commit.game_id,
                    timeout_ms: self.commit_timeout_ms,
                })
            }
        }
    }
}

#[async_trait]
impl IdentityStore for PgGameStore {
    async fn insert_player(&self, username: &str, password: &str) -> Result<Player, StoreError> {
        let player = Player {
            id: Uuid::new_v4(),
            username: username.to_owned(),
        };

        sqlx::query(
            r#"
            INSERT INTO players (id, username, passwd, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(player.id)
        .bind(username)
        .bind(password)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::UsernameTaken {
                username: username.to_owned(),
            },
            _ => backend(err),
        })?;

        Ok(player)
    }

    async fn verify_player(&self, username: &str, password: &str) -> Result<Player, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, username
            FROM players
            WHERE username = $1 AND passwd = $2
            "#,
        )
        .bind(username)
        .bind(password)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::Unauthenticated)?;

        Ok(Player {
            id: row.get("id"),
            username: row.get("username"),
        })
    }

    async fn open_session(&self, player_id: Uuid) -> Result<String, StoreError> {
        let token = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO sessions (token, player_id, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&token)
        .bind(player_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(token)
    }

    async fn player_for_token(&self, token: &str) -> Result<Player, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT p.id, p.username
            FROM sessions s
            JOIN players p ON p.id = s.player_id
            WHERE s.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::Unauthenticated)?;

        Ok(Player {
            id: row.get("id"),
            username: row.get("username"),
        })
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.into())
}

fn row_to_game(row: &PgRow) -> Result<GameRecord, StoreError> {
    let id: Uuid = row.get("id");
    let board_text: String = row.get("board");
    let board =
        Board::decode(&board_text).map_err(|source| StoreError::CorruptBoard { id, source })?;
    let outcome_tag: String = row.get("outcome");
    let outcome = Outcome::from_tag(&outcome_tag).ok_or_else(|| {
        StoreError::Backend(anyhow::anyhow!(
            "unknown outcome tag {outcome_tag:?} on game {id}"
        ))
    })?;

    let started_at: DateTime<Utc> = row.get("started_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");
    Ok(GameRecord {
        id,
        x_player: row.get("x_player"),
        o_player: row.get("o_player"),
        board,
        x_turn: row.get("x_turn"),
        outcome,
        started_at,
        updated_at,
    })
}

fn row_to_entry(row: &PgRow) -> Result<MoveLogEntry, StoreError> {
    let game_id: Uuid = row.get("game_id");
    let board_text: String = row.get("board_before");
    let board_before = Board::decode(&board_text)
        .map_err(|source| StoreError::CorruptBoard { id: game_id, source })?;
    let outcome_tag: String = row.get("outcome");
    let outcome_after = Outcome::from_tag(&outcome_tag).ok_or_else(|| {
        StoreError::Backend(anyhow::anyhow!(
            "unknown outcome tag {outcome_tag:?} on a move for game {game_id}"
        ))
    })?;

    let move_row: i16 = row.get("move_row");
    let move_col: i16 = row.get("move_col");
    let played_at: DateTime<Utc> = row.get("played_at");
    Ok(MoveLogEntry {
        game_id,
        ord: row.get("ord"),
        board_before,
        tile: tile_from_coords(game_id, move_row, move_col)?,
        x_turn_after: row.get("x_turn"),
        outcome_after,
        played_at,
    })
}

// The columns are SMALLINT; a value outside u8 is corrupt data and must
// surface as an error rather than be truncated into a plausible tile.
fn tile_from_coords(game_id: Uuid, row: i16, col: i16) -> Result<Tile, StoreError> {
    match (u8::try_from(row), u8::try_from(col)) {
        (Ok(row), Ok(col)) => Ok(Tile::new(row, col)),
        _ => Err(StoreError::Backend(anyhow::anyhow!(
            "corrupt move coordinates ({row}, {col}) on a move for game {game_id}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_coordinates_outside_u8_are_corrupt() {
        let game_id = Uuid::new_v4();
        assert_eq!(
            tile_from_coords(game_id, 0, 2).unwrap(),
            Tile::new(0, 2)
        );
        // 300 as u8 would wrap to 44; the conversion must fail instead.
        for (row, col) in [(300, 0), (0, 300), (-1, 0), (0, -1)] {
            assert!(matches!(
                tile_from_coords(game_id, row, col),
                Err(StoreError::Backend(_))
            ));
        }
    }
}
