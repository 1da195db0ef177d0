//! Storage seams the service depends on.
//!
//! Implementations provide durability and per-game serialization:
//! `commit_move` is the sole mutation path for a game row and must make the
//! state update and the log append visible atomically, re-validating against
//! the row as locked rather than the caller's snapshot.
//!
//! `gridlock-postgres` is the production implementation; `gridlock-testing`
//! ships an in-memory one with the same contract.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::game::{GameRecord, MoveCommit, MoveLogEntry, Player};

/// Game rows and their append-only move logs.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Persists a freshly created game.
    async fn insert_game(&self, game: &GameRecord) -> Result<(), StoreError>;

    /// Current snapshot of a game, or `GameNotFound`.
    async fn fetch_game(&self, id: Uuid) -> Result<GameRecord, StoreError>;

    /// The full move log, ordered by ordinal.
    async fn fetch_moves(&self, id: Uuid) -> Result<Vec<MoveLogEntry>, StoreError>;

    /// Move log entries with ordinal strictly greater than `after`
    /// (all entries when `after` is `None`), ordered by ordinal.
    async fn moves_after(
        &self,
        id: Uuid,
        after: Option<i32>,
    ) -> Result<Vec<MoveLogEntry>, StoreError>;

    /// The move transaction: atomically persists the new game state and
    /// appends the move log entry, assigning the next ordinal.
    ///
    /// Either both writes become visible or neither does; a reader never
    /// observes the new board without its log entry or vice versa. The
    /// implementation must serialize commits per game and fail with
    /// `StaleGame` when the locked row no longer matches
    /// [`MoveCommit::prior_board`] — the loser of a race must fail cleanly,
    /// not corrupt the board. The whole operation is bounded by the
    /// implementation's deadline (`CommitTimeout`), and any failure rolls
    /// back completely.
    ///
    /// Not idempotent: after an ambiguous outcome (timeout), callers must
    /// re-read and re-validate rather than blindly retry.
    async fn commit_move(
        &self,
        commit: MoveCommit,
    ) -> Result<(GameRecord, MoveLogEntry), StoreError>;
}

/// Player accounts and session tokens.
///
/// Credential storage and password hashing live behind this seam; the core
/// treats passwords as opaque text.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Registers a player; `UsernameTaken` when the name is in use.
    async fn insert_player(&self, username: &str, password: &str) -> Result<Player, StoreError>;

    /// Checks credentials; `Unauthenticated` when they do not match.
    async fn verify_player(&self, username: &str, password: &str) -> Result<Player, StoreError>;

    /// Opens a session for a player and returns the token.
    async fn open_session(&self, player_id: Uuid) -> Result<String, StoreError>;

    /// Resolves a session token to its player; `Unauthenticated` when the
    /// token is unknown.
    async fn player_for_token(&self, token: &str) -> Result<Player, StoreError>;
}
