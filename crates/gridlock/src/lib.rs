//! # Gridlock
//!
//! A turn-based 3x3 game service core: two authenticated players alternate
//! moves, every move is durably logged, and observers stream the log live.
//!
//! ## Architecture
//!
//! ```text
//! make_move(token, game_id, tile)
//!     │
//!     ├─► player_for_token ──┐   concurrent reads; first failure
//!     ├─► fetch_game ────────┤   cancels the sibling
//!     │                      ▼
//!     │              validate_move          (all violations collected)
//!     │                      │
//!     │              apply_move / outcome   (pure, snapshot in/out)
//!     │                      ▼
//!     └──────────────► commit_move          (atomic: game update +
//!                                            move-log append, bounded
//!                                            deadline, rollback on failure)
//! ```
//!
//! ## Key invariants
//!
//! 1. **The core is pure** - board, rules, and validator never do IO; they
//!    take snapshots and return new ones.
//! 2. **One move = one transaction** - the game-state update and the
//!    move-log append are a single unit of work; no observer ever sees one
//!    without the other.
//! 3. **The store is the serialization point** - commits re-validate against
//!    the row as locked; the loser of a race fails cleanly with a stale-game
//!    error instead of corrupting the board.
//! 4. **Terminal outcomes are write-once** - a concluded game never re-enters
//!    play, enforced by the validator in front of the only mutation path.
//! 5. **The move log is append-only** - entries are never updated or
//!    deleted; ordinals increase strictly per game.

mod board;
mod error;
mod game;
mod rules;
mod service;
mod store;
mod validate;

// Re-export board types
pub use board::{Board, Cell, Mark, Tile, BOARD_CELLS, BOARD_SIDE};

// Re-export rule engine
pub use rules::{apply_move, outcome, Outcome};

// Re-export validation
pub use validate::{
    validate_move, validate_registration, Subject, Violation, Violations, MAX_PASSWORD_LEN,
    MAX_USERNAME_LEN, MIN_PASSWORD_LEN, MIN_USERNAME_LEN,
};

// Re-export domain records
pub use game::{GameRecord, MoveCommit, MoveLogEntry, Player};

// Re-export storage seams
pub use store::{GameStore, IdentityStore};

// Re-export error types
pub use error::{BoardError, ServiceError, StoreError};

// Re-export service types
pub use service::{GameService, ServiceConfig};

// Re-export commonly used external types
pub use async_trait::async_trait;
