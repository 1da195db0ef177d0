//! Error types for the board core, the storage seam, and the service.

use thiserror::Error;
use uuid::Uuid;

use crate::validate::Violations;

/// Structurally invalid input to the board core, plus the one precondition
/// the rule engine itself checks (the target cell).
///
/// These are values, not ambient signals: callers match on them and the
/// board they were produced from is always left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    /// The text is not nine cells of `_`, `x`, `o`.
    #[error("malformed board {text:?}: expected 9 cells drawn from '_', 'x', 'o'")]
    MalformedBoard { text: String },

    /// Row or column outside `[0, 2]`.
    #[error("tile ({row}, {col}) is outside the 3x3 grid")]
    InvalidTile { row: u8, col: u8 },

    /// The target cell already holds a mark.
    #[error("cell ({row}, {col}) is already occupied")]
    CellOccupied { row: u8, col: u8 },
}

/// Failures at the storage seam.
///
/// The two halves of the move transaction fail distinguishably
/// (`GameUpdateFailed` vs `MoveAppendFailed`) for diagnostics, but both roll
/// back identically — a partially applied transaction is never observable.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("game {id} not found")]
    GameNotFound { id: Uuid },

    /// No session for the supplied token, or credentials did not match.
    #[error("no player matches the supplied token or credentials")]
    Unauthenticated,

    #[error("username {username:?} is already taken")]
    UsernameTaken { username: String },

    /// The persisted board text failed to decode. Surfaced as-is: a corrupt
    /// row must never be read back as an empty board.
    #[error("stored board for game {id} is corrupt")]
    CorruptBoard {
        id: Uuid,
        #[source]
        source: BoardError,
    },

    /// The game row changed between the caller's read and the commit. The
    /// caller's validation ran against stale state; it must re-read and run
    /// the whole read-validate-apply cycle again.
    #[error("game {id} was updated concurrently; re-read before retrying")]
    StaleGame { id: Uuid },

    #[error("failed to update game state for game {id}")]
    GameUpdateFailed {
        id: Uuid,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to append move log entry for game {id}")]
    MoveAppendFailed {
        id: Uuid,
        #[source]
        source: anyhow::Error,
    },

    /// The transaction exceeded its deadline and was rolled back. The
    /// outcome is ambiguous to the caller only in the sense that state may
    /// have moved on; nothing from this attempt was committed.
    #[error("move transaction for game {id} timed out after {timeout_ms}ms")]
    CommitTimeout { id: Uuid, timeout_ms: i64 },

    #[error("storage backend failure")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Whether retrying the whole read-validate-apply cycle makes sense.
    ///
    /// Infrastructure failures are retryable from scratch; rejections tied
    /// to the request itself are not.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            StoreError::StaleGame { .. }
                | StoreError::GameUpdateFailed { .. }
                | StoreError::MoveAppendFailed { .. }
                | StoreError::CommitTimeout { .. }
                | StoreError::Backend(_)
        )
    }
}

/// What a service caller gets back.
///
/// The three variants follow the error taxonomy: malformed input (never
/// retried), precondition violations (caller must re-fetch and decide), and
/// storage failures (see [`StoreError::retryable`]).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid move: {0}")]
    InvalidMove(#[from] BoardError),

    #[error("request rejected: {}", format_violations(.0))]
    Rejected(Violations),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Whether re-running the whole read-validate-apply cycle makes sense.
    pub fn retryable(&self) -> bool {
        match self {
            ServiceError::Store(err) => err.retryable(),
            ServiceError::InvalidMove(_) | ServiceError::Rejected(_) => false,
        }
    }
}

fn format_violations(violations: &Violations) -> String {
    violations
        .iter()
        .map(|v| v.reason.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_failures_are_retryable() {
        let id = Uuid::new_v4();
        assert!(StoreError::StaleGame { id }.retryable());
        assert!(StoreError::CommitTimeout {
            id,
            timeout_ms: 5000
        }
        .retryable());
        assert!(!StoreError::GameNotFound { id }.retryable());
        assert!(!StoreError::Unauthenticated.retryable());
    }
}
