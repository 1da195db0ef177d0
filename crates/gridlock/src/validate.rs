//! Precondition checks that run before the rule engine.
//!
//! A validator collects *every* applicable violation rather than failing on
//! the first, so a client can render the complete explanation in one round
//! trip. Validation is pure: it reads a snapshot and decides, with no side
//! effects; any violation blocks the move before the rule engine runs.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::game::GameRecord;

pub const MIN_USERNAME_LEN: usize = 5;
pub const MAX_USERNAME_LEN: usize = 20;
pub const MIN_PASSWORD_LEN: usize = 5;
pub const MAX_PASSWORD_LEN: usize = 100;

/// What a violation is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// The second player slot is empty — the game has not started.
    Opponent,
    /// The game has already concluded.
    State,
    /// The requester does not own the current turn.
    Turn,
    Username,
    Password,
}

/// One machine-readable precondition violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub subject: Subject,
    pub reason: String,
}

impl Violation {
    fn new(subject: Subject, reason: impl Into<String>) -> Self {
        Self {
            subject,
            reason: reason.into(),
        }
    }
}

/// An ordered, non-empty set of violations. Three is the most a single move
/// request can accumulate.
pub type Violations = SmallVec<[Violation; 3]>;

/// Checks a requested move against the persisted game snapshot.
///
/// Returns all applicable violations: opponent not yet joined, game already
/// concluded, and requester not owning the current turn (X to move requires
/// the first player; O to move requires a present second player).
pub fn validate_move(game: &GameRecord, mover: Uuid) -> Result<(), Violations> {
    let mut violations = Violations::new();

    if game.o_player.is_none() {
        violations.push(Violation::new(
            Subject::Opponent,
            format!(
                "cannot move on game {}: wait for an opponent to join as 'O'",
                game.id
            ),
        ));
    }
    if game.outcome.is_terminal() {
        violations.push(Violation::new(
            Subject::State,
            format!("cannot move on game {}: game is not in play", game.id),
        ));
    }
    if game.turn_player() != Some(mover) {
        violations.push(Violation::new(
            Subject::Turn,
            format!(
                "cannot move on game {}: it is not player {}'s turn",
                game.id, mover
            ),
        ));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Checks registration credentials against the length bounds.
pub fn validate_registration(username: &str, password: &str) -> Result<(), Violations> {
    let mut violations = Violations::new();

    if username.len() < MIN_USERNAME_LEN || username.len() > MAX_USERNAME_LEN {
        violations.push(Violation::new(
            Subject::Username,
            format!("username must be between {MIN_USERNAME_LEN} and {MAX_USERNAME_LEN} chars"),
        ));
    }
    if password.len() < MIN_PASSWORD_LEN || password.len() > MAX_PASSWORD_LEN {
        violations.push(Violation::new(
            Subject::Password,
            format!("password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} chars"),
        ));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Outcome;

    fn game_with_opponent() -> (GameRecord, Uuid, Uuid) {
        let x_player = Uuid::new_v4();
        let o_player = Uuid::new_v4();
        let mut game = GameRecord::new(x_player);
        game.o_player = Some(o_player);
        (game, x_player, o_player)
    }

    fn subjects(violations: &Violations) -> Vec<Subject> {
        violations.iter().map(|v| v.subject).collect()
    }

    #[test]
    fn a_legal_move_has_no_violations() {
        let (game, x_player, _) = game_with_opponent();
        assert!(validate_move(&game, x_player).is_ok());
    }

    #[test]
    fn missing_opponent_is_reported() {
        let x_player = Uuid::new_v4();
        let game = GameRecord::new(x_player);
        let violations = validate_move(&game, x_player).unwrap_err();
        assert_eq!(subjects(&violations), vec![Subject::Opponent]);
    }

    #[test]
    fn concluded_game_is_reported() {
        let (mut game, x_player, _) = game_with_opponent();
        game.outcome = Outcome::OWon;
        let violations = validate_move(&game, x_player).unwrap_err();
        assert_eq!(subjects(&violations), vec![Subject::State]);
    }

    #[test]
    fn wrong_turn_is_reported_for_both_seats() {
        let (game, _, o_player) = game_with_opponent();
        // X to move, O requesting.
        let violations = validate_move(&game, o_player).unwrap_err();
        assert_eq!(subjects(&violations), vec![Subject::Turn]);

        let (mut game, x_player, _) = game_with_opponent();
        game.x_turn = false;
        let violations = validate_move(&game, x_player).unwrap_err();
        assert_eq!(subjects(&violations), vec![Subject::Turn]);
    }

    #[test]
    fn all_applicable_violations_are_collected() {
        // No opponent, concluded, and a stranger requesting: all three at once.
        let mut game = GameRecord::new(Uuid::new_v4());
        game.outcome = Outcome::Forfeit;
        let violations = validate_move(&game, Uuid::new_v4()).unwrap_err();
        assert_eq!(
            subjects(&violations),
            vec![Subject::Opponent, Subject::State, Subject::Turn]
        );
    }

    #[test]
    fn opponent_and_state_violations_arrive_together() {
        let x_player = Uuid::new_v4();
        let mut game = GameRecord::new(x_player);
        game.outcome = Outcome::Forfeit;
        let violations = validate_move(&game, x_player).unwrap_err();
        assert_eq!(subjects(&violations), vec![Subject::Opponent, Subject::State]);
    }

    #[test]
    fn registration_bounds_are_enforced() {
        assert!(validate_registration("valid_user", "secret123").is_ok());

        let violations = validate_registration("abc", "ok").unwrap_err();
        assert_eq!(subjects(&violations), vec![Subject::Username, Subject::Password]);

        let violations = validate_registration(&"u".repeat(21), "secret123").unwrap_err();
        assert_eq!(subjects(&violations), vec![Subject::Username]);

        let violations = validate_registration("valid_user", &"p".repeat(101)).unwrap_err();
        assert_eq!(subjects(&violations), vec![Subject::Password]);
    }
}
