//! Pure move application and terminal-result computation.
//!
//! Nothing here performs IO or touches shared state: the engine takes a
//! board snapshot and returns a new one. Serialization of concurrent moves
//! happens at the persistence boundary, not in this module.

use serde::{Deserialize, Serialize};

use crate::board::{Board, Cell, Mark, Tile};
use crate::error::BoardError;

/// The eight winning lines: three rows, three columns, two diagonals,
/// as row-major cell indices.
const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Terminal-or-not tag for a game.
///
/// `Playing` is the only non-terminal value. Every other value is write-once:
/// a concluded game never re-enters play or changes its conclusion. The
/// validator enforces this for moves, and `Forfeit` is only ever set by the
/// external abandonment path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Playing,
    XWon,
    OWon,
    Draw,
    Forfeit,
}

impl Outcome {
    /// Whether the game has concluded.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Outcome::Playing)
    }

    /// The persisted text tag.
    pub fn as_tag(self) -> &'static str {
        match self {
            Outcome::Playing => "playing",
            Outcome::XWon => "x_won",
            Outcome::OWon => "o_won",
            Outcome::Draw => "draw",
            Outcome::Forfeit => "forfeit",
        }
    }

    /// Inverse of [`Outcome::as_tag`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "playing" => Some(Outcome::Playing),
            "x_won" => Some(Outcome::XWon),
            "o_won" => Some(Outcome::OWon),
            "draw" => Some(Outcome::Draw),
            "forfeit" => Some(Outcome::Forfeit),
            _ => None,
        }
    }
}

/// Applies one move and flips the turn.
///
/// The mark is derived from the turn flag, so "mark matches turn" holds by
/// construction. Fails with `InvalidTile` when `tile` is out of range and
/// with `CellOccupied` when the target cell is already marked; the input
/// board is unchanged either way.
pub fn apply_move(board: &Board, x_to_move: bool, tile: Tile) -> Result<(Board, bool), BoardError> {
    if board.cell(tile)? != Cell::Empty {
        return Err(BoardError::CellOccupied {
            row: tile.row,
            col: tile.col,
        });
    }
    let mut next = *board;
    next.set(tile, Cell::from(Mark::for_turn(x_to_move)))?;
    Ok((next, !x_to_move))
}

/// Evaluates the board: a completed line wins, a full board with no line is
/// a draw, anything else is still in play.
///
/// Total over any decodable board, including unreachable ones — it reports
/// purely on cell contents and never panics. A legally reached board has at
/// most one completed line of a single mark (occupied cells cannot be
/// overwritten and turns alternate), so no line priority is needed.
pub fn outcome(board: &Board) -> Outcome {
    let cells = board.cells();
    for [a, b, c] in WIN_LINES {
        if cells[a] == cells[b] && cells[b] == cells[c] {
            match cells[a] {
                Cell::X => return Outcome::XWon,
                Cell::O => return Outcome::OWon,
                Cell::Empty => {}
            }
        }
    }
    if board.is_full() {
        Outcome::Draw
    } else {
        Outcome::Playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(text: &str) -> Board {
        Board::decode(text).unwrap()
    }

    #[test]
    fn apply_move_marks_the_cell_and_flips_the_turn() {
        let (next, turn) = apply_move(&Board::empty(), true, Tile::new(0, 0)).unwrap();
        assert_eq!(next.encode(), "x________");
        assert!(!turn);

        let (next, turn) = apply_move(&next, turn, Tile::new(1, 1)).unwrap();
        assert_eq!(next.encode(), "x___o____");
        assert!(turn);
    }

    #[test]
    fn apply_move_rejects_occupied_cells_and_leaves_the_board_unchanged() {
        let before = board("x________");
        let err = apply_move(&before, false, Tile::new(0, 0)).unwrap_err();
        assert_eq!(err, BoardError::CellOccupied { row: 0, col: 0 });
        assert_eq!(before.encode(), "x________");
    }

    #[test]
    fn apply_move_rejects_out_of_range_tiles() {
        for tile in [Tile::new(3, 0), Tile::new(0, 3), Tile::new(9, 9)] {
            let err = apply_move(&Board::empty(), true, tile).unwrap_err();
            assert_eq!(
                err,
                BoardError::InvalidTile {
                    row: tile.row,
                    col: tile.col
                }
            );
        }
    }

    #[test]
    fn outcome_detects_every_winning_line() {
        let wins = [
            "xxx______",
            "___xxx___",
            "______xxx",
            "x__x__x__",
            "_x__x__x_",
            "__x__x__x",
            "x___x___x",
            "__x_x_x__",
        ];
        for text in wins {
            assert_eq!(outcome(&board(text)), Outcome::XWon, "line {text}");
            let flipped: String = text.replace('x', "o");
            assert_eq!(outcome(&board(&flipped)), Outcome::OWon, "line {flipped}");
        }
    }

    #[test]
    fn outcome_reports_a_full_board_with_no_line_as_a_draw() {
        assert_eq!(outcome(&board("xoxxoooxo")), Outcome::Draw);
    }

    #[test]
    fn outcome_reports_unfinished_boards_as_playing() {
        assert_eq!(outcome(&Board::empty()), Outcome::Playing);
        assert_eq!(outcome(&board("xo_xo____")), Outcome::Playing);
    }

    #[test]
    fn outcome_is_deterministic() {
        let b = board("xx_oo____");
        assert_eq!(outcome(&b), outcome(&b));
    }

    #[test]
    fn top_row_win_scenario() {
        // X (0,0), O (1,1), X (0,1), O (1,0), X (0,2) -> top row for X.
        let moves = [
            Tile::new(0, 0),
            Tile::new(1, 1),
            Tile::new(0, 1),
            Tile::new(1, 0),
            Tile::new(0, 2),
        ];
        let mut b = Board::empty();
        let mut x_to_move = true;
        for tile in moves {
            let (next, turn) = apply_move(&b, x_to_move, tile).unwrap();
            b = next;
            x_to_move = turn;
        }
        assert_eq!(outcome(&b), Outcome::XWon);
    }

    #[test]
    fn outcome_tags_round_trip() {
        for value in [
            Outcome::Playing,
            Outcome::XWon,
            Outcome::OWon,
            Outcome::Draw,
            Outcome::Forfeit,
        ] {
            assert_eq!(Outcome::from_tag(value.as_tag()), Some(value));
        }
        assert_eq!(Outcome::from_tag("won"), None);
    }
}
