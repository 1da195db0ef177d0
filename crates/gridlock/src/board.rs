//! The 3x3 board value type and its canonical text encoding.
//!
//! A board is nine cells in row-major order (index = row * 3 + col). The
//! canonical encoding is exactly nine characters, one per cell: `_` for an
//! empty cell, `x` and `o` for marked ones. This string is both the persisted
//! and the wire representation; [`Board::decode`] is the strict inverse of
//! [`Board::encode`] and rejects anything else.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BoardError;

/// Number of cells on the board.
pub const BOARD_CELLS: usize = 9;

/// Board side length. Only 3x3 boards exist.
pub const BOARD_SIDE: u8 = 3;

/// A player's mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    X,
    O,
}

impl Mark {
    /// The other player's mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    /// The mark that moves for the given turn flag.
    pub fn for_turn(x_to_move: bool) -> Self {
        if x_to_move {
            Mark::X
        } else {
            Mark::O
        }
    }
}

/// Contents of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    #[default]
    Empty,
    X,
    O,
}

impl Cell {
    fn symbol(self) -> char {
        match self {
            Cell::Empty => '_',
            Cell::X => 'x',
            Cell::O => 'o',
        }
    }

    fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '_' => Some(Cell::Empty),
            'x' => Some(Cell::X),
            'o' => Some(Cell::O),
            _ => None,
        }
    }
}

impl From<Mark> for Cell {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Cell::X,
            Mark::O => Cell::O,
        }
    }
}

/// One cell's coordinates: row and column, each valid in `[0, 2]`.
///
/// Out-of-range pairs are representable so that untrusted input can be
/// carried to a use site; every accessor that takes a `Tile` rejects them
/// with [`BoardError::InvalidTile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub row: u8,
    pub col: u8,
}

impl Tile {
    pub fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Whether both coordinates fall inside the grid.
    pub fn in_bounds(self) -> bool {
        self.row < BOARD_SIDE && self.col < BOARD_SIDE
    }

    pub(crate) fn index(self) -> Result<usize, BoardError> {
        if !self.in_bounds() {
            return Err(BoardError::InvalidTile {
                row: self.row,
                col: self.col,
            });
        }
        Ok(self.row as usize * BOARD_SIDE as usize + self.col as usize)
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Immutable snapshot of one game's grid.
///
/// `Board` is a plain value: the rule engine takes a board and returns a new
/// one, never mutating shared state in place.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Board {
    cells: [Cell; BOARD_CELLS],
}

impl Board {
    /// A board with all nine cells empty. X moves first.
    pub fn empty() -> Self {
        Self {
            cells: [Cell::Empty; BOARD_CELLS],
        }
    }

    /// The cell at `tile`, or `InvalidTile` when the coordinates fall
    /// outside the grid.
    pub fn cell(&self, tile: Tile) -> Result<Cell, BoardError> {
        Ok(self.cells[tile.index()?])
    }

    pub(crate) fn set(&mut self, tile: Tile, cell: Cell) -> Result<(), BoardError> {
        self.cells[tile.index()?] = cell;
        Ok(())
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[Cell; BOARD_CELLS] {
        &self.cells
    }

    /// Whether every cell is marked.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|cell| *cell != Cell::Empty)
    }

    /// The canonical nine-character encoding.
    pub fn encode(&self) -> String {
        self.cells.iter().map(|cell| cell.symbol()).collect()
    }

    /// Strict inverse of [`Board::encode`].
    ///
    /// Fails with `MalformedBoard` when the input is not exactly nine of
    /// the three legal symbols. The failure is surfaced to the caller; a
    /// corrupt persisted board must never be silently replaced by an empty
    /// one.
    pub fn decode(text: &str) -> Result<Self, BoardError> {
        let malformed = || BoardError::MalformedBoard {
            text: text.to_owned(),
        };

        if text.chars().count() != BOARD_CELLS {
            return Err(malformed());
        }
        let mut cells = [Cell::Empty; BOARD_CELLS];
        for (slot, symbol) in cells.iter_mut().zip(text.chars()) {
            *slot = Cell::from_symbol(symbol).ok_or_else(&malformed)?;
        }
        Ok(Self { cells })
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Board").field(&self.encode()).finish()
    }
}

/// Human-readable grid, one row per line with `|` and `-+-` separators.
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..BOARD_SIDE as usize {
            if row > 0 {
                writeln!(f, "-+-+-")?;
            }
            let offset = row * BOARD_SIDE as usize;
            writeln!(
                f,
                "{}|{}|{}",
                self.cells[offset].symbol(),
                self.cells[offset + 1].symbol(),
                self.cells[offset + 2].symbol()
            )?;
        }
        Ok(())
    }
}

// The wire and persisted form of a board is its canonical string.
impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Board::decode(&text).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_board_encodes_to_nine_underscores() {
        assert_eq!(Board::empty().encode(), "_________");
    }

    #[test]
    fn decode_is_the_inverse_of_encode() {
        for text in ["_________", "x________", "xoxxoooxo", "____x____"] {
            let board = Board::decode(text).unwrap();
            assert_eq!(board.encode(), text);
        }
    }

    #[test]
    fn decode_rejects_wrong_length() {
        for text in ["", "x", "xoxxooox", "xoxxoooxo_"] {
            assert!(matches!(
                Board::decode(text),
                Err(BoardError::MalformedBoard { .. })
            ));
        }
    }

    #[test]
    fn decode_rejects_illegal_symbols() {
        for text in ["XOXXOOOXO", "xox xooxo", "........."] {
            assert!(matches!(
                Board::decode(text),
                Err(BoardError::MalformedBoard { .. })
            ));
        }
    }

    #[test]
    fn cell_reads_row_major() {
        let board = Board::decode("x___o___x").unwrap();
        assert_eq!(board.cell(Tile::new(0, 0)).unwrap(), Cell::X);
        assert_eq!(board.cell(Tile::new(1, 1)).unwrap(), Cell::O);
        assert_eq!(board.cell(Tile::new(2, 2)).unwrap(), Cell::X);
        assert_eq!(board.cell(Tile::new(0, 1)).unwrap(), Cell::Empty);
    }

    #[test]
    fn cell_rejects_out_of_range_tiles() {
        let board = Board::empty();
        for tile in [Tile::new(3, 0), Tile::new(0, 3), Tile::new(200, 200)] {
            assert_eq!(
                board.cell(tile),
                Err(BoardError::InvalidTile {
                    row: tile.row,
                    col: tile.col
                })
            );
        }
    }

    #[test]
    fn display_renders_the_grid() {
        let board = Board::decode("x_o_x___o").unwrap();
        assert_eq!(board.to_string(), "x|_|o\n-+-+-\n_|x|_\n-+-+-\n_|_|o\n");
    }

    #[test]
    fn mark_for_turn_matches_the_flag() {
        assert_eq!(Mark::for_turn(true), Mark::X);
        assert_eq!(Mark::for_turn(false), Mark::O);
        assert_eq!(Mark::X.opponent(), Mark::O);
    }
}
