//! Board Model: two fixed-size grids of per-cell state codes.
//!
//! A [`Board`] is plain data. It is only ever mutated by the session
//! controller through projection and effect derivation; renderers get clones.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SalvoError};

/// Default board width used by the Game Service.
pub const DEFAULT_WIDTH: usize = 10;

/// Default board height used by the Game Service.
pub const DEFAULT_HEIGHT: usize = 10;

/// Largest accepted width or height.
pub const MAX_SIDE: usize = 256;

// ── CellState ───────────────────────────────────────────────────────

/// Visual state of a single grid cell.
///
/// The numeric codes match the Game Service contract
/// (`0=Empty, 1=Ship, 2=Hit, 3=Miss, 4=Destroyed, 5=Surrounding`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    #[default]
    Empty,
    /// Only meaningful on the owner's own board.
    Ship,
    Hit,
    Miss,
    Destroyed,
    /// Derived: adjacent to a destroyed target, conclusively empty.
    Surrounding,
}

impl CellState {
    /// Decode a wire cell code. Returns `None` for unknown codes.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Empty),
            1 => Some(Self::Ship),
            2 => Some(Self::Hit),
            3 => Some(Self::Miss),
            4 => Some(Self::Destroyed),
            5 => Some(Self::Surrounding),
            _ => None,
        }
    }

    /// The wire cell code for this state.
    pub fn code(self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Ship => 1,
            Self::Hit => 2,
            Self::Miss => 3,
            Self::Destroyed => 4,
            Self::Surrounding => 5,
        }
    }

    /// Decode a text-dump symbol. Returns `None` for unknown symbols.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '.' | '~' => Some(Self::Empty),
            'S' => Some(Self::Ship),
            'X' => Some(Self::Hit),
            'O' => Some(Self::Miss),
            '#' => Some(Self::Destroyed),
            '*' => Some(Self::Surrounding),
            _ => None,
        }
    }

    /// The text-dump symbol for this state.
    pub fn symbol(self) -> char {
        match self {
            Self::Empty => '.',
            Self::Ship => 'S',
            Self::Hit => 'X',
            Self::Miss => 'O',
            Self::Destroyed => '#',
            Self::Surrounding => '*',
        }
    }

    /// `true` once a shot has settled this cell (`Hit`, `Miss` or `Destroyed`).
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Hit | Self::Miss | Self::Destroyed)
    }
}

// ── Coordinate ──────────────────────────────────────────────────────

/// Position of a cell: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: usize,
    pub y: usize,
}

impl Coordinate {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl From<(usize, usize)> for Coordinate {
    fn from((x, y): (usize, usize)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ── BoardOwner ──────────────────────────────────────────────────────

/// Which side of the table a board represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardOwner {
    /// The local player's fleet. Ships are visible.
    Own,
    /// The opponent's waters. Ships are never visible.
    Enemy,
}

// ── Board ───────────────────────────────────────────────────────────

/// A fixed-size rectangular grid of [`CellState`], stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    owner: BoardOwner,
    width: usize,
    height: usize,
    cells: Vec<CellState>,
}

impl Board {
    /// Create an all-`Empty` board. Dimensions are clamped to
    /// `1..=`[`MAX_SIDE`].
    pub fn new(owner: BoardOwner, width: usize, height: usize) -> Self {
        let width = width.clamp(1, MAX_SIDE);
        let height = height.clamp(1, MAX_SIDE);
        Self {
            owner,
            width,
            height,
            cells: vec![CellState::Empty; width * height],
        }
    }

    /// Create an empty board with the default 10x10 dimensions.
    pub fn with_default_size(owner: BoardOwner) -> Self {
        Self::new(owner, DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    /// Build a board from rows of cells.
    ///
    /// # Errors
    ///
    /// Returns [`SalvoError::MalformedSnapshot`] if there are no rows, a row is
    /// empty, or the rows differ in length.
    pub fn from_rows(owner: BoardOwner, rows: Vec<Vec<CellState>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if height == 0 || width == 0 {
            return Err(SalvoError::MalformedSnapshot(format!(
                "{owner:?} board has no cells"
            )));
        }
        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(SalvoError::MalformedSnapshot(format!(
                    "{owner:?} board row {y} has {} cells, expected {width}",
                    row.len()
                )));
            }
            cells.extend(row);
        }
        Ok(Self {
            owner,
            width,
            height,
            cells,
        })
    }

    pub fn owner(&self) -> BoardOwner {
        self.owner
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `true` if both boards have the same dimensions.
    pub fn same_shape(&self, other: &Board) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// `true` if `coord` lies on the board.
    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    /// Check that `coord` lies on the board.
    ///
    /// # Errors
    ///
    /// Returns [`SalvoError::OutOfBounds`]; coordinates are never clamped.
    pub fn check(&self, coord: Coordinate) -> Result<()> {
        if self.contains(coord) {
            Ok(())
        } else {
            Err(SalvoError::OutOfBounds {
                x: coord.x,
                y: coord.y,
                width: self.width,
                height: self.height,
            })
        }
    }

    fn index(&self, coord: Coordinate) -> Result<usize> {
        self.check(coord)?;
        Ok(coord.y * self.width + coord.x)
    }

    /// Read the state of a cell.
    ///
    /// # Errors
    ///
    /// Returns [`SalvoError::OutOfBounds`] if `coord` is off the board.
    pub fn get(&self, coord: Coordinate) -> Result<CellState> {
        let idx = self.index(coord)?;
        self.cells
            .get(idx)
            .copied()
            .ok_or(SalvoError::OutOfBounds {
                x: coord.x,
                y: coord.y,
                width: self.width,
                height: self.height,
            })
    }

    /// Overwrite the state of a cell.
    ///
    /// # Errors
    ///
    /// Returns [`SalvoError::OutOfBounds`] if `coord` is off the board.
    pub fn set(&mut self, coord: Coordinate, state: CellState) -> Result<()> {
        let idx = self.index(coord)?;
        if let Some(cell) = self.cells.get_mut(idx) {
            *cell = state;
        }
        Ok(())
    }

    /// The up to eight cells adjacent to `coord`, clipped to the board.
    pub fn neighbors(&self, coord: Coordinate) -> impl Iterator<Item = Coordinate> + '_ {
        (-1isize..=1)
            .flat_map(|dy| (-1isize..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .filter_map(move |(dx, dy)| {
                let x = coord.x.checked_add_signed(dx)?;
                let y = coord.y.checked_add_signed(dy)?;
                let neighbor = Coordinate::new(x, y);
                self.contains(neighbor).then_some(neighbor)
            })
    }

    /// Iterate rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[CellState]> {
        self.cells.chunks(self.width)
    }

    /// Iterate every cell with its coordinate, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (Coordinate, CellState)> + '_ {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &state)| (Coordinate::new(i % width, i / width), state))
    }

    /// Number of cells currently in `state`.
    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|&&c| c == state).count()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            for cell in row {
                write!(f, "{}", cell.symbol())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn codes_cover_the_wire_contract() {
        for code in 0..=5u64 {
            let state = CellState::from_code(code).unwrap();
            assert_eq!(u64::from(state.code()), code);
        }
        assert_eq!(CellState::from_code(6), None);
        assert_eq!(CellState::from_code(255), None);
    }

    #[test]
    fn resolved_states() {
        assert!(CellState::Hit.is_resolved());
        assert!(CellState::Miss.is_resolved());
        assert!(CellState::Destroyed.is_resolved());
        assert!(!CellState::Empty.is_resolved());
        assert!(!CellState::Ship.is_resolved());
        assert!(!CellState::Surrounding.is_resolved());
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let mut board = Board::with_default_size(BoardOwner::Own);
        assert!(board.get(Coordinate::new(9, 9)).is_ok());
        assert!(matches!(
            board.get(Coordinate::new(10, 0)),
            Err(SalvoError::OutOfBounds { x: 10, y: 0, .. })
        ));
        assert!(board.set(Coordinate::new(0, 10), CellState::Hit).is_err());
        assert_eq!(board.count(CellState::Hit), 0);
    }

    #[test]
    fn set_then_get() {
        let mut board = Board::new(BoardOwner::Enemy, 4, 3);
        board.set(Coordinate::new(3, 2), CellState::Miss).unwrap();
        assert_eq!(board.get(Coordinate::new(3, 2)).unwrap(), CellState::Miss);
        assert_eq!(board.get(Coordinate::new(2, 1)).unwrap(), CellState::Empty);
    }

    #[test]
    fn zero_dimensions_are_clamped() {
        let board = Board::new(BoardOwner::Own, 0, 0);
        assert_eq!((board.width(), board.height()), (1, 1));
    }

    #[test]
    fn interior_cell_has_eight_neighbors() {
        let board = Board::with_default_size(BoardOwner::Enemy);
        let n: Vec<_> = board.neighbors(Coordinate::new(5, 5)).collect();
        assert_eq!(n.len(), 8);
        assert!(!n.contains(&Coordinate::new(5, 5)));
        assert!(n.contains(&Coordinate::new(4, 4)));
        assert!(n.contains(&Coordinate::new(6, 6)));
    }

    #[test]
    fn corner_and_edge_neighbors_are_clipped() {
        let board = Board::with_default_size(BoardOwner::Enemy);
        assert_eq!(board.neighbors(Coordinate::new(0, 0)).count(), 3);
        assert_eq!(board.neighbors(Coordinate::new(9, 9)).count(), 3);
        assert_eq!(board.neighbors(Coordinate::new(0, 5)).count(), 5);
        assert_eq!(board.neighbors(Coordinate::new(9, 0)).count(), 3);
    }

    #[test]
    fn new_clamps_dimensions() {
        let board = Board::new(BoardOwner::Enemy, usize::MAX, 0);
        assert_eq!((board.width(), board.height()), (MAX_SIDE, 1));
        assert_eq!(board.cells().count(), MAX_SIDE);
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let rows = vec![vec![CellState::Empty; 3], vec![CellState::Empty; 2]];
        assert!(matches!(
            Board::from_rows(BoardOwner::Own, rows),
            Err(SalvoError::MalformedSnapshot(_))
        ));
        assert!(Board::from_rows(BoardOwner::Own, vec![]).is_err());
        assert!(Board::from_rows(BoardOwner::Own, vec![vec![]]).is_err());
    }

    #[test]
    fn display_uses_the_text_dump_alphabet() {
        let mut board = Board::new(BoardOwner::Own, 3, 2);
        board.set(Coordinate::new(0, 0), CellState::Ship).unwrap();
        board.set(Coordinate::new(1, 0), CellState::Hit).unwrap();
        board.set(Coordinate::new(2, 1), CellState::Surrounding).unwrap();
        assert_eq!(board.to_string(), "SX.\n..*\n");
    }
}
