//! Effect Deriver: visual consequences of a shot that the Game Service does
//! not report itself.
//!
//! A destroyed ship cannot touch another ship, so every unresolved cell
//! around a `Destroyed` target is marked [`CellState::Surrounding`]. Cells
//! already `Hit`, `Miss` or `Destroyed` are never overwritten, which makes
//! [`derive_effects`] idempotent.

use std::fmt;

use crate::board::{Board, CellState, Coordinate};
use crate::error::Result;

/// Outcome of a single shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShotOutcome {
    Hit,
    Miss,
    Destroyed,
}

impl ShotOutcome {
    /// Classify the Game Service's textual reply to `shot x y`.
    ///
    /// Replies look like `"Ship destroyed! Your turn again."`,
    /// `"Hit! Your turn again."` or `"Miss! Enemy shot at ..."`. Only the
    /// leading sentence is considered, since the rest may describe the
    /// enemy's answering shots. Returns `None` for anything else (e.g.
    /// `"Not your turn!"`).
    pub fn from_response(text: &str) -> Option<Self> {
        let lead = text
            .trim_start()
            .split_inclusive('!')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if lead.contains("destroyed") {
            Some(Self::Destroyed)
        } else if lead.starts_with("hit") {
            Some(Self::Hit)
        } else if lead.starts_with("miss") {
            Some(Self::Miss)
        } else {
            None
        }
    }

    /// The cell state the target takes on.
    pub fn cell_state(self) -> CellState {
        match self {
            Self::Hit => CellState::Hit,
            Self::Miss => CellState::Miss,
            Self::Destroyed => CellState::Destroyed,
        }
    }
}

impl fmt::Display for ShotOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit => f.write_str("hit"),
            Self::Miss => f.write_str("miss"),
            Self::Destroyed => f.write_str("destroyed"),
        }
    }
}

/// A shot outcome at a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShotResult {
    pub coordinate: Coordinate,
    pub outcome: ShotOutcome,
}

impl ShotResult {
    pub fn new(coordinate: impl Into<Coordinate>, outcome: ShotOutcome) -> Self {
        Self {
            coordinate: coordinate.into(),
            outcome,
        }
    }
}

/// Return `board` with `shot` and its derived effects applied.
///
/// # Errors
///
/// Returns [`SalvoError::OutOfBounds`](crate::SalvoError::OutOfBounds) if the
/// shot lies off the board; `board` is left untouched.
pub fn derive_effects(board: &Board, shot: &ShotResult) -> Result<Board> {
    let mut next = board.clone();
    apply_effects(&mut next, shot, true)?;
    Ok(next)
}

/// Apply `shot` to `board` in place.
///
/// With `overwrite_target` unset, the target cell is only filled when it is
/// still `Empty`; neighbor marking is unaffected. The controller uses that
/// mode to re-apply local effects on top of a fresh snapshot without
/// contradicting what the service reported.
pub(crate) fn apply_effects(
    board: &mut Board,
    shot: &ShotResult,
    overwrite_target: bool,
) -> Result<()> {
    let target = shot.coordinate;
    let current = board.get(target)?;
    if overwrite_target || current == CellState::Empty {
        board.set(target, shot.outcome.cell_state())?;
    }
    if shot.outcome == ShotOutcome::Destroyed {
        let neighbors: Vec<Coordinate> = board.neighbors(target).collect();
        for neighbor in neighbors {
            if !board.get(neighbor)?.is_resolved() {
                board.set(neighbor, CellState::Surrounding)?;
            }
        }
    }
    Ok(())
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
    use crate::board::BoardOwner;
    use crate::error::SalvoError;

    fn enemy() -> Board {
        Board::with_default_size(BoardOwner::Enemy)
    }

    #[test]
    fn destroyed_marks_all_eight_neighbors() {
        let board = derive_effects(&enemy(), &ShotResult::new((5, 5), ShotOutcome::Destroyed))
            .unwrap();
        assert_eq!(
            board.get(Coordinate::new(5, 5)).unwrap(),
            CellState::Destroyed
        );
        for n in board.neighbors(Coordinate::new(5, 5)) {
            assert_eq!(board.get(n).unwrap(), CellState::Surrounding, "at {n}");
        }
        assert_eq!(board.count(CellState::Surrounding), 8);
        assert_eq!(board.get(Coordinate::new(7, 5)).unwrap(), CellState::Empty);
    }

    #[test]
    fn destroyed_keeps_resolved_neighbors() {
        let mut board = enemy();
        board.set(Coordinate::new(4, 4), CellState::Hit).unwrap();
        board.set(Coordinate::new(6, 6), CellState::Miss).unwrap();
        board.set(Coordinate::new(5, 4), CellState::Destroyed).unwrap();
        let board = derive_effects(&board, &ShotResult::new((5, 5), ShotOutcome::Destroyed))
            .unwrap();
        assert_eq!(board.get(Coordinate::new(4, 4)).unwrap(), CellState::Hit);
        assert_eq!(board.get(Coordinate::new(6, 6)).unwrap(), CellState::Miss);
        assert_eq!(
            board.get(Coordinate::new(5, 4)).unwrap(),
            CellState::Destroyed
        );
        assert_eq!(board.count(CellState::Surrounding), 5);
    }

    #[test]
    fn corner_destroyed_marks_three_neighbors() {
        let board = derive_effects(&enemy(), &ShotResult::new((0, 0), ShotOutcome::Destroyed))
            .unwrap();
        assert_eq!(board.count(CellState::Surrounding), 3);
        assert_eq!(board.get(Coordinate::new(1, 1)).unwrap(), CellState::Surrounding);
    }

    #[test]
    fn hit_and_miss_touch_only_the_target() {
        let board = derive_effects(&enemy(), &ShotResult::new((2, 3), ShotOutcome::Hit)).unwrap();
        assert_eq!(board.get(Coordinate::new(2, 3)).unwrap(), CellState::Hit);
        assert_eq!(board.count(CellState::Empty), 99);

        let board = derive_effects(&enemy(), &ShotResult::new((9, 0), ShotOutcome::Miss)).unwrap();
        assert_eq!(board.get(Coordinate::new(9, 0)).unwrap(), CellState::Miss);
        assert_eq!(board.count(CellState::Empty), 99);
    }

    #[test]
    fn applying_twice_changes_nothing() {
        let shot = ShotResult::new((3, 3), ShotOutcome::Destroyed);
        let once = derive_effects(&enemy(), &shot).unwrap();
        let twice = derive_effects(&once, &shot).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn out_of_bounds_shot_is_rejected() {
        let board = enemy();
        let err = derive_effects(&board, &ShotResult::new((10, 10), ShotOutcome::Hit)).unwrap_err();
        assert!(matches!(err, SalvoError::OutOfBounds { .. }));
    }

    #[test]
    fn reapply_respects_reported_target() {
        let mut board = enemy();
        board.set(Coordinate::new(1, 1), CellState::Hit).unwrap();
        let shot = ShotResult::new((1, 1), ShotOutcome::Destroyed);
        apply_effects(&mut board, &shot, false).unwrap();
        assert_eq!(board.get(Coordinate::new(1, 1)).unwrap(), CellState::Hit);
        assert_eq!(board.count(CellState::Surrounding), 8);
    }

    #[test]
    fn outcome_from_response_text() {
        assert_eq!(
            ShotOutcome::from_response("Ship destroyed! Your turn again."),
            Some(ShotOutcome::Destroyed)
        );
        assert_eq!(
            ShotOutcome::from_response("Ship destroyed! Game Over - You won!"),
            Some(ShotOutcome::Destroyed)
        );
        assert_eq!(
            ShotOutcome::from_response("Hit! Your turn again."),
            Some(ShotOutcome::Hit)
        );
        assert_eq!(
            ShotOutcome::from_response(
                "Miss! Enemy shot at (1,2): Ship destroyed! Enemy shot at (3,3): Miss! Your turn!"
            ),
            Some(ShotOutcome::Miss)
        );
        assert_eq!(ShotOutcome::from_response("Not your turn!"), None);
        assert_eq!(ShotOutcome::from_response("Invalid coordinates"), None);
        assert_eq!(ShotOutcome::from_response(""), None);
    }
}
