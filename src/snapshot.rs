//! State Projector: turns a raw Game Service snapshot into [`Board`]s.
//!
//! Two encodings feed one canonical [`Snapshot`]:
//!
//! - [`RawSnapshot::Structured`]: the JSON body of `GET /game-state`.
//! - [`RawSnapshot::Text`]: the legacy line-oriented board dump:
//!
//! ```text
//! Your ships:
//! S.........
//! .X........
//! Enemy ships:
//! ..O.......
//! Game over: player
//! ```
//!
//! Projection is pure. Any unrecognized code fails the whole snapshot with
//! [`SalvoError::MalformedSnapshot`], so callers never see a partial board.
//! Ships are hidden on the enemy board whatever the snapshot says.

use crate::board::{Board, BoardOwner, CellState};
use crate::error::{Result, SalvoError};
use crate::protocol::{CellCode, GameStateResponse, Grid, Winner};

const OWN_HEADER: &str = "Your ships:";
const ENEMY_HEADER: &str = "Enemy ships:";
const GAME_OVER_PREFIX: &str = "Game over:";

/// A snapshot as received, tagged by encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSnapshot {
    Structured(GameStateResponse),
    Text(String),
}

impl RawSnapshot {
    /// Parse a `GET /game-state` JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`SalvoError::MalformedSnapshot`] if the body is not a valid
    /// game state object.
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map(Self::Structured)
            .map_err(|e| SalvoError::MalformedSnapshot(format!("invalid game state JSON: {e}")))
    }

    /// Decode into the canonical representation.
    ///
    /// # Errors
    ///
    /// Returns [`SalvoError::MalformedSnapshot`] on any shape or code error.
    pub fn decode(&self) -> Result<Snapshot> {
        match self {
            Self::Structured(state) => Snapshot::from_structured(state),
            Self::Text(text) => parse_text_dump(text),
        }
    }
}

/// Both boards plus the game-over flag, at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub own: Board,
    pub enemy: Board,
    pub game_over: bool,
    pub winner: Option<Winner>,
}

impl Snapshot {
    fn from_structured(state: &GameStateResponse) -> Result<Self> {
        Ok(Self {
            own: project(&state.my_board, BoardOwner::Own)?,
            enemy: project(&state.enemy_board, BoardOwner::Enemy)?,
            game_over: state.game_over,
            winner: state.winner,
        })
    }
}

/// Project a grid of wire codes onto a board for `owner`.
///
/// # Errors
///
/// Returns [`SalvoError::MalformedSnapshot`] for unknown codes or a
/// non-rectangular grid.
pub fn project(grid: &Grid, owner: BoardOwner) -> Result<Board> {
    let rows = grid
        .iter()
        .enumerate()
        .map(|(y, row)| {
            row.iter()
                .enumerate()
                .map(|(x, code)| {
                    decode_code(code)
                        .map(|state| conceal(state, owner))
                        .ok_or_else(|| {
                            SalvoError::MalformedSnapshot(format!(
                                "{owner:?} board cell ({x}, {y}) has unknown code {code:?}"
                            ))
                        })
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Board::from_rows(owner, rows)
}

fn decode_code(code: &CellCode) -> Option<CellState> {
    match code {
        CellCode::Numeric(n) => CellState::from_code(*n),
        CellCode::Symbolic(name) => match name.as_str() {
            "empty" => Some(CellState::Empty),
            "ship" => Some(CellState::Ship),
            "hit" => Some(CellState::Hit),
            "miss" => Some(CellState::Miss),
            "destroyed" | "kill" => Some(CellState::Destroyed),
            "surrounding" => Some(CellState::Surrounding),
            _ => None,
        },
    }
}

/// Fog of war.
fn conceal(state: CellState, owner: BoardOwner) -> CellState {
    match (owner, state) {
        (BoardOwner::Enemy, CellState::Ship) => CellState::Empty,
        _ => state,
    }
}

/// Parse the legacy text dump.
///
/// Lines before the first section header are ignored, as are blank lines.
/// Whitespace inside a row is ignored, so `"S . X"` and `"S.X"` are the same
/// row. An optional `Game over: player|enemy` line marks the game finished.
///
/// # Errors
///
/// Returns [`SalvoError::MalformedSnapshot`] if a section is missing or
/// ragged, a symbol is unknown, or the game-over line names no winner.
pub fn parse_text_dump(text: &str) -> Result<Snapshot> {
    let mut own: Option<Vec<Vec<CellState>>> = None;
    let mut enemy: Option<Vec<Vec<CellState>>> = None;
    let mut current: Option<BoardOwner> = None;
    let mut winner = None;

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with(OWN_HEADER) {
            current = Some(BoardOwner::Own);
            own = Some(Vec::new());
            continue;
        }
        if line.starts_with(ENEMY_HEADER) {
            current = Some(BoardOwner::Enemy);
            enemy = Some(Vec::new());
            continue;
        }
        if let Some(rest) = line.strip_prefix(GAME_OVER_PREFIX) {
            winner = Some(parse_winner(rest.trim(), lineno)?);
            current = None;
            continue;
        }
        let Some(owner) = current else {
            continue;
        };
        let row = line
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| {
                CellState::from_symbol(c)
                    .map(|state| conceal(state, owner))
                    .ok_or_else(|| {
                        SalvoError::MalformedSnapshot(format!(
                            "unknown symbol {c:?} on line {}",
                            lineno + 1
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let section = match owner {
            BoardOwner::Own => own.as_mut(),
            BoardOwner::Enemy => enemy.as_mut(),
        };
        if let Some(rows) = section {
            rows.push(row);
        }
    }

    let own = own.ok_or_else(|| missing_section(OWN_HEADER))?;
    let enemy = enemy.ok_or_else(|| missing_section(ENEMY_HEADER))?;
    Ok(Snapshot {
        own: Board::from_rows(BoardOwner::Own, own)?,
        enemy: Board::from_rows(BoardOwner::Enemy, enemy)?,
        game_over: winner.is_some(),
        winner,
    })
}

fn parse_winner(word: &str, lineno: usize) -> Result<Winner> {
    match word {
        "player" => Ok(Winner::Player),
        "enemy" => Ok(Winner::Enemy),
        other => Err(SalvoError::MalformedSnapshot(format!(
            "unknown winner {other:?} on line {}",
            lineno + 1
        ))),
    }
}

fn missing_section(header: &str) -> SalvoError {
    SalvoError::MalformedSnapshot(format!("text snapshot has no `{header}` section"))
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
    use crate::board::Coordinate;

    fn grid(rows: &[&[u8]]) -> Grid {
        rows.iter()
            .map(|row| row.iter().map(|&c| CellCode::from(c)).collect())
            .collect()
    }

    #[test]
    fn own_board_shows_ships() {
        let board = project(&grid(&[&[0, 1], &[2, 3]]), BoardOwner::Own).unwrap();
        assert_eq!(board.get(Coordinate::new(1, 0)).unwrap(), CellState::Ship);
        assert_eq!(board.get(Coordinate::new(0, 1)).unwrap(), CellState::Hit);
        assert_eq!(board.get(Coordinate::new(1, 1)).unwrap(), CellState::Miss);
    }

    #[test]
    fn enemy_board_never_shows_ships() {
        let board = project(&grid(&[&[1, 1], &[4, 5]]), BoardOwner::Enemy).unwrap();
        assert_eq!(board.count(CellState::Ship), 0);
        assert_eq!(board.count(CellState::Empty), 2);
        assert_eq!(
            board.get(Coordinate::new(0, 1)).unwrap(),
            CellState::Destroyed
        );
        assert_eq!(
            board.get(Coordinate::new(1, 1)).unwrap(),
            CellState::Surrounding
        );
    }

    #[test]
    fn symbolic_codes_are_accepted() {
        let g = vec![vec![CellCode::from("kill"), CellCode::from("ship")]];
        let board = project(&g, BoardOwner::Enemy).unwrap();
        assert_eq!(
            board.get(Coordinate::new(0, 0)).unwrap(),
            CellState::Destroyed
        );
        assert_eq!(board.get(Coordinate::new(1, 0)).unwrap(), CellState::Empty);
    }

    #[test]
    fn unknown_code_fails_the_projection() {
        let err = project(&grid(&[&[0, 9]]), BoardOwner::Own).unwrap_err();
        assert!(matches!(err, SalvoError::MalformedSnapshot(_)));
        let g = vec![vec![CellCode::from("sunk")]];
        assert!(project(&g, BoardOwner::Own).is_err());
    }

    #[test]
    fn from_json_reports_malformed_bodies() {
        assert!(matches!(
            RawSnapshot::from_json("not json"),
            Err(SalvoError::MalformedSnapshot(_))
        ));
        assert!(matches!(
            RawSnapshot::from_json(r#"{"myBoard": [[0]]}"#),
            Err(SalvoError::MalformedSnapshot(_))
        ));
        assert!(matches!(
            RawSnapshot::from_json(r#"{"myBoard": [[-1]], "enemyBoard": [[0]]}"#),
            Err(SalvoError::MalformedSnapshot(_))
        ));
    }

    #[test]
    fn text_dump_parses_both_sections() {
        let dump = "\
Current Turn: Your Turn
Your ships:
S . X
. O .
Enemy ships:
S X O
# * ~
";
        let snap = parse_text_dump(dump).unwrap();
        assert_eq!((snap.own.width(), snap.own.height()), (3, 2));
        assert_eq!(snap.own.get(Coordinate::new(0, 0)).unwrap(), CellState::Ship);
        assert_eq!(snap.own.get(Coordinate::new(2, 0)).unwrap(), CellState::Hit);
        assert_eq!(snap.own.get(Coordinate::new(1, 1)).unwrap(), CellState::Miss);
        assert_eq!(snap.enemy.count(CellState::Ship), 0);
        assert_eq!(
            snap.enemy.get(Coordinate::new(0, 1)).unwrap(),
            CellState::Destroyed
        );
        assert!(!snap.game_over);
        assert_eq!(snap.winner, None);
    }

    #[test]
    fn text_dump_game_over_line() {
        let dump = "Your ships:\nS\nEnemy ships:\nX\nGame over: enemy\n";
        let snap = parse_text_dump(dump).unwrap();
        assert!(snap.game_over);
        assert_eq!(snap.winner, Some(Winner::Enemy));

        let bad = "Your ships:\nS\nEnemy ships:\nX\nGame over: nobody\n";
        assert!(parse_text_dump(bad).is_err());
    }

    #[test]
    fn text_dump_errors() {
        assert!(matches!(
            parse_text_dump("Your ships:\nS.\n"),
            Err(SalvoError::MalformedSnapshot(_))
        ));
        assert!(parse_text_dump("Your ships:\nS?\nEnemy ships:\n..\n").is_err());
        assert!(parse_text_dump("Your ships:\nS..\n.\nEnemy ships:\n..\n").is_err());
        assert!(parse_text_dump("Your ships:\nEnemy ships:\n..\n").is_err());
    }

    #[test]
    fn both_encodings_decode_to_the_same_snapshot() {
        let structured = RawSnapshot::Structured(GameStateResponse {
            my_board: grid(&[&[1, 0], &[2, 3]]),
            enemy_board: grid(&[&[0, 4], &[5, 3]]),
            game_over: false,
            winner: None,
        });
        let text = RawSnapshot::Text("Your ships:\nS.\nXO\nEnemy ships:\n.#\n*O\n".into());
        assert_eq!(structured.decode().unwrap(), text.decode().unwrap());
    }
}
