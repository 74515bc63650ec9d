//! Wire-compatible types for the Game Service HTTP contract.
//!
//! - `GET /game-state` → [`GameStateResponse`]
//! - `POST /command` with [`CommandRequest`] → [`CommandResponse`]
//!
//! Field names are camelCase on the wire. `gameOver` and `winner` are
//! optional: older services omit them and they default to "still playing".

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::board::Coordinate;

// ── Enums ───────────────────────────────────────────────────────────

/// Which side won a finished game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    /// The local player.
    Player,
    /// The opponent.
    Enemy,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => f.write_str("player"),
            Self::Enemy => f.write_str("enemy"),
        }
    }
}

/// A single grid cell code as sent by the Game Service.
///
/// The agreed contract is numeric (`0..=5`), but symbolic names such as
/// `"hit"` are accepted too. Validation happens in the projector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellCode {
    Numeric(u64),
    Symbolic(String),
}

impl From<u8> for CellCode {
    fn from(code: u8) -> Self {
        Self::Numeric(u64::from(code))
    }
}

impl From<&str> for CellCode {
    fn from(name: &str) -> Self {
        Self::Symbolic(name.to_string())
    }
}

/// Rows of cell codes, `grid[y][x]`.
pub type Grid = Vec<Vec<CellCode>>;

// ── Messages ────────────────────────────────────────────────────────

/// Body of `GET /game-state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateResponse {
    pub my_board: Grid,
    pub enemy_board: Grid,
    #[serde(default)]
    pub game_over: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
}

/// Body of `POST /command`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

/// Response to `POST /command`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Free-form text from the service, e.g. `"Hit! Your turn again."`.
    pub response: String,
}

// ── Command ─────────────────────────────────────────────────────────

/// A console command, classified by the keywords the client reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `shot <x> <y>`
    Shot(Coordinate),
    /// `start`
    Start,
    /// `stop`
    Stop,
    /// Anything else, passed through unchanged (trimmed).
    Other(String),
}

impl Command {
    /// Classify a line of command text. Never fails: unrecognized or
    /// malformed input becomes [`Command::Other`] and is left for the
    /// service to reject.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text {
            "start" => return Self::Start,
            "stop" => return Self::Stop,
            _ => {}
        }
        let mut words = text.split_whitespace();
        if words.next() == Some("shot") {
            let x = words.next().and_then(parse_index);
            let y = words.next().and_then(parse_index);
            if let (Some(x), Some(y), None) = (x, y, words.next()) {
                return Self::Shot(Coordinate::new(x, y));
            }
        }
        Self::Other(text.to_string())
    }

    /// Build the request body for this command.
    pub fn to_request(&self) -> CommandRequest {
        CommandRequest {
            command: self.to_string(),
        }
    }
}

/// A coordinate in canonical form: ASCII digits, no sign, no leading zero.
/// Anything else stays [`Command::Other`] so it is sent exactly as typed.
fn parse_index(word: &str) -> Option<usize> {
    let canonical = word.bytes().all(|b| b.is_ascii_digit())
        && (word == "0" || !word.starts_with('0'));
    if canonical {
        word.parse().ok()
    } else {
        None
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shot(c) => write!(f, "shot {} {}", c.x, c.y),
            Self::Start => f.write_str("start"),
            Self::Stop => f.write_str("stop"),
            Self::Other(text) => f.write_str(text),
        }
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
    use serde_json::json;

    #[test]
    fn game_state_parses_server_json() {
        let body = json!({
            "myBoard": [[0, 1], [2, 3]],
            "enemyBoard": [[4, 5], ["hit", 0]],
            "gameOver": true,
            "winner": "enemy"
        });
        let state: GameStateResponse = serde_json::from_value(body).unwrap();
        assert_eq!(state.my_board[0][1], CellCode::Numeric(1));
        assert_eq!(state.enemy_board[1][0], CellCode::Symbolic("hit".into()));
        assert!(state.game_over);
        assert_eq!(state.winner, Some(Winner::Enemy));
    }

    #[test]
    fn game_over_and_winner_default_when_absent() {
        let body = json!({ "myBoard": [[0]], "enemyBoard": [[0]] });
        let state: GameStateResponse = serde_json::from_value(body).unwrap();
        assert!(!state.game_over);
        assert_eq!(state.winner, None);
    }

    #[test]
    fn command_request_wire_shape() {
        let req = Command::parse("shot 3 4").to_request();
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "command": "shot 3 4" })
        );
    }

    #[test]
    fn command_response_requires_text() {
        let resp: CommandResponse = serde_json::from_str(r#"{"response":""}"#).unwrap();
        assert_eq!(resp.response, "");
        assert!(serde_json::from_str::<CommandResponse>(r#"{"error":"no"}"#).is_err());
    }

    #[test]
    fn parse_recognizes_keywords() {
        assert_eq!(Command::parse("start"), Command::Start);
        assert_eq!(Command::parse("  stop \n"), Command::Stop);
        assert_eq!(
            Command::parse("shot 0 9"),
            Command::Shot(Coordinate::new(0, 9))
        );
        assert_eq!(
            Command::parse("shot   7\t2"),
            Command::Shot(Coordinate::new(7, 2))
        );
    }

    #[test]
    fn malformed_shots_pass_through() {
        assert_eq!(Command::parse("shot 1"), Command::Other("shot 1".into()));
        assert_eq!(
            Command::parse("shot a b"),
            Command::Other("shot a b".into())
        );
        assert_eq!(
            Command::parse("shot 1 2 3"),
            Command::Other("shot 1 2 3".into())
        );
        assert_eq!(
            Command::parse("shot -1 2"),
            Command::Other("shot -1 2".into())
        );
    }

    #[test]
    fn non_canonical_numbers_are_sent_as_typed() {
        for text in ["shot +3 4", "shot 03 4", "shot 3 04", "shot +3 04", "shot ３ 4"] {
            let cmd = Command::parse(text);
            assert_eq!(cmd, Command::Other(text.into()));
            assert_eq!(cmd.to_request().command, text);
        }
        assert_eq!(Command::parse("shot 0 10"), Command::Shot(Coordinate::new(0, 10)));
    }

    #[test]
    fn free_form_text_is_unchanged() {
        let cmd = Command::parse("set size 10 10");
        assert_eq!(cmd, Command::Other("set size 10 10".into()));
        assert_eq!(cmd.to_string(), "set size 10 10");
        assert_eq!(Command::parse("starting").to_string(), "starting");
    }
}
