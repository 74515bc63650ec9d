#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Salvo Client integration tests.
//!
//! Provides a scripted [`MockGameService`] and helpers for building wire
//! grids and snapshots.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use salvo_client::protocol::{CellCode, CommandRequest, CommandResponse, GameStateResponse, Grid};
use salvo_client::{GameService, RawSnapshot, SalvoError, SessionConfig, SessionEvent, Winner};
use tokio::sync::mpsc;

// ── MockGameService ─────────────────────────────────────────────────

#[derive(Default)]
struct Script {
    /// Served by `fetch_state` once `fetches` is drained.
    state: StdMutex<Option<GameStateResponse>>,
    /// One-off fetch results, consumed in order before `state`.
    fetches: StdMutex<VecDeque<Result<RawSnapshot, SalvoError>>>,
    /// Command replies, consumed in order. Empty → empty reply.
    replies: StdMutex<VecDeque<Result<CommandResponse, SalvoError>>>,
    /// Every command text received.
    commands: StdMutex<Vec<String>>,
    fetch_count: AtomicUsize,
}

/// An in-memory Game Service driven by a script.
///
/// Clones share the script, so a test keeps one clone to steer the service
/// while the controller owns another.
#[derive(Clone, Default)]
pub struct MockGameService {
    script: Arc<Script>,
}

impl MockGameService {
    /// A service that serves `state` on every fetch.
    pub fn serving(state: GameStateResponse) -> Self {
        let service = Self::default();
        service.set_state(state);
        service
    }

    pub fn set_state(&self, state: GameStateResponse) {
        *self.script.state.lock().unwrap() = Some(state);
    }

    /// Queue a one-off fetch result.
    pub fn push_fetch(&self, result: Result<RawSnapshot, SalvoError>) {
        self.script.fetches.lock().unwrap().push_back(result);
    }

    /// Queue a command reply.
    pub fn push_reply(&self, result: Result<CommandResponse, SalvoError>) {
        self.script.replies.lock().unwrap().push_back(result);
    }

    /// Queue a successful command reply with `text`.
    pub fn reply(&self, text: &str) {
        self.push_reply(Ok(CommandResponse {
            response: text.to_string(),
        }));
    }

    pub fn commands(&self) -> Vec<String> {
        self.script.commands.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.script.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GameService for MockGameService {
    async fn fetch_state(&self) -> Result<RawSnapshot, SalvoError> {
        self.script.fetch_count.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.script.fetches.lock().unwrap().pop_front() {
            return result;
        }
        match self.script.state.lock().unwrap().clone() {
            Some(state) => Ok(RawSnapshot::Structured(state)),
            None => Err(SalvoError::Transport("connection refused".into())),
        }
    }

    async fn send_command(&self, request: CommandRequest) -> Result<CommandResponse, SalvoError> {
        self.script.commands.lock().unwrap().push(request.command);
        self.script
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandResponse::default()))
    }
}

// ── Grid and snapshot helpers ───────────────────────────────────────

/// A 10×10 grid of empty cells.
pub fn empty_grid() -> Grid {
    vec![vec![CellCode::Numeric(0); 10]; 10]
}

/// A 10×10 grid with the listed `(x, y, code)` cells set.
pub fn grid_with(cells: &[(usize, usize, u8)]) -> Grid {
    let mut grid = empty_grid();
    for &(x, y, code) in cells {
        grid[y][x] = CellCode::from(code);
    }
    grid
}

/// A snapshot of a game still in progress.
pub fn in_progress(my_board: Grid, enemy_board: Grid) -> GameStateResponse {
    GameStateResponse {
        my_board,
        enemy_board,
        game_over: false,
        winner: None,
    }
}

/// A snapshot of a finished game.
pub fn finished(winner: Option<Winner>) -> GameStateResponse {
    GameStateResponse {
        my_board: empty_grid(),
        enemy_board: empty_grid(),
        game_over: true,
        winner,
    }
}

/// Default timings, with no settle pauses.
pub fn quick_config() -> SessionConfig {
    SessionConfig::new()
        .with_post_command_delay(Duration::ZERO)
        .with_game_over_delay(Duration::ZERO)
}

// ── Event helpers ───────────────────────────────────────────────────

/// Drain every event currently buffered on `rx`.
pub fn drain(rx: &mut mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// The `Log` lines among `events`.
pub fn log_lines(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Log(line) => Some(line.clone()),
            _ => None,
        })
        .collect()
}

/// How many `GameOver` events are among `events`.
pub fn game_overs(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::GameOver { .. }))
        .count()
}
