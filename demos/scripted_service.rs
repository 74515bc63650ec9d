//! # Scripted Service Example
//!
//! Demonstrates implementing [`GameService`] for an in-process backend and
//! driving a whole game through the [`CommandDispatcher`]:
//!
//! 1. Implement `GameService` for a tiny single-player game
//! 2. Start the session with the `start` keyword
//! 3. Fire at the enemy fleet until every ship is destroyed
//! 4. Watch the session end with the player as winner
//!
//! No network is involved, which makes this pattern useful for tests and
//! offline play.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example scripted_service
//! ```

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use salvo_client::protocol::{CellCode, CommandRequest, CommandResponse, GameStateResponse, Grid};
use salvo_client::{
    CommandDispatcher, Coordinate, GameService, RawSnapshot, Result, SessionConfig,
    SessionController, SessionEvent, Winner,
};

const SIZE: usize = 10;

// ── An in-process game ──────────────────────────────────────────────

struct Game {
    /// Enemy ships as lists of cells; a cell is removed when hit.
    fleet: Vec<Vec<Coordinate>>,
    /// Wire codes of the enemy board as the player sees it.
    enemy: Grid,
    /// Wire codes of the player's own board.
    own: Grid,
    started: bool,
}

impl Game {
    fn new() -> Self {
        let mut own = vec![vec![CellCode::from(0u8); SIZE]; SIZE];
        for (x, y) in [(1, 1), (1, 2), (6, 8)] {
            set(&mut own, Coordinate::new(x, y), 1);
        }
        Self {
            fleet: vec![
                vec![Coordinate::new(2, 3), Coordinate::new(3, 3)],
                vec![Coordinate::new(7, 0)],
            ],
            enemy: vec![vec![CellCode::from(0u8); SIZE]; SIZE],
            own,
            started: false,
        }
    }

    fn shoot(&mut self, target: Coordinate) -> &'static str {
        if !self.started {
            return "Game not started";
        }
        let Some(ship) = self.fleet.iter_mut().find(|ship| ship.contains(&target)) else {
            set(&mut self.enemy, target, 3);
            return "Miss! The enemy holds fire.";
        };
        ship.retain(|cell| *cell != target);
        if ship.is_empty() {
            set(&mut self.enemy, target, 4);
            "Ship destroyed! Your turn again."
        } else {
            set(&mut self.enemy, target, 2);
            "Hit! Your turn again."
        }
    }

    fn is_won(&self) -> bool {
        self.fleet.iter().all(Vec::is_empty)
    }
}

fn set(grid: &mut Grid, at: Coordinate, code: u8) {
    if let Some(cell) = grid.get_mut(at.y).and_then(|row| row.get_mut(at.x)) {
        *cell = CellCode::from(code);
    }
}

/// A [`GameService`] backed by a [`Game`] in memory.
struct ScriptedService {
    game: Mutex<Game>,
}

#[async_trait]
impl GameService for ScriptedService {
    async fn fetch_state(&self) -> Result<RawSnapshot> {
        let game = self.game.lock().map_err(|_| poisoned())?;
        let won = game.is_won();
        Ok(RawSnapshot::Structured(GameStateResponse {
            my_board: game.own.clone(),
            enemy_board: game.enemy.clone(),
            game_over: won,
            winner: won.then_some(Winner::Player),
        }))
    }

    async fn send_command(&self, request: CommandRequest) -> Result<CommandResponse> {
        let mut game = self.game.lock().map_err(|_| poisoned())?;
        let mut words = request.command.split_whitespace();
        let response = match (words.next(), words.next(), words.next()) {
            (Some("start"), None, None) => {
                game.started = true;
                "Game started".to_string()
            }
            (Some("stop"), None, None) => {
                game.started = false;
                "Game stopped".to_string()
            }
            (Some("shot"), Some(x), Some(y)) => match (x.parse(), y.parse()) {
                (Ok(x), Ok(y)) => game.shoot(Coordinate::new(x, y)).to_string(),
                _ => "Invalid coordinates".to_string(),
            },
            _ => format!("Unknown command: {}", request.command),
        };
        Ok(CommandResponse { response })
    }
}

fn poisoned() -> salvo_client::SalvoError {
    salvo_client::SalvoError::Transport("game state lock poisoned".into())
}

// ── Driver ──────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let service = ScriptedService {
        game: Mutex::new(Game::new()),
    };
    let config = SessionConfig::new()
        .with_poll_interval(Duration::from_millis(200))
        .with_post_command_delay(Duration::from_millis(50))
        .with_game_over_delay(Duration::from_millis(500));
    let (controller, mut events) = SessionController::new(service, config);
    let dispatcher = CommandDispatcher::new(controller.clone());

    // Print log lines as they arrive.
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Log(line) => println!("{line}"),
                SessionEvent::GameOver { winner } => {
                    tracing::info!(?winner, "game over event received");
                }
                _ => {}
            }
        }
    });

    dispatcher.submit("start").await?;

    let targets = [(0, 0), (2, 3), (3, 3), (9, 9), (7, 0)];
    for (x, y) in targets {
        if controller.state().await.is_over() {
            break;
        }
        dispatcher.shoot(Coordinate::new(x, y)).await?;
    }

    let (own, enemy) = controller.boards().await;
    println!("Your ships:\n{own}Enemy ships:\n{enemy}");
    println!("Final state: {}", controller.state().await);

    // Dropping the last controller handle closes the event channel.
    drop(dispatcher);
    drop(controller);
    let _ = printer.await;
    Ok(())
}
