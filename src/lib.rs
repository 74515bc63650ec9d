//! # Salvo Client
//!
//! Client-side state reconciliation for a remote two-board grid combat game.
//!
//! The Game Service is the authority: it owns both fleets and decides every
//! shot. This crate keeps a local copy of the player's own board and the
//! fog-of-war view of the enemy board in step with it, by polling snapshots,
//! projecting them into local boards, and folding the locally known effects
//! of the player's shots on top.
//!
//! ## Features
//!
//! - **Service-agnostic**: implement the [`GameService`] trait for any backend
//! - **HTTP built-in**: default `transport-http` feature provides [`HttpGameService`]
//! - **One reconciliation path**: polls, post-command refreshes and pushed
//!   snapshots all go through [`SessionController::reconcile`]
//! - **Event-driven**: receive typed [`SessionEvent`]s via a channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-http")]
//! # async fn example() -> salvo_client::Result<()> {
//! use salvo_client::{
//!     CommandDispatcher, HttpConfig, HttpGameService, SessionConfig, SessionController,
//!     SessionEvent,
//! };
//!
//! let service = HttpGameService::new(HttpConfig::new("127.0.0.1:8080"))?;
//! let (controller, mut events) = SessionController::new(service, SessionConfig::default());
//! let dispatcher = CommandDispatcher::new(controller.clone());
//!
//! controller.initialize().await?;
//! dispatcher.submit("shot 3 4").await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::BoardsUpdated { enemy, .. } => println!("{enemy}"),
//!         SessionEvent::Log(line) => println!("{line}"),
//!         SessionEvent::GameOver { .. } => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod board;
pub mod controller;
pub mod dispatcher;
pub mod effects;
pub mod error;
pub mod event;
pub mod protocol;
pub mod service;
pub mod session;
pub mod snapshot;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use board::{Board, BoardOwner, CellState, Coordinate};
pub use controller::{ReconcileOutcome, SessionConfig, SessionController};
pub use dispatcher::{CommandDispatcher, CommandOutcome};
pub use effects::{derive_effects, ShotOutcome, ShotResult};
pub use error::{Result, SalvoError};
pub use event::SessionEvent;
pub use protocol::{Command, Winner};
pub use service::GameService;
pub use session::{SessionId, SessionState};
pub use snapshot::{RawSnapshot, Snapshot};

#[cfg(feature = "transport-http")]
pub use transports::{HttpConfig, HttpGameService, SnapshotFormat};
