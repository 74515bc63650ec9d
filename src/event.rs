//! Events emitted by the session controller.
//!
//! The event channel is both the renderer's feed and the user-visible log:
//! every reported error or service reply arrives as [`SessionEvent::Log`].

use crate::board::Board;
use crate::effects::ShotResult;
use crate::protocol::Winner;
use crate::session::SessionId;

/// Something the renderer or console should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session became `Active`; periodic refresh is running.
    Started { session_id: SessionId },
    /// The session went back to `Idle`; periodic refresh stopped.
    Stopped { session_id: SessionId },
    /// The local boards changed. Carries copies to draw from.
    BoardsUpdated { own: Board, enemy: Board },
    /// A shot outcome was folded into the enemy board.
    ShotApplied(ShotResult),
    /// The game ended. Delivered exactly once per session, after the
    /// configured settle delay.
    GameOver { winner: Option<Winner> },
    /// A line for the console: service replies, errors, notices.
    Log(String),
}
