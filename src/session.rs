//! Session lifecycle: `Idle → Active → Over`.
//!
//! `Over` is terminal. Every transition is checked against the state held at
//! the moment it is applied, so two callers racing to end the game cannot
//! both succeed.

use std::fmt;

use uuid::Uuid;

use crate::error::{Result, SalvoError};
use crate::protocol::Winner;

/// Identifier attached to a session for log correlation.
pub type SessionId = Uuid;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No game in progress; polling disabled.
    Idle,
    /// Polling enabled, commands accepted.
    Active,
    /// Terminal. `winner` is `None` only if the service declared the game
    /// over without naming one.
    Over { winner: Option<Winner> },
}

impl SessionState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_over(self) -> bool {
        matches!(self, Self::Over { .. })
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Active => f.write_str("active"),
            Self::Over { winner: Some(w) } => write!(f, "over ({w} won)"),
            Self::Over { winner: None } => f.write_str("over"),
        }
    }
}

/// Result of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state changed.
    Changed,
    /// Already in the requested state.
    Unchanged,
}

/// A single game session.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    state: SessionState,
}

impl Session {
    /// A fresh `Idle` session with a random id.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The recorded winner, once the session is over.
    pub fn winner(&self) -> Option<Winner> {
        match self.state {
            SessionState::Over { winner } => winner,
            _ => None,
        }
    }

    /// `Idle → Active`.
    ///
    /// # Errors
    ///
    /// Returns [`SalvoError::SessionOver`] once the session has ended.
    pub fn start(&mut self) -> Result<Transition> {
        match self.state {
            SessionState::Idle => {
                self.state = SessionState::Active;
                Ok(Transition::Changed)
            }
            SessionState::Active => Ok(Transition::Unchanged),
            SessionState::Over { .. } => Err(SalvoError::SessionOver),
        }
    }

    /// `Active → Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`SalvoError::SessionOver`] once the session has ended.
    pub fn stop(&mut self) -> Result<Transition> {
        match self.state {
            SessionState::Active => {
                self.state = SessionState::Idle;
                Ok(Transition::Changed)
            }
            SessionState::Idle => Ok(Transition::Unchanged),
            SessionState::Over { .. } => Err(SalvoError::SessionOver),
        }
    }

    /// `Active → Over`, recording `winner`.
    ///
    /// Returns `true` only for the call that performed the transition; any
    /// call made while not `Active` is a no-op returning `false`.
    pub fn finish(&mut self, winner: Option<Winner>) -> bool {
        if self.state.is_active() {
            self.state = SessionState::Over { winner };
            true
        } else {
            false
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
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
    fn new_session_is_idle() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.winner(), None);
        assert_ne!(session.id(), Session::new().id());
    }

    #[test]
    fn start_stop_round() {
        let mut session = Session::new();
        assert_eq!(session.start().unwrap(), Transition::Changed);
        assert_eq!(session.start().unwrap(), Transition::Unchanged);
        assert_eq!(session.stop().unwrap(), Transition::Changed);
        assert_eq!(session.stop().unwrap(), Transition::Unchanged);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn finish_happens_once() {
        let mut session = Session::new();
        session.start().unwrap();
        assert!(session.finish(Some(Winner::Player)));
        assert!(!session.finish(Some(Winner::Enemy)));
        assert_eq!(session.winner(), Some(Winner::Player));
    }

    #[test]
    fn finish_requires_active() {
        let mut session = Session::new();
        assert!(!session.finish(Some(Winner::Enemy)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn over_is_terminal() {
        let mut session = Session::new();
        session.start().unwrap();
        session.finish(None);
        assert!(matches!(session.start(), Err(SalvoError::SessionOver)));
        assert!(matches!(session.stop(), Err(SalvoError::SessionOver)));
        assert!(session.state().is_over());
    }

    #[test]
    fn display_names_the_winner() {
        assert_eq!(
            SessionState::Over {
                winner: Some(Winner::Player)
            }
            .to_string(),
            "over (player won)"
        );
        assert_eq!(SessionState::Active.to_string(), "active");
    }
}
