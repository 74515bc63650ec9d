//! Command Dispatcher: submits console commands and folds their results
//! back into the session.
//!
//! Every successful submission is followed, after
//! [`SessionConfig::post_command_delay`](crate::SessionConfig::post_command_delay),
//! by a refresh through the controller. On top of that:
//!
//! - `start` / `stop` start or stop the session;
//! - `shot x y` feeds the classified reply into the effect deriver.
//!
//! Failures are never retried here; retrying is the caller's decision.

use std::sync::Arc;

use tracing::{debug, info};

use crate::board::Coordinate;
use crate::controller::{ReconcileOutcome, SessionController};
use crate::effects::{ShotOutcome, ShotResult};
use crate::error::Result;
use crate::protocol::Command;
use crate::service::GameService;

/// What a submitted command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// The command as classified and sent.
    pub command: Command,
    /// The service's reply text.
    pub response: String,
    /// The shot result folded into the enemy board, for `shot` commands
    /// whose reply named an outcome.
    pub shot: Option<ShotResult>,
    /// The follow-up refresh, or `None` if it failed (the failure is on the
    /// event log).
    pub refresh: Option<ReconcileOutcome>,
}

/// Sends commands to the Game Service on behalf of a session.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    controller: SessionController,
}

impl CommandDispatcher {
    /// Create a dispatcher sharing `controller`'s Game Service.
    pub fn new(controller: SessionController) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Classify and submit a line of command text.
    ///
    /// # Errors
    ///
    /// See [`submit_command`](Self::submit_command).
    pub async fn submit(&self, text: &str) -> Result<CommandOutcome> {
        self.submit_command(Command::parse(text)).await
    }

    /// Fire at `coord` on the enemy board.
    ///
    /// # Errors
    ///
    /// See [`submit_command`](Self::submit_command).
    pub async fn shoot(&self, coord: Coordinate) -> Result<CommandOutcome> {
        self.submit_command(Command::Shot(coord)).await
    }

    /// Submit `command` and reconcile afterwards.
    ///
    /// # Errors
    ///
    /// - [`SalvoError::NotActive`](crate::SalvoError::NotActive),
    ///   [`SalvoError::SessionOver`](crate::SalvoError::SessionOver) or
    ///   [`SalvoError::OutOfBounds`](crate::SalvoError::OutOfBounds) if a shot
    ///   cannot be fired; nothing is sent.
    /// - [`SalvoError::Dispatch`](crate::SalvoError::Dispatch) if the
    ///   submission fails; no lifecycle change is made.
    pub async fn submit_command(&self, command: Command) -> Result<CommandOutcome> {
        let controller = &self.controller;
        let text = command.to_string();
        controller.log(format!("> {text}"));

        if let Command::Shot(coord) = &command {
            controller.reported(controller.check_shot(*coord).await, "shot")?;
        }

        info!(command = %text, "submitting command");
        let service: &Arc<dyn GameService> = controller.service();
        let reply = controller.reported(
            service
                .send_command(command.to_request())
                .await
                .map_err(|e| e.into_dispatch(text.as_str())),
            "command",
        )?;
        debug!(response = %reply.response, "command accepted");
        if !reply.response.is_empty() {
            controller.log(reply.response.clone());
        }

        let mut shot = None;
        match &command {
            Command::Start => {
                let _ = controller.reported(controller.start().await, "start");
            }
            Command::Stop => {
                let _ = controller.reported(controller.stop().await, "stop");
            }
            Command::Shot(coord) => {
                if let Some(outcome) = ShotOutcome::from_response(&reply.response) {
                    let result = ShotResult::new(*coord, outcome);
                    if controller
                        .reported(controller.apply_shot(result).await, "shot")
                        .is_ok()
                    {
                        shot = Some(result);
                    }
                }
            }
            Command::Other(_) => {}
        }

        tokio::time::sleep(controller.config().post_command_delay).await;
        let refresh = controller.refresh().await.ok();

        Ok(CommandOutcome {
            command,
            response: reply.response,
            shot,
            refresh,
        })
    }
}
