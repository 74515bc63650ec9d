//! Game Service abstraction.
//!
//! The [`GameService`] trait is the only way the client talks to the remote
//! authority: one call to fetch a snapshot, one to submit a command. How the
//! bytes travel is up to the implementor; the crate ships an HTTP/1.1
//! implementation behind the `transport-http` feature.
//!
//! # Implementing a Custom Service
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use salvo_client::error::Result;
//! use salvo_client::protocol::{CommandRequest, CommandResponse};
//! use salvo_client::service::GameService;
//! use salvo_client::snapshot::RawSnapshot;
//!
//! struct MyService { /* ... */ }
//!
//! #[async_trait]
//! impl GameService for MyService {
//!     async fn fetch_state(&self) -> Result<RawSnapshot> {
//!         // Fetch and parse the current game state
//!         # unimplemented!()
//!     }
//!
//!     async fn send_command(&self, request: CommandRequest) -> Result<CommandResponse> {
//!         // Submit the command and return the service's reply
//!         # unimplemented!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{CommandRequest, CommandResponse};
use crate::snapshot::RawSnapshot;

/// Request/response access to the remote Game Service.
///
/// Calls take `&self`: the periodic poll and the command path share one
/// service and may have requests in flight at the same time.
///
/// # Object Safety
///
/// This trait is object-safe; the controller stores it as
/// `Arc<dyn GameService>`.
#[async_trait]
pub trait GameService: Send + Sync + 'static {
    /// Fetch the current snapshot of both boards.
    ///
    /// # Errors
    ///
    /// Returns a transport error ([`SalvoError::Transport`](crate::SalvoError::Transport),
    /// [`SalvoError::HttpStatus`](crate::SalvoError::HttpStatus),
    /// [`SalvoError::Timeout`](crate::SalvoError::Timeout)) if the request
    /// fails, or [`SalvoError::MalformedSnapshot`](crate::SalvoError::MalformedSnapshot)
    /// if the body cannot be parsed.
    async fn fetch_state(&self) -> Result<RawSnapshot>;

    /// Submit a command and return the service's reply.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the request fails or the reply cannot be
    /// read.
    async fn send_command(&self, request: CommandRequest) -> Result<CommandResponse>;
}
