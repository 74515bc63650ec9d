//! Game Service implementations.
//!
//! This module provides concrete [`GameService`](crate::GameService)
//! implementations behind feature gates. Enable the corresponding Cargo
//! feature to pull one in:
//!
//! | Feature          | Service             |
//! |------------------|---------------------|
//! | `transport-http` | [`HttpGameService`] |

#[cfg(feature = "transport-http")]
pub mod http;

#[cfg(feature = "transport-http")]
pub use http::{HttpConfig, HttpGameService, SnapshotFormat};
