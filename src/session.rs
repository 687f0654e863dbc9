//! Hosted sessions over TCP.
//!
//! The host owns the canonical game and every connection; clients submit
//! changes and receive full snapshots after every state change.

mod client;
mod host;
pub mod wire;

use thiserror::Error;

pub use client::Client;
pub use host::Host;
pub use wire::{ClientMessage, ServerMessage, WireError, PROTOCOL_VERSION};

use crate::error::SetupError;

/// Error type for hosting or joining a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Socket setup or I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// A message could not be exchanged.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// The game could not be created.
    #[error("game setup failed: {0}")]
    Setup(#[from] SetupError),
    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
    /// The peer sent something out of order.
    #[error("unexpected message: {0}")]
    Unexpected(String),
}
