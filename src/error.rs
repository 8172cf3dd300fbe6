//! Error types for the chat server
//!
//! Defines connection-handler errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Connection-handler errors
///
/// Everything here is fatal for the owning connection only: the handler
/// runs its shutdown sequence and other sessions are unaffected.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error on the client connection (fatal for this connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal outbound channel broken (writer task gone)
    #[error("Channel send error")]
    ChannelSend,
}

/// Message send errors
///
/// Delivery into a session is a defined no-op when the session is gone,
/// so call sites ignore these (`let _ =`).
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the outbound channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The session has already been shut down
    #[error("Session closed")]
    SessionClosed,
}
