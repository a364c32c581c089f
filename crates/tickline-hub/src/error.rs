//! Error types for tickline-hub

use thiserror::Error;
use tickline_core::{ConnectionId, ParticipantId};

/// Result type for tickline-hub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur on the host
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Every participant id in `0..64` is taken
    #[error("all {0} participant ids are in use")]
    ParticipantsExhausted(usize),

    /// More participants than one authoritative record can carry in a datagram
    #[error("registry is limited to {0} participants")]
    RegistryFull(usize),

    #[error("{0} is not registered")]
    UnknownParticipant(ParticipantId),

    /// A new blob transfer was requested while one is still running
    #[error("{0} already has a blob transfer in progress")]
    TransferInProgress(ConnectionId),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("netcode error: {0}")]
    Netcode(#[from] tickline_netcode::Error),

    #[error("blob error: {0}")]
    Blob(#[from] tickline_blob::Error),

    #[error("wire error: {0}")]
    Wire(#[from] tickline_core::Error),
}

impl Error {
    /// Whether the session has to be torn down
    ///
    /// Recoverable errors (late or malformed datagrams, ack anomalies, a full
    /// predicted step queue) are logged by the host and the session goes on.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::ParticipantsExhausted(_) | Error::InvalidConfig(_) => true,
            Error::Netcode(inner) => inner.is_fatal(),
            Error::Blob(inner) => inner.is_fatal(),
            Error::Io(_)
            | Error::Ron(_)
            | Error::RegistryFull(_)
            | Error::UnknownParticipant(_)
            | Error::TransferInProgress(_)
            | Error::Transport(_)
            | Error::Wire(_) => false,
        }
    }
}

// Compile-time check that Error is Send + Sync so a session thread can hand it back.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
