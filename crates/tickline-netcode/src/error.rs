//! Error types for tickline-netcode

use thiserror::Error;
use tickline_core::TickId;

/// Netcode error type
#[derive(Debug, Error)]
pub enum Error {
    /// A predicted step for a tick the consumer already passed
    #[error("Stale predicted step for {tick}, queue is waiting for {waiting_for}")]
    StaleTick { tick: TickId, waiting_for: TickId },

    /// An authoritative step that does not continue the queue
    #[error("Authoritative step {actual} does not continue the queue at {expected}")]
    TickDiscontinuity { expected: TickId, actual: TickId },

    /// Predicted step queue has no free slot
    #[error("Predicted step queue full ({capacity} steps)")]
    QueueFull { capacity: usize },

    /// Step payload above [`crate::MAX_STEP_PAYLOAD_OCTETS`]
    #[error("Step payload of {0} octets exceeds the maximum of 64")]
    PayloadTooLarge(usize),

    /// Unrecognised command byte at the start of a datagram body
    #[error("Unknown command byte {0:#04x}")]
    UnknownCommand(u8),

    /// Per-step marker inside a predicted-steps datagram is wrong
    #[error("Expected step marker 0xbd, found {0:#04x}")]
    InvalidStepMarker(u8),

    #[error("Unknown connect state {0}")]
    InvalidConnectState(u8),

    /// A single encoded item cannot fit into the datagram limit
    #[error("Encoding needs {needed} octets but the datagram limit is {limit}")]
    DatagramLimit { needed: usize, limit: usize },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Wire error: {0}")]
    Wire(#[from] tickline_core::Error),

    #[error("Buffer error: {0}")]
    Buffer(#[from] tickline_buffer::Error),

    #[error("Blob error: {0}")]
    Blob(#[from] tickline_blob::Error),
}

impl Error {
    /// Whether the session cannot continue after this error
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::StaleTick { .. }
            | Error::TickDiscontinuity { .. }
            | Error::UnknownCommand(_)
            | Error::DatagramLimit { .. } => true,
            Error::Buffer(tickline_buffer::Error::Full { .. }) => true,
            Error::Blob(inner) => inner.is_fatal(),
            _ => false,
        }
    }
}

/// Result type for netcode operations
pub type Result<T> = std::result::Result<T, Error>;
