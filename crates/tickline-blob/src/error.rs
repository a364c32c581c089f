//! Error types for tickline-blob

use thiserror::Error;

/// Blob transfer error type
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Chunk size above [`crate::MAX_CHUNK_SIZE`]
    #[error("Chunk size {0} exceeds the maximum of 1024 octets")]
    ChunkSizeTooLarge(usize),

    #[error("Chunk size must be greater than 0")]
    ChunkSizeZero,

    /// Blob too large to be addressed by `u32` chunk ids / octet count
    #[error("Blob of {0} octets is too large to transfer")]
    BlobTooLarge(usize),

    /// A `StartTransfer` announced more octets than the receiver takes
    #[error("Refusing blob of {octet_count} octets, the limit is {limit}")]
    BlobRefused { octet_count: usize, limit: usize },

    #[error("Chunk {chunk_id} is outside a transfer of {chunk_count} chunks")]
    ChunkOutOfRange { chunk_id: u32, chunk_count: u32 },

    #[error("Chunk {chunk_id} carries {actual} octets, expected {expected}")]
    ChunkLengthMismatch {
        chunk_id: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown blob command byte {0:#04x}")]
    UnknownCommand(u8),

    #[error("Chunk payload of {0} octets exceeds the maximum chunk size")]
    PayloadTooLarge(usize),

    /// A command arrived that the state machine cannot use in its current phase
    #[error("Unexpected {command} command while {phase}")]
    UnexpectedCommand {
        phase: &'static str,
        command: &'static str,
    },

    #[error("Wire error: {0}")]
    Wire(#[from] tickline_core::Error),

    #[error("Buffer error: {0}")]
    Buffer(#[from] tickline_buffer::Error),
}

impl Error {
    /// Whether the error must tear down the session
    ///
    /// Everything else is logged and the transfer continues.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ChunkSizeTooLarge(_)
                | Error::ChunkSizeZero
                | Error::BlobTooLarge(_)
                | Error::UnknownCommand(_)
        )
    }
}

/// Result type for blob operations
pub type Result<T> = std::result::Result<T, Error>;
