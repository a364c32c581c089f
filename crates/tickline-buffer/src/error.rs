//! Error types for tickline-buffer

use thiserror::Error;

/// Buffer error type
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Enqueue on a ring that has no free slot
    #[error("Ring buffer full ({capacity} entries), capacity is too small for the jitter")]
    Full { capacity: usize },

    /// Sliding window index past the window end
    #[error("Index {index} is outside the window of {capacity} slots")]
    OutOfWindow { index: usize, capacity: usize },

    /// Bit index past the end of a bit set
    #[error("Bit {index} is outside a set of {bit_count} bits")]
    BitOutOfRange { index: usize, bit_count: usize },
}

/// Result type for buffer operations
pub type Result<T> = std::result::Result<T, Error>;
