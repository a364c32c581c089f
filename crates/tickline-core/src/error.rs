//! Error types for tickline-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unexpected end of datagram: needed {needed} octets, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    #[error("Participant id {0} is outside 0..64")]
    ParticipantIdOutOfRange(u8),

    #[error("{field} value {value} does not fit the wire encoding")]
    FieldOverflow { field: &'static str, value: usize },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
