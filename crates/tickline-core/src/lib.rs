//! Tickline Core - Shared primitives for the tick-synchronization stack
//!
//! This crate provides the small, dependency-free building blocks every other
//! tickline crate speaks in:
//! - Wrapping logical clocks (`TickId`, `TickRange`)
//! - Ordered-datagram bookkeeping (`SequenceId`, `SequenceGapDetector`, `SequenceCounter`)
//! - Participant and connection identifiers
//! - Big-endian octet reader/writer used by all wire codecs
//!
//! ## Time
//!
//! Nothing in tickline reads a clock. Callers pass a monotonic millisecond
//! value ([`Millis`]) wherever resend timing needs one.

mod error;
mod identity;
pub mod octets;
pub mod sequence;
mod tick;

pub use error::{Error, Result};
pub use identity::{ConnectionId, LocalIndex, ParticipantId, MAX_PARTICIPANTS};
pub use octets::{OctetReader, OctetWriter};
pub use sequence::{
    read_datagram_header, write_datagram_header, GapOutcome, GapStats, SequenceCounter,
    SequenceGapDetector, SequenceId, MAX_FORWARD_DIFF,
};
pub use tick::{TickId, TickRange};

/// Monotonic wall-clock time in milliseconds, supplied by the caller
pub type Millis = u64;
