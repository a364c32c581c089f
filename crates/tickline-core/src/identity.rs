//! Identity types for participants and connections

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of participant ids a session can hand out (`0..64`)
pub const MAX_PARTICIPANTS: usize = 64;

/// Index of a local player on one connection (split-screen, couch co-op)
pub type LocalIndex = u8;

/// Stable identifier of one logical input source within a session
///
/// The id fits in the low 7 bits of the authoritative record header, and the
/// registry only ever allocates ids below [`MAX_PARTICIPANTS`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ParticipantId(u8);

impl ParticipantId {
    /// Create a participant id, rejecting values outside `0..64`
    pub fn new(id: u8) -> Result<Self> {
        if (id as usize) < MAX_PARTICIPANTS {
            Ok(Self(id))
        } else {
            Err(Error::ParticipantIdOutOfRange(id))
        }
    }

    /// Get the raw id value
    pub fn raw(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "participant:{}", self.0)
    }
}

/// Identifier of a network connection as handed out by the transport layer
///
/// One connection may host several participants (one per local player).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// Create a new connection ID
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection:{}", self.0)
    }
}
