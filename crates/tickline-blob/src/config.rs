//! Blob transfer tuning
//!
//! The defaults keep one transfer under ~4 KiB per call: four 1024-octet
//! chunks, each resent at most every 200 ms until acknowledged.

use crate::{Error, Result, DEFAULT_MAX_BLOB_OCTETS, MAX_CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use tickline_core::Millis;

/// What the receiver does with a chunk whose length is not the expected one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChunkLengthPolicy {
    /// Drop the chunk and report a recoverable error
    #[default]
    Reject,
    /// Log the anomaly and copy the octets at the declared offset anyway
    ///
    /// The chunk is still not marked as received, so the sender resends it.
    ApplyAndLog,
}

/// Configuration for blob senders and receivers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Octets per chunk (`1..=1024`)
    pub chunk_size: usize,
    /// Upper bound of chunks handed out per send call
    pub max_chunks_per_call: usize,
    /// A chunk sent less than this long ago is not resent
    pub resend_interval_ms: Millis,
    /// Receiver behaviour on chunk length mismatch
    pub length_policy: ChunkLengthPolicy,
    /// Largest blob a receiver allocates for
    pub max_blob_octets: usize,
}

impl BlobConfig {
    /// Check the values a transfer cannot run with
    pub fn validate(&self) -> Result<()> {
        validate_chunk_size(self.chunk_size)
    }
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            chunk_size: MAX_CHUNK_SIZE,
            max_chunks_per_call: 4,
            resend_interval_ms: 200,
            length_policy: ChunkLengthPolicy::Reject,
            max_blob_octets: DEFAULT_MAX_BLOB_OCTETS,
        }
    }
}

pub(crate) fn validate_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::ChunkSizeZero);
    }
    if chunk_size > MAX_CHUNK_SIZE {
        return Err(Error::ChunkSizeTooLarge(chunk_size));
    }
    Ok(())
}
