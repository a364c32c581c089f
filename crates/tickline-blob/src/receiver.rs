//! Receiving side of a chunked blob transfer

use crate::config::validate_chunk_size;
use crate::{chunk_count_for, ChunkLengthPolicy, Error, Result};
use log::warn;
use tickline_buffer::BitSet;

/// What happened to one received chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkReceipt {
    /// First arrival, stored and marked received
    Stored,
    /// The chunk had already arrived
    Duplicate,
    /// Wrong length, copied anyway under [`ChunkLengthPolicy::ApplyAndLog`]
    AppliedMismatched,
}

/// Reassembles a blob from chunks arriving in any order
#[derive(Debug, Clone)]
pub struct ChunkedBlobReceiver {
    assembly: Vec<u8>,
    chunk_size: usize,
    received: BitSet,
    length_policy: ChunkLengthPolicy,
}

impl ChunkedBlobReceiver {
    /// Prepare to receive `octet_count` octets in chunks of `chunk_size`
    pub fn new(
        octet_count: usize,
        chunk_size: usize,
        length_policy: ChunkLengthPolicy,
    ) -> Result<Self> {
        validate_chunk_size(chunk_size)?;
        if u32::try_from(octet_count).is_err() {
            return Err(Error::BlobTooLarge(octet_count));
        }
        Ok(Self {
            assembly: vec![0; octet_count],
            chunk_size,
            received: BitSet::new(chunk_count_for(octet_count, chunk_size)),
            length_policy,
        })
    }

    /// Length a chunk must have: `chunk_size`, or the remainder for the last one
    pub fn expected_chunk_len(&self, chunk_id: u32) -> usize {
        let start = chunk_id as usize * self.chunk_size;
        self.assembly.len().saturating_sub(start).min(self.chunk_size)
    }

    /// Store one chunk at `chunk_id × chunk_size`
    ///
    /// A chunk only counts as received when its length matches
    /// [`Self::expected_chunk_len`].
    pub fn receive_chunk(&mut self, chunk_id: u32, payload: &[u8]) -> Result<ChunkReceipt> {
        let chunk_count = self.chunk_count();
        if chunk_id >= chunk_count {
            return Err(Error::ChunkOutOfRange {
                chunk_id,
                chunk_count,
            });
        }

        let start = chunk_id as usize * self.chunk_size;
        let expected = self.expected_chunk_len(chunk_id);
        if payload.len() != expected {
            warn!(
                "Blob chunk {} has {} octets, expected {}",
                chunk_id,
                payload.len(),
                expected
            );
            return match self.length_policy {
                ChunkLengthPolicy::Reject => Err(Error::ChunkLengthMismatch {
                    chunk_id,
                    expected,
                    actual: payload.len(),
                }),
                ChunkLengthPolicy::ApplyAndLog => {
                    let end = (start + payload.len()).min(self.assembly.len());
                    self.assembly[start..end].copy_from_slice(&payload[..end - start]);
                    Ok(ChunkReceipt::AppliedMismatched)
                }
            };
        }

        self.assembly[start..start + expected].copy_from_slice(payload);
        if self.received.set(chunk_id as usize)? {
            Ok(ChunkReceipt::Stored)
        } else {
            Ok(ChunkReceipt::Duplicate)
        }
    }

    /// Whether every chunk has arrived
    pub fn is_complete(&self) -> bool {
        self.received.is_all_set()
    }

    /// Index of the lowest missing chunk; equals the chunk count when complete
    pub fn first_unset_chunk_index(&self) -> u32 {
        self.received
            .first_unset()
            .unwrap_or(self.received.bit_count()) as u32
    }

    /// Ack to send back: `(base, mask)` where every chunk before `base` has
    /// arrived and bit `i` of `mask` reports chunk `base + i`
    pub fn ack(&self) -> (u32, u64) {
        let base = self.first_unset_chunk_index();
        (base, self.received.window_mask(base as usize))
    }

    /// The reassembled blob, once complete
    pub fn blob(&self) -> Option<&[u8]> {
        self.is_complete().then_some(self.assembly.as_slice())
    }

    /// Take the reassembled blob, handing the receiver back while incomplete
    pub fn into_blob(self) -> std::result::Result<Vec<u8>, Self> {
        if self.is_complete() {
            Ok(self.assembly)
        } else {
            Err(self)
        }
    }

    pub fn chunk_count(&self) -> u32 {
        self.received.bit_count() as u32
    }

    pub fn received_chunk_count(&self) -> usize {
        self.received.count_set()
    }

    pub fn octet_count(&self) -> usize {
        self.assembly.len()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(octets: usize) -> Vec<u8> {
        (0..octets).map(|i| (i * 7 % 256) as u8).collect()
    }

    fn chunk_of(blob: &[u8], chunk_id: usize, chunk_size: usize) -> &[u8] {
        let start = chunk_id * chunk_size;
        &blob[start..(start + chunk_size).min(blob.len())]
    }

    #[test]
    fn test_reassembly_in_any_order() {
        let source = blob(2500);
        let mut receiver = ChunkedBlobReceiver::new(2500, 1024, ChunkLengthPolicy::Reject).unwrap();
        assert_eq!(receiver.chunk_count(), 3);

        for chunk_id in [2usize, 0, 1] {
            let receipt = receiver
                .receive_chunk(chunk_id as u32, chunk_of(&source, chunk_id, 1024))
                .unwrap();
            assert_eq!(receipt, ChunkReceipt::Stored);
        }

        assert!(receiver.is_complete());
        assert_eq!(receiver.first_unset_chunk_index(), 3);
        assert_eq!(receiver.blob().unwrap(), source.as_slice());
        assert_eq!(receiver.into_blob().unwrap(), source);
    }

    #[test]
    fn test_withheld_chunk() {
        let source = blob(10 * 300);
        let mut receiver =
            ChunkedBlobReceiver::new(source.len(), 300, ChunkLengthPolicy::Reject).unwrap();
        for chunk_id in (0..10).rev().filter(|id| *id != 6) {
            receiver
                .receive_chunk(chunk_id as u32, chunk_of(&source, chunk_id, 300))
                .unwrap();
        }

        assert!(!receiver.is_complete());
        assert_eq!(receiver.first_unset_chunk_index(), 6);
        assert!(receiver.blob().is_none());

        let (base, mask) = receiver.ack();
        assert_eq!(base, 6);
        // bit 0 is the missing chunk itself, 7..=9 follow it
        assert_eq!(mask, 0b1110);
    }

    #[test]
    fn test_last_chunk_length() {
        let source = blob(2500);
        let mut receiver = ChunkedBlobReceiver::new(2500, 1024, ChunkLengthPolicy::Reject).unwrap();
        assert_eq!(receiver.expected_chunk_len(2), 452);

        let padded = vec![0u8; 1024];
        assert_eq!(
            receiver.receive_chunk(2, &padded),
            Err(Error::ChunkLengthMismatch {
                chunk_id: 2,
                expected: 452,
                actual: 1024
            })
        );
        assert_eq!(
            receiver.receive_chunk(2, chunk_of(&source, 2, 1024)),
            Ok(ChunkReceipt::Stored)
        );
    }

    #[test]
    fn test_apply_and_log_does_not_complete_chunk() {
        let mut receiver =
            ChunkedBlobReceiver::new(2048, 1024, ChunkLengthPolicy::ApplyAndLog).unwrap();
        let short = vec![0xAA; 10];
        assert_eq!(
            receiver.receive_chunk(1, &short),
            Ok(ChunkReceipt::AppliedMismatched)
        );
        assert_eq!(receiver.received_chunk_count(), 0);

        // oversized payloads are clipped to the assembly buffer
        let long = vec![0xBB; 1500];
        assert_eq!(
            receiver.receive_chunk(1, &long),
            Ok(ChunkReceipt::AppliedMismatched)
        );
        assert_eq!(receiver.first_unset_chunk_index(), 0);
    }

    #[test]
    fn test_duplicate_and_out_of_range() {
        let mut receiver = ChunkedBlobReceiver::new(100, 64, ChunkLengthPolicy::Reject).unwrap();
        let first = vec![1u8; 64];
        assert_eq!(receiver.receive_chunk(0, &first), Ok(ChunkReceipt::Stored));
        assert_eq!(receiver.receive_chunk(0, &first), Ok(ChunkReceipt::Duplicate));
        assert_eq!(
            receiver.receive_chunk(2, &first),
            Err(Error::ChunkOutOfRange {
                chunk_id: 2,
                chunk_count: 2
            })
        );
    }

    #[test]
    fn test_construction_limits() {
        assert_eq!(
            ChunkedBlobReceiver::new(10, 1025, ChunkLengthPolicy::Reject).unwrap_err(),
            Error::ChunkSizeTooLarge(1025)
        );
        let empty = ChunkedBlobReceiver::new(0, 1024, ChunkLengthPolicy::Reject).unwrap();
        assert!(empty.is_complete());
        assert_eq!(empty.ack(), (0, 0));
    }
}
