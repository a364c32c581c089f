//! Sending side of a chunked blob transfer

use crate::config::validate_chunk_size;
use crate::{chunk_count_for, BlobConfig, Error, Result, ACK_MASK_BITS};
use log::{debug, warn};
use tickline_core::Millis;

/// Send bookkeeping for one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEntry {
    /// Chunk index within the blob
    pub index: u32,
    /// Payload length of this chunk
    pub octet_count: u16,
    /// When the chunk was last handed out for sending
    pub last_sent_at: Option<Millis>,
    /// How many times the chunk has been handed out
    pub send_count: u32,
    /// Whether the receiver has acknowledged the chunk
    pub received: bool,
}

/// Effect of one ack on the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Some chunks are still missing
    Progress {
        /// Chunks that became acknowledged by this ack
        newly_received: usize,
    },
    /// Every chunk has been acknowledged
    Complete,
    /// The ack base lies past the end of the blob; ignored
    OutOfRange,
}

/// Splits a blob into chunks and decides which ones to (re)send
#[derive(Debug, Clone)]
pub struct ChunkedBlobSender {
    blob: Vec<u8>,
    chunk_size: usize,
    chunks: Vec<ChunkEntry>,
    received_count: usize,
    max_chunks_per_call: usize,
    resend_interval_ms: Millis,
}

impl ChunkedBlobSender {
    /// Prepare `blob` for transfer using the chunk geometry in `config`
    ///
    /// Fails with [`Error::ChunkSizeTooLarge`] for chunks above 1024 octets.
    pub fn new(blob: Vec<u8>, config: &BlobConfig) -> Result<Self> {
        validate_chunk_size(config.chunk_size)?;
        if u32::try_from(blob.len()).is_err() {
            return Err(Error::BlobTooLarge(blob.len()));
        }

        let chunk_size = config.chunk_size;
        let chunks = (0..chunk_count_for(blob.len(), chunk_size))
            .map(|index| {
                let start = index * chunk_size;
                let octet_count = (blob.len() - start).min(chunk_size);
                ChunkEntry {
                    index: index as u32,
                    octet_count: octet_count as u16,
                    last_sent_at: None,
                    send_count: 0,
                    received: false,
                }
            })
            .collect();

        Ok(Self {
            blob,
            chunk_size,
            chunks,
            received_count: 0,
            max_chunks_per_call: config.max_chunks_per_call,
            resend_interval_ms: config.resend_interval_ms,
        })
    }

    /// Pick the chunks to send now, in index order
    ///
    /// A chunk qualifies if it is unacknowledged and was not handed out within
    /// the resend interval. Every returned chunk has its `send_count` bumped
    /// and `last_sent_at` set to `now`.
    pub fn chunks_to_send(&mut self, now: Millis) -> Vec<u32> {
        let resend_interval = self.resend_interval_ms;
        let due = self
            .chunks
            .iter_mut()
            .filter(|chunk| !chunk.received)
            .filter(|chunk| match chunk.last_sent_at {
                None => true,
                Some(sent_at) => now.saturating_sub(sent_at) >= resend_interval,
            })
            .take(self.max_chunks_per_call);

        let mut selected = Vec::with_capacity(self.max_chunks_per_call);
        for chunk in due {
            chunk.send_count += 1;
            chunk.last_sent_at = Some(now);
            selected.push(chunk.index);
        }
        selected
    }

    /// Payload of one chunk
    pub fn chunk_payload(&self, index: u32) -> Option<&[u8]> {
        let chunk = self.chunks.get(index as usize)?;
        let start = index as usize * self.chunk_size;
        Some(&self.blob[start..start + chunk.octet_count as usize])
    }

    /// Apply a receiver ack: everything before `base` arrived, `mask` covers `[base, base + 64)`
    pub fn receive_ack(&mut self, base: u32, mask: u64) -> AckOutcome {
        let chunk_count = self.chunks.len();
        let base = base as usize;
        if base > chunk_count {
            warn!(
                "Ignoring blob ack with base {} past chunk count {}",
                base, chunk_count
            );
            return AckOutcome::OutOfRange;
        }

        let before = self.received_count;
        for index in 0..base {
            self.mark_received(index);
        }
        for offset in 0..ACK_MASK_BITS {
            if mask & (1u64 << offset) != 0 && base + offset < chunk_count {
                self.mark_received(base + offset);
            }
        }

        if base == chunk_count || self.is_complete() {
            debug!("Blob transfer of {} chunks acknowledged", chunk_count);
            AckOutcome::Complete
        } else {
            AckOutcome::Progress {
                newly_received: self.received_count - before,
            }
        }
    }

    fn mark_received(&mut self, index: usize) {
        let chunk = &mut self.chunks[index];
        if !chunk.received {
            chunk.received = true;
            self.received_count += 1;
        }
    }

    /// Whether every chunk has been acknowledged
    pub fn is_complete(&self) -> bool {
        self.received_count == self.chunks.len()
    }

    pub fn chunk(&self, index: u32) -> Option<&ChunkEntry> {
        self.chunks.get(index as usize)
    }

    pub fn chunks(&self) -> &[ChunkEntry] {
        &self.chunks
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunks.len() as u32
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn octet_count(&self) -> usize {
        self.blob.len()
    }

    pub fn received_count(&self) -> usize {
        self.received_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(octets: usize) -> ChunkedBlobSender {
        let blob: Vec<u8> = (0..octets).map(|i| (i % 251) as u8).collect();
        ChunkedBlobSender::new(blob, &BlobConfig::default()).unwrap()
    }

    #[test]
    fn test_chunk_geometry() {
        let sender = sender(2500);
        let sizes: Vec<_> = sender.chunks().iter().map(|c| c.octet_count).collect();
        assert_eq!(sizes, vec![1024, 1024, 452]);
        assert_eq!(sender.chunk_payload(2).unwrap().len(), 452);
        assert_eq!(sender.chunk_payload(1).unwrap()[0], (1024 % 251) as u8);
        assert!(sender.chunk_payload(3).is_none());
    }

    #[test]
    fn test_rejects_oversized_chunks() {
        let config = BlobConfig {
            chunk_size: 2048,
            ..BlobConfig::default()
        };
        assert_eq!(
            ChunkedBlobSender::new(vec![0; 10], &config).unwrap_err(),
            Error::ChunkSizeTooLarge(2048)
        );
    }

    #[test]
    fn test_first_call_respects_limit() {
        let mut large = sender(10 * 1024);
        let first = large.chunks_to_send(1000);
        assert_eq!(first, vec![0, 1, 2, 3]);
        for index in &first {
            assert_eq!(large.chunk(*index).unwrap().send_count, 1);
            assert_eq!(large.chunk(*index).unwrap().last_sent_at, Some(1000));
        }

        let mut small = sender(100);
        assert_eq!(small.chunks_to_send(0), vec![0]);
    }

    #[test]
    fn test_resend_window() {
        let mut sender = sender(3 * 1024);
        let first = sender.chunks_to_send(1000);
        assert_eq!(first, vec![0, 1, 2]);

        // still inside the resend window: nothing is due
        assert!(sender.chunks_to_send(1100).is_empty());

        let again = sender.chunks_to_send(1200);
        assert_eq!(again, first);
        assert_eq!(sender.chunk(0).unwrap().send_count, 2);
    }

    #[test]
    fn test_window_moves_past_sent_chunks() {
        let mut sender = sender(8 * 1024);
        assert_eq!(sender.chunks_to_send(0), vec![0, 1, 2, 3]);
        assert_eq!(sender.chunks_to_send(10), vec![4, 5, 6, 7]);
        assert!(sender.chunks_to_send(20).is_empty());
    }

    #[test]
    fn test_ack_base_and_mask() {
        let mut sender = sender(8 * 1024);
        sender.chunks_to_send(0);

        // 0..2 received, plus 3 and 5 via the mask (bit 0 = chunk 2)
        let outcome = sender.receive_ack(2, (1 << 1) | (1 << 3));
        assert_eq!(outcome, AckOutcome::Progress { newly_received: 4 });
        assert!(sender.chunk(3).unwrap().received);
        assert!(!sender.chunk(2).unwrap().received);

        // acked chunks are never resent
        assert_eq!(sender.chunks_to_send(1000), vec![2, 4, 6, 7]);
    }

    #[test]
    fn test_ack_completes_transfer() {
        let mut sender = sender(2500);
        assert_eq!(sender.receive_ack(3, 0), AckOutcome::Complete);
        assert!(sender.is_complete());
        assert!(sender.chunks_to_send(0).is_empty());
    }

    #[test]
    fn test_out_of_range_ack_ignored() {
        let mut sender = sender(2500);
        assert_eq!(sender.receive_ack(4, u64::MAX), AckOutcome::OutOfRange);
        assert_eq!(sender.received_count(), 0);
    }

    #[test]
    fn test_empty_blob_is_complete() {
        let sender = sender(0);
        assert_eq!(sender.chunk_count(), 0);
        assert!(sender.is_complete());
    }
}
