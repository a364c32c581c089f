//! Blob stream state machines speaking [`BlobCommand`]
//!
//! The sender announces the blob geometry with `StartTransfer` (repeated on
//! the resend interval until acknowledged), then streams `SetChunk` commands.
//! The receiver answers every `StartTransfer` with `AckStartTransfer` and every
//! chunk with an `AckChunk` carrying its current `(base, mask)`.

use crate::{
    BlobCommand, BlobConfig, ChunkLengthPolicy, ChunkedBlobReceiver, ChunkedBlobSender, Error,
    Result, DEFAULT_MAX_BLOB_OCTETS,
};
use log::{debug, info, warn};
use tickline_core::Millis;

/// Where a [`BlobStreamSender`] is in its transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Waiting for the receiver to acknowledge `StartTransfer`
    Starting { last_sent_at: Option<Millis> },
    /// Sending chunks
    Streaming,
    /// Every chunk acknowledged
    Complete,
}

impl StreamPhase {
    fn describe(&self) -> &'static str {
        match self {
            StreamPhase::Starting { .. } => "starting",
            StreamPhase::Streaming => "streaming",
            StreamPhase::Complete => "complete",
        }
    }
}

/// Sending half of one blob transfer
#[derive(Debug, Clone)]
pub struct BlobStreamSender {
    transfer_id: u16,
    phase: StreamPhase,
    chunks: ChunkedBlobSender,
    resend_interval_ms: Millis,
}

impl BlobStreamSender {
    /// Start a transfer of `blob` identified by `transfer_id`
    pub fn new(transfer_id: u16, blob: Vec<u8>, config: &BlobConfig) -> Result<Self> {
        let chunks = ChunkedBlobSender::new(blob, config)?;
        info!(
            "Blob transfer {} prepared: {} octets in {} chunks",
            transfer_id,
            chunks.octet_count(),
            chunks.chunk_count()
        );
        Ok(Self {
            transfer_id,
            phase: StreamPhase::Starting { last_sent_at: None },
            chunks,
            resend_interval_ms: config.resend_interval_ms,
        })
    }

    /// Commands to put on the wire at `now`
    pub fn commands(&mut self, now: Millis) -> Vec<BlobCommand> {
        match self.phase {
            StreamPhase::Starting { last_sent_at } => {
                let due = last_sent_at
                    .map(|sent_at| now.saturating_sub(sent_at) >= self.resend_interval_ms)
                    .unwrap_or(true);
                if !due {
                    return Vec::new();
                }
                self.phase = StreamPhase::Starting {
                    last_sent_at: Some(now),
                };
                vec![BlobCommand::StartTransfer {
                    transfer_id: self.transfer_id,
                    octet_count: self.chunks.octet_count() as u32,
                    chunk_size: self.chunks.chunk_size() as u16,
                }]
            }
            StreamPhase::Streaming => self
                .chunks
                .chunks_to_send(now)
                .into_iter()
                .filter_map(|chunk_id| {
                    self.chunks
                        .chunk_payload(chunk_id)
                        .map(|payload| BlobCommand::SetChunk {
                            chunk_id,
                            payload: payload.to_vec(),
                        })
                })
                .collect(),
            StreamPhase::Complete => Vec::new(),
        }
    }

    /// Feed a command received from the peer
    pub fn receive(&mut self, command: &BlobCommand) -> Result<()> {
        match (self.phase, command) {
            (StreamPhase::Starting { .. }, BlobCommand::AckStartTransfer { transfer_id })
                if *transfer_id == self.transfer_id =>
            {
                debug!("Blob transfer {} accepted by receiver", self.transfer_id);
                self.phase = if self.chunks.is_complete() {
                    StreamPhase::Complete
                } else {
                    StreamPhase::Streaming
                };
                Ok(())
            }
            (_, BlobCommand::AckStartTransfer { transfer_id }) => {
                debug!(
                    "Ignoring AckStartTransfer {} in transfer {}",
                    transfer_id, self.transfer_id
                );
                Ok(())
            }
            (StreamPhase::Streaming, BlobCommand::AckChunk { base, mask }) => {
                if let crate::AckOutcome::Complete = self.chunks.receive_ack(*base, *mask) {
                    info!("Blob transfer {} complete", self.transfer_id);
                    self.phase = StreamPhase::Complete;
                }
                Ok(())
            }
            (StreamPhase::Complete, BlobCommand::AckChunk { .. }) => Ok(()),
            (phase, other) => Err(Error::UnexpectedCommand {
                phase: phase.describe(),
                command: other.name(),
            }),
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == StreamPhase::Complete
    }

    pub fn transfer_id(&self) -> u16 {
        self.transfer_id
    }

    pub fn chunks(&self) -> &ChunkedBlobSender {
        &self.chunks
    }
}

/// Receiving half of blob transfers
#[derive(Debug, Clone)]
pub struct BlobStreamReceiver {
    transfer: Option<(u16, ChunkedBlobReceiver)>,
    length_policy: ChunkLengthPolicy,
    max_blob_octets: usize,
}

impl Default for BlobStreamReceiver {
    fn default() -> Self {
        Self::new(ChunkLengthPolicy::default())
    }
}

impl BlobStreamReceiver {
    pub fn new(length_policy: ChunkLengthPolicy) -> Self {
        Self {
            transfer: None,
            length_policy,
            max_blob_octets: DEFAULT_MAX_BLOB_OCTETS,
        }
    }

    /// Refuse transfers announcing more than `max_blob_octets`
    pub fn with_max_blob_octets(mut self, max_blob_octets: usize) -> Self {
        self.max_blob_octets = max_blob_octets;
        self
    }

    pub fn max_blob_octets(&self) -> usize {
        self.max_blob_octets
    }

    /// Feed a command from the sender, returning the reply to send back
    ///
    /// Recoverable chunk problems (length mismatch, out-of-range id) are
    /// logged and answered with the current ack so the sender keeps going.
    /// An oversized `StartTransfer` is refused with [`Error::BlobRefused`]
    /// before anything is allocated and is never acknowledged.
    pub fn receive(&mut self, command: &BlobCommand) -> Result<Option<BlobCommand>> {
        match command {
            BlobCommand::StartTransfer {
                transfer_id,
                octet_count,
                chunk_size,
            } => {
                let known = matches!(&self.transfer, Some((id, _)) if id == transfer_id);
                if !known && *octet_count as usize > self.max_blob_octets {
                    return Err(Error::BlobRefused {
                        octet_count: *octet_count as usize,
                        limit: self.max_blob_octets,
                    });
                }
                if !known {
                    info!(
                        "Receiving blob transfer {}: {} octets, chunk size {}",
                        transfer_id, octet_count, chunk_size
                    );
                    let receiver = ChunkedBlobReceiver::new(
                        *octet_count as usize,
                        *chunk_size as usize,
                        self.length_policy,
                    )?;
                    self.transfer = Some((*transfer_id, receiver));
                }
                Ok(Some(BlobCommand::AckStartTransfer {
                    transfer_id: *transfer_id,
                }))
            }
            BlobCommand::SetChunk { chunk_id, payload } => {
                let Some((_, receiver)) = self.transfer.as_mut() else {
                    warn!("Dropping blob chunk {} before any StartTransfer", chunk_id);
                    return Ok(None);
                };
                match receiver.receive_chunk(*chunk_id, payload) {
                    Ok(_) => {}
                    Err(error) if !error.is_fatal() => {
                        warn!("Blob chunk {} not stored: {}", chunk_id, error);
                    }
                    Err(error) => return Err(error),
                }
                let (base, mask) = receiver.ack();
                Ok(Some(BlobCommand::AckChunk { base, mask }))
            }
            other => Err(Error::UnexpectedCommand {
                phase: "receiving",
                command: other.name(),
            }),
        }
    }

    /// Current transfer id, if one has started
    pub fn transfer_id(&self) -> Option<u16> {
        self.transfer.as_ref().map(|(id, _)| *id)
    }

    pub fn is_complete(&self) -> bool {
        self.transfer
            .as_ref()
            .is_some_and(|(_, receiver)| receiver.is_complete())
    }

    /// The reassembled blob once the transfer is complete
    pub fn blob(&self) -> Option<&[u8]> {
        self.transfer.as_ref().and_then(|(_, receiver)| receiver.blob())
    }

    pub fn receiver(&self) -> Option<&ChunkedBlobReceiver> {
        self.transfer.as_ref().map(|(_, receiver)| receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shuttle commands between both halves, dropping every `drop_every`-th chunk
    fn run_transfer(blob: Vec<u8>, drop_every: usize) -> (BlobStreamSender, BlobStreamReceiver) {
        let config = BlobConfig::default();
        let mut sender = BlobStreamSender::new(1, blob, &config).unwrap();
        let mut receiver = BlobStreamReceiver::new(config.length_policy);
        let mut sent = 0usize;

        for step in 0..500u64 {
            let now = step * 50;
            for command in sender.commands(now) {
                sent += 1;
                if drop_every > 0 && sent % drop_every == 0 {
                    continue;
                }
                if let Some(reply) = receiver.receive(&command).unwrap() {
                    sender.receive(&reply).unwrap();
                }
            }
            if sender.is_complete() {
                break;
            }
        }
        (sender, receiver)
    }

    #[test]
    fn test_lossless_transfer() {
        let blob: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
        let (sender, receiver) = run_transfer(blob.clone(), 0);
        assert!(sender.is_complete());
        assert!(receiver.is_complete());
        assert_eq!(receiver.blob().unwrap(), blob.as_slice());
    }

    #[test]
    fn test_lossy_transfer_recovers() {
        let blob: Vec<u8> = (0..20_000u32).map(|i| (i * 31 % 256) as u8).collect();
        let (sender, receiver) = run_transfer(blob.clone(), 3);
        assert!(sender.is_complete());
        assert_eq!(receiver.blob().unwrap(), blob.as_slice());
        assert!(sender.chunks().chunks().iter().any(|chunk| chunk.send_count > 1));
    }

    #[test]
    fn test_start_is_repeated_until_acknowledged() {
        let mut sender = BlobStreamSender::new(4, vec![1; 10], &BlobConfig::default()).unwrap();
        assert_eq!(sender.commands(0).len(), 1);
        assert!(sender.commands(100).is_empty());
        assert_eq!(sender.commands(200).len(), 1);

        sender
            .receive(&BlobCommand::AckStartTransfer { transfer_id: 4 })
            .unwrap();
        assert_eq!(sender.phase(), StreamPhase::Streaming);
        let commands = sender.commands(300);
        assert!(matches!(commands.as_slice(), [BlobCommand::SetChunk { chunk_id: 0, .. }]));
    }

    #[test]
    fn test_chunk_before_start_is_dropped() {
        let mut receiver = BlobStreamReceiver::default();
        let reply = receiver
            .receive(&BlobCommand::SetChunk {
                chunk_id: 0,
                payload: vec![1],
            })
            .unwrap();
        assert!(reply.is_none());
    }

    #[test]
    fn test_oversized_transfer_is_refused() {
        let mut receiver = BlobStreamReceiver::default().with_max_blob_octets(4096);
        let error = receiver
            .receive(&BlobCommand::StartTransfer {
                transfer_id: 9,
                octet_count: u32::MAX,
                chunk_size: 1024,
            })
            .unwrap_err();
        assert_eq!(
            error,
            Error::BlobRefused {
                octet_count: u32::MAX as usize,
                limit: 4096
            }
        );
        assert!(!error.is_fatal());
        assert!(receiver.transfer_id().is_none());
        assert!(receiver.receiver().is_none());

        // a transfer within the limit still starts
        let reply = receiver
            .receive(&BlobCommand::StartTransfer {
                transfer_id: 10,
                octet_count: 4096,
                chunk_size: 1024,
            })
            .unwrap();
        assert_eq!(reply, Some(BlobCommand::AckStartTransfer { transfer_id: 10 }));
        assert_eq!(receiver.transfer_id(), Some(10));
    }

    #[test]
    fn test_default_receiver_limit() {
        let receiver = BlobStreamReceiver::default();
        assert_eq!(receiver.max_blob_octets(), DEFAULT_MAX_BLOB_OCTETS);
    }

    #[test]
    fn test_sender_rejects_chunk_commands() {
        let mut sender = BlobStreamSender::new(1, vec![0; 8], &BlobConfig::default()).unwrap();
        let error = sender
            .receive(&BlobCommand::SetChunk {
                chunk_id: 0,
                payload: vec![],
            })
            .unwrap_err();
        assert!(matches!(error, Error::UnexpectedCommand { .. }));
        assert!(!error.is_fatal());
    }
}
