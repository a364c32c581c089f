//! Tickline Blob - Reliable bulk transfer over an unreliable datagram transport
//!
//! Used to bootstrap a joining client with the full simulation state. The blob
//! is cut into fixed-size chunks (at most 1024 octets, the last one holds the
//! remainder); each chunk fits into one datagram together with its header.
//!
//! ```text
//!  sender                                   receiver
//!  ──────                                   ────────
//!  StartTransfer{id, octets, chunk_size} ─▶ allocate assembly buffer
//!                                       ◀─ AckStartTransfer{id}
//!  SetChunk{chunk_id, payload}  (≤4/call)─▶ write at chunk_id × chunk_size
//!                                       ◀─ AckChunk{base, mask}
//!  mark < base received, overlay mask       base = first missing chunk
//!  complete when base == chunk count        mask = next 64 chunks
//! ```
//!
//! Chunks are (re)sent in index order, at most `max_chunks_per_call` per call,
//! skipping chunks sent within the last `resend_interval_ms`. Time is always
//! passed in by the caller; nothing here schedules callbacks.

mod config;
mod error;
mod receiver;
mod sender;
mod stream;
pub mod wire;

pub use config::{BlobConfig, ChunkLengthPolicy};
pub use error::{Error, Result};
pub use receiver::{ChunkReceipt, ChunkedBlobReceiver};
pub use sender::{AckOutcome, ChunkEntry, ChunkedBlobSender};
pub use stream::{BlobStreamReceiver, BlobStreamSender, StreamPhase};
pub use wire::BlobCommand;

/// Largest chunk a transfer may use
pub const MAX_CHUNK_SIZE: usize = 1024;

/// Largest blob a receiver accepts unless configured otherwise
pub const DEFAULT_MAX_BLOB_OCTETS: usize = 16 * 1024 * 1024;

/// Width of the ack bitmask in chunks
pub const ACK_MASK_BITS: usize = 64;

/// Number of chunks needed for `octet_count` octets
pub fn chunk_count_for(octet_count: usize, chunk_size: usize) -> usize {
    octet_count.div_ceil(chunk_size)
}
