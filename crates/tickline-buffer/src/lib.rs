//! Tickline Buffer - Fixed-capacity containers underlying every tickline queue
//!
//! This crate provides bounded, allocation-free-after-construction buffers
//! optimized for tick-driven networking code.
//!
//! # Features
//!
//! - **[`RingBuffer`]**: strict FIFO with O(1) enqueue/dequeue/peek, indexed
//!   access and bulk front-discard. Enqueueing into a full ring is an error:
//!   capacity has to be sized for the expected jitter.
//! - **[`SlidingWindowBuffer`]**: random access within a window that moves
//!   forward. [`SlidingWindowBuffer::bits`] packs the occupancy of the
//!   first 64 slots into a `u64` received-mask.
//! - **[`BitSet`]**: fixed bit vector for chunk-receipt tracking.
//!
//! # Example
//!
//! ```rust
//! use tickline_buffer::RingBuffer;
//!
//! let mut ring = RingBuffer::new(4);
//! ring.enqueue(10).unwrap();
//! ring.enqueue(11).unwrap();
//! ring.enqueue(12).unwrap();
//!
//! assert_eq!(ring.peek(), Some(&10));
//! assert_eq!(ring.discard_front(2), 2);
//! assert_eq!(ring.dequeue(), Some(12));
//! assert!(ring.is_empty());
//! ```

mod bit_set;
mod error;
mod ring;
mod window;

pub use bit_set::BitSet;
pub use error::{Error, Result};
pub use ring::{BufferStats, RingBuffer, RingIter};
pub use window::SlidingWindowBuffer;
