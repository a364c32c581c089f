//! Receive-thread to simulation-thread datagram handoff
//!
//! All step and blob state is single-threaded. When datagrams are read on a
//! separate thread, raw octets cross over through this bounded
//! single-producer/single-consumer channel; nothing else is shared.

use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use tickline_core::ConnectionId;

type Datagram = (ConnectionId, Vec<u8>);

/// Create a handoff that buffers up to `capacity` datagrams
pub fn datagram_handoff(capacity: usize) -> (HandoffSender, HandoffReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        HandoffSender {
            tx,
            dropped: Arc::clone(&dropped),
        },
        HandoffReceiver { rx, dropped },
    )
}

/// Receive-thread side
#[derive(Debug)]
pub struct HandoffSender {
    tx: SyncSender<Datagram>,
    dropped: Arc<AtomicU64>,
}

impl HandoffSender {
    /// Queue a datagram without blocking
    ///
    /// A full queue drops the datagram and counts it; returns `false` only
    /// once the receiving side is gone.
    pub fn push(&self, connection: ConnectionId, datagram: Vec<u8>) -> bool {
        match self.tx.try_send((connection, datagram)) {
            Ok(()) => true,
            Err(TrySendError::Full((connection, datagram))) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Handoff full, dropping {} octets from {}",
                    datagram.len(),
                    connection
                );
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Simulation-thread side
#[derive(Debug)]
pub struct HandoffReceiver {
    rx: Receiver<Datagram>,
    dropped: Arc<AtomicU64>,
}

impl HandoffReceiver {
    /// Next queued datagram, if any
    pub fn try_receive(&self) -> Option<Datagram> {
        match self.rx.try_recv() {
            Ok(datagram) => Some(datagram),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Everything queued right now
    pub fn drain(&self) -> Vec<Datagram> {
        std::iter::from_fn(|| self.try_receive()).collect()
    }

    /// Datagrams lost to a full queue
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_overflow_drops_and_counts() {
        let (sender, receiver) = datagram_handoff(2);
        for i in 0..5u8 {
            assert!(sender.push(ConnectionId(1), vec![i]));
        }
        assert_eq!(receiver.dropped_count(), 3);

        let received = receiver.drain();
        assert_eq!(received, vec![(ConnectionId(1), vec![0]), (ConnectionId(1), vec![1])]);
        assert!(receiver.try_receive().is_none());
    }

    #[test]
    fn test_across_threads() {
        let (sender, receiver) = datagram_handoff(64);
        let producer = thread::spawn(move || {
            for i in 0..32u8 {
                sender.push(ConnectionId(7), vec![i]);
            }
        });
        producer.join().unwrap();

        let received = receiver.drain();
        assert_eq!(received.len(), 32);
        assert!(received.iter().enumerate().all(|(i, (_, d))| d[0] == i as u8));
    }

    #[test]
    fn test_push_after_receiver_dropped() {
        let (sender, receiver) = datagram_handoff(1);
        drop(receiver);
        assert!(!sender.push(ConnectionId(0), vec![]));
    }
}
