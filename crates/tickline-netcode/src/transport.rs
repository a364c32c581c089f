//! Transport traits for datagram delivery
//!
//! Tickline never opens sockets. Users implement [`Transport`] for their
//! network stack (UDP, WebRTC data channels, an in-memory loopback); the
//! contract is that of an unordered, lossy datagram service.

use crate::DEFAULT_MAX_DATAGRAM_OCTETS;
use tickline_core::ConnectionId;

/// Connectionless, unreliable datagram transport
pub trait Transport {
    /// Error type for this transport
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send one datagram to `connection`
    ///
    /// Delivery is best effort; datagrams may be dropped, duplicated or
    /// reordered.
    fn send(&mut self, connection: ConnectionId, datagram: &[u8]) -> Result<(), Self::Error>;

    /// Receive one datagram (non-blocking)
    ///
    /// Returns `Ok(None)` if no data is available.
    fn receive(&mut self) -> Result<Option<(ConnectionId, Vec<u8>)>, Self::Error>;

    /// Largest datagram the transport delivers
    fn max_datagram_octets(&self) -> usize {
        DEFAULT_MAX_DATAGRAM_OCTETS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Transport that delivers everything it sends back to itself
    #[derive(Default)]
    struct Echo {
        queue: VecDeque<(ConnectionId, Vec<u8>)>,
    }

    impl Transport for Echo {
        type Error = std::io::Error;

        fn send(&mut self, connection: ConnectionId, datagram: &[u8]) -> Result<(), Self::Error> {
            self.queue.push_back((connection, datagram.to_vec()));
            Ok(())
        }

        fn receive(&mut self) -> Result<Option<(ConnectionId, Vec<u8>)>, Self::Error> {
            Ok(self.queue.pop_front())
        }
    }

    #[test]
    fn test_default_datagram_limit() {
        let mut echo = Echo::default();
        assert_eq!(echo.max_datagram_octets(), 1100);

        echo.send(ConnectionId(3), &[1, 2]).unwrap();
        assert_eq!(echo.receive().unwrap(), Some((ConnectionId(3), vec![1, 2])));
        assert_eq!(echo.receive().unwrap(), None);
    }
}
