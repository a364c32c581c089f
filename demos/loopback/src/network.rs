//! Simulated datagram network with latency, jitter and loss
//!
//! Every endpoint shares one [`SimulatedNetwork`]. Datagrams are scheduled
//! on a min-heap keyed by delivery time; jitter reorders them. All
//! randomness comes from a seeded ChaCha8 RNG, so a run is reproducible.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};
use std::convert::Infallible;
use tickline_core::{ConnectionId, Millis};
use tickline_netcode::Transport;

/// Link impairments
#[derive(Debug, Clone, Copy)]
pub struct LinkConfig {
    pub base_latency_ms: Millis,
    /// Uniform extra delay in `[0, jitter_ms]`
    pub jitter_ms: Millis,
    /// Drop probability in `[0.0, 1.0]`
    pub loss_rate: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkStats {
    pub sent: u64,
    pub dropped: u64,
    pub delivered: u64,
}

#[derive(Debug)]
struct Scheduled {
    deliver_at: Millis,
    order: u64,
    from: ConnectionId,
    to: ConnectionId,
    datagram: Vec<u8>,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        (self.deliver_at, self.order) == (other.deliver_at, other.order)
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // reversed: earliest delivery on top of the heap
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (other.deliver_at, other.order).cmp(&(self.deliver_at, self.order))
    }
}

pub struct SimulatedNetwork {
    config: LinkConfig,
    rng: ChaCha8Rng,
    in_flight: BinaryHeap<Scheduled>,
    inboxes: BTreeMap<ConnectionId, VecDeque<(ConnectionId, Vec<u8>)>>,
    now: Millis,
    next_order: u64,
    stats: NetworkStats,
}

impl SimulatedNetwork {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            in_flight: BinaryHeap::new(),
            inboxes: BTreeMap::new(),
            now: 0,
            next_order: 0,
            stats: NetworkStats::default(),
        }
    }

    fn send(&mut self, from: ConnectionId, to: ConnectionId, datagram: &[u8]) {
        self.stats.sent += 1;
        if self.config.loss_rate > 0.0 && self.rng.gen::<f64>() < self.config.loss_rate {
            self.stats.dropped += 1;
            return;
        }

        let jitter = if self.config.jitter_ms > 0 {
            self.rng.gen_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        self.in_flight.push(Scheduled {
            deliver_at: self.now + self.config.base_latency_ms + jitter,
            order: self.next_order,
            from,
            to,
            datagram: datagram.to_vec(),
        });
        self.next_order += 1;
    }

    /// Move the clock to `now` and deliver everything due
    pub fn advance_to(&mut self, now: Millis) {
        self.now = now;
        while self
            .in_flight
            .peek()
            .is_some_and(|scheduled| scheduled.deliver_at <= now)
        {
            let Some(scheduled) = self.in_flight.pop() else {
                break;
            };
            self.stats.delivered += 1;
            self.inboxes
                .entry(scheduled.to)
                .or_default()
                .push_back((scheduled.from, scheduled.datagram));
        }
    }

    /// Transport view for the endpoint `local`
    pub fn endpoint(&mut self, local: ConnectionId) -> Endpoint<'_> {
        Endpoint {
            network: self,
            local,
        }
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats
    }
}

pub struct Endpoint<'a> {
    network: &'a mut SimulatedNetwork,
    local: ConnectionId,
}

impl Transport for Endpoint<'_> {
    type Error = Infallible;

    fn send(&mut self, connection: ConnectionId, datagram: &[u8]) -> Result<(), Self::Error> {
        self.network.send(self.local, connection, datagram);
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<(ConnectionId, Vec<u8>)>, Self::Error> {
        Ok(self
            .network
            .inboxes
            .get_mut(&self.local)
            .and_then(|inbox| inbox.pop_front()))
    }
}
