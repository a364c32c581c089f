//! Host session driver
//!
//! [`Host`] owns everything the host side of a session needs and is driven
//! from one loop:
//!
//! ```text
//! loop {
//!     for datagram in transport      → host.receive_datagram(connection, octets)
//!     host.tick()                    → compose as many ticks as justified
//!     for connection in connections  → host.outgoing(connection, now) → transport
//! }
//! ```
//!
//! [`Host::service`] runs one iteration of that loop against a [`Transport`].

use crate::{AuthoritativeStepProducer, Error, HostConfig, ParticipantRegistry, Result};
use indexmap::IndexMap;
use log::{debug, info, warn};
use tickline_blob::{BlobCommand, BlobStreamSender};
use tickline_core::{
    write_datagram_header, ConnectionId, GapOutcome, GapStats, Millis, OctetWriter,
    ParticipantId, SequenceCounter, SequenceGapDetector, TickId,
};
use tickline_netcode::protocol::CMD_AUTHORITATIVE_STEPS;
use tickline_netcode::wire::{write_authoritative_batch, PlayerSteps};
use tickline_netcode::{AuthoritativeStepQueue, ClientCommand, HostCommand, Transport};

/// Per-connection protocol state
#[derive(Debug)]
struct ConnectionState {
    gap_detector: SequenceGapDetector,
    sequence: SequenceCounter,
    /// First tick the client is missing, from its last request
    requested_tick_id: Option<TickId>,
    blob: Option<BlobStreamSender>,
    next_transfer_id: u16,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            gap_detector: SequenceGapDetector::new(),
            sequence: SequenceCounter::new(),
            requested_tick_id: None,
            blob: None,
            next_transfer_id: 0,
        }
    }
}

/// Host side of a lockstep session
#[derive(Debug)]
pub struct Host {
    config: HostConfig,
    registry: ParticipantRegistry,
    producer: AuthoritativeStepProducer,
    authoritative: AuthoritativeStepQueue,
    connections: IndexMap<ConnectionId, ConnectionState>,
}

impl Host {
    /// Create a host from a validated configuration
    pub fn new(config: HostConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Host starting at {} (leads {}/{}, window {}, up to {} participants)",
            config.first_tick_id,
            config.composition.compose_when_all_present_lead,
            config.composition.compose_regardless_lead,
            config.authoritative_window,
            config.max_participants()
        );
        Ok(Self {
            registry: ParticipantRegistry::new(config.predicted_queue_capacity)
                .with_max_participants(config.max_participants()),
            producer: AuthoritativeStepProducer::new(config.first_tick_id, config.composition),
            authoritative: AuthoritativeStepQueue::new(
                config.authoritative_window,
                config.first_tick_id,
            ),
            connections: IndexMap::new(),
            config,
        })
    }

    /// Handle one datagram from `connection`
    ///
    /// Datagrams rejected by the gap detector are dropped silently. Decode
    /// errors are returned; [`Error::is_fatal`] tells whether to carry on.
    pub fn receive_datagram(&mut self, connection: ConnectionId, octets: &[u8]) -> Result<()> {
        let (sequence, command) = ClientCommand::from_datagram(octets)?;
        let state = self
            .connections
            .entry(connection)
            .or_insert_with(ConnectionState::new);

        match state.gap_detector.receive(sequence) {
            GapOutcome::Rejected { diff } => {
                debug!(
                    "Dropping {} datagram {} from {} (diff {})",
                    command.name(),
                    sequence,
                    connection,
                    diff
                );
                return Ok(());
            }
            GapOutcome::Accepted { missed } if missed > 0 => {
                debug!("{} datagrams from {} went missing", missed, connection);
            }
            GapOutcome::Accepted { .. } => {}
        }

        match command {
            ClientCommand::PredictedSteps(players) => {
                self.registry.set_waiting_for_reconnect(connection, false);
                for player in players {
                    self.receive_player_steps(connection, player)?;
                }
            }
            ClientCommand::RequestAuthoritativeSteps {
                waiting_for_tick_id,
            } => {
                state.requested_tick_id = Some(waiting_for_tick_id);
            }
            ClientCommand::Blob(command) => Self::receive_blob_command(connection, state, command)?,
        }
        Ok(())
    }

    fn receive_player_steps(
        &mut self,
        connection: ConnectionId,
        player: PlayerSteps,
    ) -> Result<()> {
        let id = self.registry.get_or_create(
            connection,
            player.local_index,
            self.producer.next_tick_id(),
        )?;
        let participant = self
            .registry
            .get_mut(id)
            .ok_or(Error::UnknownParticipant(id))?;
        let report = participant
            .queue_mut()
            .receive_steps(player.first_tick_id, player.payloads)?;
        if report.was_reset {
            info!(
                "{} skipped ahead, queue restarted at {:?}",
                id,
                participant.queue().earliest()
            );
        }
        Ok(())
    }

    fn receive_blob_command(
        connection: ConnectionId,
        state: &mut ConnectionState,
        command: BlobCommand,
    ) -> Result<()> {
        let Some(sender) = state.blob.as_mut() else {
            debug!("Ignoring {} from {}, no transfer", command.name(), connection);
            return Ok(());
        };
        match sender.receive(&command) {
            Ok(()) => Ok(()),
            Err(error) if !error.is_fatal() => {
                warn!("Blob command from {} ignored: {}", connection, error);
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Compose every tick the buffered input justifies
    pub fn tick(&mut self) -> Result<usize> {
        self.producer
            .produce(&mut self.registry, &mut self.authoritative)
    }

    /// Datagrams due to `connection` at `now`
    ///
    /// An AuthoritativeSteps batch from the tick the client last asked for,
    /// size-bounded, followed by any blob stream commands.
    pub fn outgoing(&mut self, connection: ConnectionId, now: Millis) -> Result<Vec<Vec<u8>>> {
        let limit = self.config.max_datagram_octets;
        let Some(state) = self.connections.get_mut(&connection) else {
            return Ok(Vec::new());
        };

        let mut datagrams = Vec::new();
        if let Some(requested) = state.requested_tick_id {
            if let Some(view) = self.authoritative.from_tick(requested) {
                if view.start() != requested {
                    warn!(
                        "{} asked for {} but the oldest buffered step is {}",
                        connection,
                        requested,
                        view.start()
                    );
                }
                let mut writer = OctetWriter::with_capacity(limit);
                write_datagram_header(&mut writer, state.sequence.next_id());
                writer.write_u8(CMD_AUTHORITATIVE_STEPS);
                write_authoritative_batch(&mut writer, view.start(), view, limit)?;
                datagrams.push(writer.into_vec());
            }
        }

        if let Some(sender) = state.blob.as_mut() {
            for command in sender.commands(now) {
                let datagram =
                    HostCommand::Blob(command).to_datagram(state.sequence.next_id())?;
                datagrams.push(datagram);
            }
        }
        Ok(datagrams)
    }

    /// Start streaming `blob` to `connection`, returning the transfer id
    pub fn start_blob_transfer(&mut self, connection: ConnectionId, blob: Vec<u8>) -> Result<u16> {
        let state = self
            .connections
            .entry(connection)
            .or_insert_with(ConnectionState::new);
        if state.blob.as_ref().is_some_and(|sender| !sender.is_complete()) {
            return Err(Error::TransferInProgress(connection));
        }

        let transfer_id = state.next_transfer_id;
        state.blob = Some(BlobStreamSender::new(transfer_id, blob, &self.config.blob)?);
        state.next_transfer_id = transfer_id.wrapping_add(1);
        Ok(transfer_id)
    }

    /// Whether the last blob transfer to `connection` was fully acknowledged
    pub fn is_blob_transfer_complete(&self, connection: ConnectionId) -> bool {
        self.connections
            .get(&connection)
            .and_then(|state| state.blob.as_ref())
            .is_some_and(|sender| sender.is_complete())
    }

    /// Forget `connection` and remove its participants
    pub fn disconnect(&mut self, connection: ConnectionId) -> Vec<ParticipantId> {
        self.connections.shift_remove(&connection);
        let removed = self.registry.remove_connection(connection);
        info!("{} disconnected, {} participants removed", connection, removed.len());
        removed
    }

    /// Keep `connection`'s participants but stop waiting for their input
    ///
    /// Their records become `WaitingForReconnect` until a PredictedSteps
    /// datagram arrives from the connection again.
    pub fn connection_lost(&mut self, connection: ConnectionId) -> usize {
        self.registry.set_waiting_for_reconnect(connection, true)
    }

    /// One loop iteration: drain `transport`, compose, send
    ///
    /// Recoverable datagram errors are logged; fatal ones are returned.
    pub fn service<T: Transport>(&mut self, transport: &mut T, now: Millis) -> Result<usize> {
        while let Some((connection, datagram)) = transport
            .receive()
            .map_err(|error| Error::Transport(error.to_string()))?
        {
            match self.receive_datagram(connection, &datagram) {
                Ok(()) => {}
                Err(error) if !error.is_fatal() => {
                    warn!("Dropping datagram from {}: {}", connection, error);
                }
                Err(error) => return Err(error),
            }
        }

        let produced = self.tick()?;

        let connections: Vec<_> = self.connections.keys().copied().collect();
        for connection in connections {
            for datagram in self.outgoing(connection, now)? {
                transport
                    .send(connection, &datagram)
                    .map_err(|error| Error::Transport(error.to_string()))?;
            }
        }
        Ok(produced)
    }

    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    pub fn authoritative_steps(&self) -> &AuthoritativeStepQueue {
        &self.authoritative
    }

    /// Tick the producer composes next
    pub fn next_tick_id(&self) -> TickId {
        self.producer.next_tick_id()
    }

    pub fn producer(&self) -> &AuthoritativeStepProducer {
        &self.producer
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Connections the host has heard from
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.keys().copied()
    }

    pub fn gap_stats(&self, connection: ConnectionId) -> Option<GapStats> {
        self.connections
            .get(&connection)
            .map(|state| state.gap_detector.stats())
    }
}
