//! Client-side step synchronization
//!
//! A [`StepClient`] keeps every predicted step the host has not confirmed yet
//! and resends all of them in each PredictedSteps datagram, so a lost
//! datagram costs nothing but latency. Confirmation is implicit: once the
//! authoritative step for tick `t` arrives, local steps up to `t` are
//! dropped.
//!
//! Authoritative batches may arrive lost, duplicated or out of order. Steps
//! the client already has are skipped; steps past a hole are parked in a
//! sliding window until the host backfills the hole, which it does because
//! every outgoing call re-sends `RequestAuthoritativeSteps` for the first
//! missing tick.

use crate::protocol::{ClientCommand, HostCommand, CMD_PREDICTED_STEPS};
use crate::wire::{write_player_steps_bounded, AuthoritativeStepsBatch};
use crate::{
    AuthoritativeStepQueue, CombinedAuthoritativeStep, Error, PredictedStep, Result, Transport,
    DEFAULT_MAX_DATAGRAM_OCTETS,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tickline_blob::{BlobStreamReceiver, ChunkLengthPolicy, DEFAULT_MAX_BLOB_OCTETS};
use tickline_buffer::{RingBuffer, SlidingWindowBuffer};
use tickline_core::{
    write_datagram_header, ConnectionId, GapOutcome, GapStats, LocalIndex, OctetWriter,
    SequenceCounter, SequenceGapDetector, TickId,
};

/// Client tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepClientConfig {
    /// Unconfirmed predicted steps kept per local player
    pub outbox_capacity: usize,
    /// Confirmed steps kept until the simulation takes them
    pub authoritative_window: usize,
    /// How far past a missing tick received steps are parked
    pub pending_window: usize,
    pub max_datagram_octets: usize,
    pub blob_length_policy: ChunkLengthPolicy,
    /// Bootstrap blobs announced larger than this are refused
    pub max_blob_octets: usize,
}

impl Default for StepClientConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: 64,
            authoritative_window: crate::DEFAULT_AUTHORITATIVE_WINDOW,
            pending_window: 64,
            max_datagram_octets: DEFAULT_MAX_DATAGRAM_OCTETS,
            blob_length_policy: ChunkLengthPolicy::Reject,
            max_blob_octets: DEFAULT_MAX_BLOB_OCTETS,
        }
    }
}

/// What one incoming datagram did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// Rejected by the sequence gap detector
    Stale,
    /// Authoritative steps ingested
    Steps {
        /// Steps appended to the confirmed timeline
        added: usize,
        /// Steps the client already had
        skipped: usize,
    },
    /// A blob command was handled
    Blob { complete: bool },
}

/// Client half of the step protocol for one host connection
#[derive(Debug)]
pub struct StepClient {
    config: StepClientConfig,
    outbox: BTreeMap<LocalIndex, RingBuffer<PredictedStep>>,
    sequence: SequenceCounter,
    gap_detector: SequenceGapDetector,
    authoritative: AuthoritativeStepQueue,
    pending: SlidingWindowBuffer<CombinedAuthoritativeStep>,
    blob: BlobStreamReceiver,
    blob_replies: Vec<ClientCommand>,
}

impl StepClient {
    /// Create a client whose first authoritative step will be `first_tick_id`
    pub fn new(config: StepClientConfig, first_tick_id: TickId) -> Self {
        Self {
            authoritative: AuthoritativeStepQueue::new(config.authoritative_window, first_tick_id),
            pending: SlidingWindowBuffer::new(config.pending_window),
            blob: blob_receiver(&config),
            outbox: BTreeMap::new(),
            sequence: SequenceCounter::new(),
            gap_detector: SequenceGapDetector::new(),
            blob_replies: Vec::new(),
            config,
        }
    }

    /// Queue a locally predicted step for `local_index`
    ///
    /// Steps of one local player must be consecutive. A full outbox means the
    /// host has stopped confirming; the caller should stop predicting.
    pub fn push_predicted_step(
        &mut self,
        local_index: LocalIndex,
        step: PredictedStep,
    ) -> Result<()> {
        let capacity = self.config.outbox_capacity;
        let outbox = self
            .outbox
            .entry(local_index)
            .or_insert_with(|| RingBuffer::new(capacity));

        if let Some(last) = outbox.peek_back() {
            let expected = last.tick_id.next();
            if step.tick_id != expected {
                return Err(Error::TickDiscontinuity {
                    expected,
                    actual: step.tick_id,
                });
            }
        }
        if outbox.is_full() {
            return Err(Error::QueueFull { capacity });
        }
        outbox.enqueue(step)?;
        Ok(())
    }

    /// Handle one datagram from the host
    pub fn receive_datagram(&mut self, octets: &[u8]) -> Result<ClientEvent> {
        let (sequence, command) = HostCommand::from_datagram(octets)?;
        if let GapOutcome::Rejected { diff } = self.gap_detector.receive(sequence) {
            debug!("Dropping host datagram {} (diff {})", sequence, diff);
            return Ok(ClientEvent::Stale);
        }

        match command {
            HostCommand::AuthoritativeSteps(batch) => self.receive_steps(batch),
            HostCommand::Blob(command) => {
                match self.blob.receive(&command) {
                    Ok(Some(reply)) => self.blob_replies.push(ClientCommand::Blob(reply)),
                    Ok(None) => {}
                    Err(error) if !error.is_fatal() => {
                        warn!("Ignoring blob command {}: {}", command.name(), error);
                    }
                    Err(error) => return Err(error.into()),
                }
                Ok(ClientEvent::Blob {
                    complete: self.blob.is_complete(),
                })
            }
        }
    }

    fn receive_steps(&mut self, batch: AuthoritativeStepsBatch) -> Result<ClientEvent> {
        let waiting = self.authoritative.waiting_for_tick_id();
        let mut skipped = 0;
        for step in batch.steps {
            let ahead = waiting.diff_to(step.tick_id);
            if ahead < 0 {
                skipped += 1;
                continue;
            }
            let ahead = ahead as usize;
            if ahead >= self.pending.capacity() {
                debug!(
                    "Authoritative step {} too far past {}, dropped",
                    step.tick_id, waiting
                );
                continue;
            }
            self.pending.set(ahead, step)?;
        }

        let mut added = 0;
        while let Some(step) = self.pending.take(0) {
            self.pending.discard_front(1);
            self.authoritative.add(step)?;
            added += 1;
        }
        if self.pending.count_set() > 0 {
            debug!(
                "Holding {} authoritative steps until {} arrives (mask {:#018x})",
                self.pending.count_set(),
                self.authoritative.waiting_for_tick_id(),
                self.held_steps_mask()
            );
        }

        if added > 0 {
            self.confirm_predicted_steps();
        }
        Ok(ClientEvent::Steps { added, skipped })
    }

    /// Drop local steps the host has composed already
    fn confirm_predicted_steps(&mut self) {
        let waiting = self.authoritative.waiting_for_tick_id();
        for outbox in self.outbox.values_mut() {
            if let Some(earliest) = outbox.peek() {
                let confirmed = earliest.tick_id.diff_to(waiting).max(0) as usize;
                outbox.discard_front(confirmed);
            }
        }
    }

    /// Datagrams to send to the host now
    ///
    /// Always includes a RequestAuthoritativeSteps for the first missing
    /// tick, plus a PredictedSteps datagram when steps are unconfirmed and
    /// any queued blob replies.
    pub fn outgoing(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut datagrams = Vec::new();
        if let Some(datagram) = self.predicted_steps_datagram()? {
            datagrams.push(datagram);
        }

        let request = ClientCommand::RequestAuthoritativeSteps {
            waiting_for_tick_id: self.authoritative.waiting_for_tick_id(),
        };
        datagrams.push(request.to_datagram(self.sequence.next_id())?);

        for reply in std::mem::take(&mut self.blob_replies) {
            datagrams.push(reply.to_datagram(self.sequence.next_id())?);
        }
        Ok(datagrams)
    }

    fn predicted_steps_datagram(&mut self) -> Result<Option<Vec<u8>>> {
        if self.outbox.values().all(|outbox| outbox.is_empty()) {
            return Ok(None);
        }

        let limit = self.config.max_datagram_octets;
        let mut writer = OctetWriter::with_capacity(limit);
        write_datagram_header(&mut writer, self.sequence.next_id());
        writer.write_u8(CMD_PREDICTED_STEPS);
        let count_at = writer.position();
        writer.write_u8(0);

        let mut players = 0u8;
        for (local_index, outbox) in &self.outbox {
            if players == u8::MAX {
                break;
            }
            if write_player_steps_bounded(&mut writer, *local_index, outbox.iter(), limit)? > 0 {
                players += 1;
            }
        }
        if players == 0 {
            return Err(Error::DatagramLimit {
                needed: writer.len() + 8,
                limit,
            });
        }
        writer.patch_u8(count_at, players);
        Ok(Some(writer.into_vec()))
    }

    /// Drain `transport`, then send everything due to `host`
    pub fn service<T: Transport>(&mut self, transport: &mut T, host: ConnectionId) -> Result<()> {
        while let Some((from, datagram)) = transport
            .receive()
            .map_err(|error| Error::Transport(error.to_string()))?
        {
            if from != host {
                debug!("Ignoring datagram from unknown {}", from);
                continue;
            }
            match self.receive_datagram(&datagram) {
                Ok(_) => {}
                Err(error) if !error.is_fatal() => warn!("Dropping host datagram: {}", error),
                Err(error) => return Err(error),
            }
        }
        for datagram in self.outgoing()? {
            transport
                .send(host, &datagram)
                .map_err(|error| Error::Transport(error.to_string()))?;
        }
        Ok(())
    }

    /// Take the oldest confirmed step for simulation
    pub fn pop_authoritative_step(&mut self) -> Option<CombinedAuthoritativeStep> {
        self.authoritative.dequeue()
    }

    pub fn authoritative_steps(&self) -> &AuthoritativeStepQueue {
        &self.authoritative
    }

    /// First tick the client has not received yet
    pub fn waiting_for_tick_id(&self) -> TickId {
        self.authoritative.waiting_for_tick_id()
    }

    /// Steps parked behind a missing tick
    ///
    /// Bit `i` is set when the step `waiting_for_tick_id + i` has arrived.
    /// Bit 0 is always clear since that step would have been taken.
    pub fn held_steps_mask(&self) -> u64 {
        self.pending.bits()
    }

    /// Unconfirmed steps of one local player
    pub fn unconfirmed_steps(&self, local_index: LocalIndex) -> usize {
        self.outbox.get(&local_index).map_or(0, |outbox| outbox.len())
    }

    /// State bootstrap transfer
    pub fn blob(&self) -> &BlobStreamReceiver {
        &self.blob
    }

    /// Take the bootstrap blob once it is complete
    pub fn take_blob(&mut self) -> Option<Vec<u8>> {
        let blob = self.blob.blob()?.to_vec();
        info!("Bootstrap blob of {} octets received", blob.len());
        self.blob = blob_receiver(&self.config);
        Some(blob)
    }

    pub fn gap_stats(&self) -> GapStats {
        self.gap_detector.stats()
    }

    pub fn config(&self) -> &StepClientConfig {
        &self.config
    }
}

fn blob_receiver(config: &StepClientConfig) -> BlobStreamReceiver {
    BlobStreamReceiver::new(config.blob_length_policy).with_max_blob_octets(config.max_blob_octets)
}
