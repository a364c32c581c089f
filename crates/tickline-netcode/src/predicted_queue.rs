//! Per-participant queue of predicted steps
//!
//! The queue only ever holds consecutive ticks. It expects the next step at
//! `waiting_for_tick_id`:
//!
//! - a step for an earlier tick is a protocol violation ([`Error::StaleTick`]),
//! - a step for a later tick means steps went missing, so the queue drops
//!   everything and restarts at that step ([`AddOutcome::Reset`]).
//!
//! The producer never waits for a missing step; it synthesises a record
//! instead, so resetting keeps the participant contributing as soon as new
//! input arrives.

use crate::{Error, PredictedStep, Result};
use log::{debug, warn};
use tickline_buffer::RingBuffer;
use tickline_core::TickId;

/// Result of [`PredictedStepQueue::add_predicted_step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Appended after the previous step
    Appended,
    /// A hole was detected; the queue was cleared and restarted at this step
    Reset,
}

impl AddOutcome {
    pub fn was_reset(&self) -> bool {
        matches!(self, AddOutcome::Reset)
    }
}

/// What [`PredictedStepQueue::receive_steps`] did with a datagram's steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiveReport {
    /// Steps appended to the queue
    pub added: usize,
    /// Steps for ticks the queue had already passed (resent by the client)
    pub skipped: usize,
    /// Steps lost because the queue filled up
    pub dropped: usize,
    pub was_reset: bool,
}

/// Bounded FIFO of consecutive predicted steps for one participant
#[derive(Debug, Clone)]
pub struct PredictedStepQueue {
    steps: RingBuffer<PredictedStep>,
    waiting_for_tick_id: TickId,
    reset_count: u32,
}

impl PredictedStepQueue {
    /// Create a queue expecting its first step at `waiting_for_tick_id`
    pub fn new(capacity: usize, waiting_for_tick_id: TickId) -> Self {
        Self {
            steps: RingBuffer::new(capacity),
            waiting_for_tick_id,
            reset_count: 0,
        }
    }

    /// Add the next step
    pub fn add_predicted_step(&mut self, step: PredictedStep) -> Result<AddOutcome> {
        let expected = self.waiting_for_tick_id;
        if step.tick_id.is_before(expected) {
            return Err(Error::StaleTick {
                tick: step.tick_id,
                waiting_for: expected,
            });
        }

        if step.tick_id.is_after(expected) {
            debug!(
                "Predicted step gap: expected {}, got {}; resetting queue",
                expected, step.tick_id
            );
            self.steps.clear();
            self.reset_count += 1;
            self.waiting_for_tick_id = step.tick_id.next();
            self.steps.enqueue(step)?;
            return Ok(AddOutcome::Reset);
        }

        if self.steps.is_full() {
            return Err(Error::QueueFull {
                capacity: self.steps.capacity(),
            });
        }
        self.steps.enqueue(step)?;
        self.waiting_for_tick_id = expected.next();
        Ok(AddOutcome::Appended)
    }

    /// Ingest consecutive payloads starting at `first_tick_id`
    ///
    /// Clients resend every step the host has not yet consumed, so leading
    /// ticks the queue already passed are skipped rather than rejected.
    pub fn receive_steps<I>(&mut self, first_tick_id: TickId, payloads: I) -> Result<ReceiveReport>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut report = ReceiveReport::default();
        let mut tick_id = first_tick_id;
        let mut payloads = payloads.into_iter();

        while let Some(payload) = payloads.next() {
            if tick_id.is_before(self.waiting_for_tick_id) {
                report.skipped += 1;
                tick_id = tick_id.next();
                continue;
            }
            match self.add_predicted_step(PredictedStep::new(tick_id, payload)?) {
                Ok(outcome) => {
                    report.added += 1;
                    report.was_reset |= outcome.was_reset();
                }
                Err(Error::QueueFull { capacity }) => {
                    report.dropped = 1 + payloads.count();
                    warn!(
                        "Predicted step queue full ({} steps), dropping {} steps from {}",
                        capacity, report.dropped, tick_id
                    );
                    break;
                }
                Err(error) => return Err(error),
            }
            tick_id = tick_id.next();
        }
        Ok(report)
    }

    /// Whether a step for `tick_id` is buffered
    pub fn has_step_for_tick_id(&self, tick_id: TickId) -> bool {
        match self.earliest() {
            Some(earliest) => {
                !tick_id.is_before(earliest) && tick_id.is_before(self.waiting_for_tick_id)
            }
            None => false,
        }
    }

    /// Step for `tick_id`, if buffered
    pub fn get(&self, tick_id: TickId) -> Option<&PredictedStep> {
        let earliest = self.earliest()?;
        let offset = earliest.diff_to(tick_id);
        if offset < 0 {
            return None;
        }
        self.steps.get(offset as usize)
    }

    /// Drop every step strictly before `tick_id`
    pub fn discard_up_to_and_excluding(&mut self, tick_id: TickId) -> usize {
        match self.earliest() {
            Some(earliest) => {
                let count = earliest.diff_to(tick_id).max(0) as usize;
                self.steps.discard_front(count)
            }
            None => 0,
        }
    }

    pub fn dequeue(&mut self) -> Option<PredictedStep> {
        self.steps.dequeue()
    }

    /// Tick of the oldest buffered step
    pub fn earliest(&self) -> Option<TickId> {
        self.steps.peek().map(|step| step.tick_id)
    }

    /// Tick of the newest buffered step
    pub fn latest(&self) -> Option<TickId> {
        self.steps.peek_back().map(|step| step.tick_id)
    }

    pub fn waiting_for_tick_id(&self) -> TickId {
        self.waiting_for_tick_id
    }

    /// How often a gap forced the queue to restart
    pub fn reset_count(&self) -> u32 {
        self.reset_count
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.steps.capacity()
    }
}
