//! Sliding window of composed authoritative steps
//!
//! On the host this is the history clients catch up from; on a client it is
//! the confirmed timeline waiting to be simulated. Either way ticks arrive
//! strictly one after another.

use crate::{CombinedAuthoritativeStep, Error, Result};
use log::trace;
use tickline_buffer::{RingBuffer, RingIter};
use tickline_core::{TickId, TickRange};

/// Default number of composed ticks kept for catch-up
pub const DEFAULT_AUTHORITATIVE_WINDOW: usize = 60;

/// Bounded window of consecutive [`CombinedAuthoritativeStep`]s
#[derive(Debug, Clone)]
pub struct AuthoritativeStepQueue {
    steps: RingBuffer<CombinedAuthoritativeStep>,
    waiting_for_tick_id: TickId,
}

impl AuthoritativeStepQueue {
    /// Create a queue whose first step must be `first_tick_id`
    pub fn new(capacity: usize, first_tick_id: TickId) -> Self {
        Self {
            steps: RingBuffer::new(capacity),
            waiting_for_tick_id: first_tick_id,
        }
    }

    /// Append the next step, evicting the oldest one if the window is full
    ///
    /// Fails with [`Error::TickDiscontinuity`] unless the step is exactly the
    /// tick the queue is waiting for.
    pub fn add(&mut self, step: CombinedAuthoritativeStep) -> Result<()> {
        if step.tick_id != self.waiting_for_tick_id {
            return Err(Error::TickDiscontinuity {
                expected: self.waiting_for_tick_id,
                actual: step.tick_id,
            });
        }
        if self.steps.is_full() {
            if let Some(evicted) = self.steps.dequeue() {
                trace!("Evicting authoritative step {}", evicted.tick_id);
            }
        }
        let next = step.tick_id.next();
        self.steps.enqueue(step)?;
        self.waiting_for_tick_id = next;
        Ok(())
    }

    /// `[oldest, newest]` buffered ticks
    pub fn range(&self) -> Option<TickRange> {
        let oldest = self.steps.peek()?.tick_id;
        let newest = self.steps.peek_back()?.tick_id;
        Some(TickRange::new(oldest, newest))
    }

    /// Borrowed view of the buffered part of `request`
    ///
    /// Returns `None` when nothing in `request` is buffered.
    pub fn from_range(&self, request: TickRange) -> Option<AuthoritativeStepView<'_>> {
        let available = self.range()?;
        let range = request.clamp_to(available)?;
        let offset = available.start.diff_to(range.start) as usize;
        Some(AuthoritativeStepView {
            range,
            steps: self.steps.iter_range(offset, range.len()),
        })
    }

    /// Everything buffered from `tick_id` on
    pub fn from_tick(&self, tick_id: TickId) -> Option<AuthoritativeStepView<'_>> {
        let newest = self.steps.peek_back()?.tick_id;
        if tick_id.is_after(newest) {
            return None;
        }
        self.from_range(TickRange::new(tick_id, newest))
    }

    pub fn get(&self, tick_id: TickId) -> Option<&CombinedAuthoritativeStep> {
        let oldest = self.steps.peek()?.tick_id;
        let offset = oldest.diff_to(tick_id);
        if offset < 0 {
            return None;
        }
        self.steps.get(offset as usize)
    }

    /// Remove and return the oldest step
    pub fn dequeue(&mut self) -> Option<CombinedAuthoritativeStep> {
        self.steps.dequeue()
    }

    /// Drop every step strictly before `tick_id`
    pub fn discard_up_to_and_excluding(&mut self, tick_id: TickId) -> usize {
        match self.steps.peek() {
            Some(oldest) => {
                let count = oldest.tick_id.diff_to(tick_id).max(0) as usize;
                self.steps.discard_front(count)
            }
            None => 0,
        }
    }

    /// Tick the next [`Self::add`] must carry
    pub fn waiting_for_tick_id(&self) -> TickId {
        self.waiting_for_tick_id
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

/// Lazy, non-copying view over consecutive buffered steps
#[derive(Debug, Clone)]
pub struct AuthoritativeStepView<'a> {
    range: TickRange,
    steps: RingIter<'a, CombinedAuthoritativeStep>,
}

impl<'a> AuthoritativeStepView<'a> {
    /// Ticks covered by the view
    pub fn range(&self) -> TickRange {
        self.range
    }

    pub fn start(&self) -> TickId {
        self.range.start
    }
}

impl<'a> Iterator for AuthoritativeStepView<'a> {
    type Item = &'a CombinedAuthoritativeStep;

    fn next(&mut self) -> Option<Self::Item> {
        self.steps.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.steps.size_hint()
    }
}

impl ExactSizeIterator for AuthoritativeStepView<'_> {}
