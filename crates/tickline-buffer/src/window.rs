//! Random-access buffer over a forward-moving window

use crate::{Error, Result};

/// Fixed-size window of optional slots addressed relative to its front
///
/// `discard_front(k)` slides the window forward by `k` slots; the slots that
/// fall off the front are cleared and reappear, empty, at the back.
#[derive(Debug, Clone)]
pub struct SlidingWindowBuffer<T> {
    slots: Vec<Option<T>>,
    /// Slot index of relative position 0
    head: usize,
}

impl<T> SlidingWindowBuffer<T> {
    /// Create a window with `capacity` slots
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
        }
    }

    fn slot_index(&self, relative: usize) -> usize {
        (self.head + relative) % self.slots.len()
    }

    /// Store `value` at `relative`, replacing whatever was there
    pub fn set(&mut self, relative: usize, value: T) -> Result<()> {
        if relative >= self.capacity() {
            return Err(Error::OutOfWindow {
                index: relative,
                capacity: self.capacity(),
            });
        }
        let index = self.slot_index(relative);
        self.slots[index] = Some(value);
        Ok(())
    }

    /// Value at `relative`, `None` if empty or outside the window
    pub fn try_get(&self, relative: usize) -> Option<&T> {
        if relative >= self.capacity() {
            return None;
        }
        self.slots[self.slot_index(relative)].as_ref()
    }

    /// Remove and return the value at `relative`
    pub fn take(&mut self, relative: usize) -> Option<T> {
        if relative >= self.capacity() {
            return None;
        }
        let index = self.slot_index(relative);
        self.slots[index].take()
    }

    pub fn is_set(&self, relative: usize) -> bool {
        self.try_get(relative).is_some()
    }

    /// Slide the window forward by `count` slots
    pub fn discard_front(&mut self, count: usize) {
        let capacity = self.capacity();
        for _ in 0..count.min(capacity) {
            self.slots[self.head] = None;
            self.head = (self.head + 1) % capacity;
        }
        if count > capacity {
            // every slot has been cleared, only the head position matters
            self.head = (self.head + (count - capacity)) % capacity;
        }
    }

    /// Occupancy mask of the first 64 slots (bit `i` = slot `i` is set)
    pub fn bits(&self) -> u64 {
        (0..self.capacity().min(64))
            .filter(|relative| self.is_set(*relative))
            .fold(0u64, |mask, relative| mask | (1u64 << relative))
    }

    /// Number of occupied slots
    pub fn count_set(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
