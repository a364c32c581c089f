//! Fixed-capacity FIFO ring

use crate::{Error, Result};

/// A bounded FIFO queue backed by a ring of slots
///
/// Entries are addressed oldest-first: index 0 is the front (next to be
/// dequeued), index `len() - 1` the back.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Ring storage; `None` means the slot is free
    slots: Vec<Option<T>>,
    /// Slot index of the front entry
    head: usize,
    /// Number of entries currently stored
    count: usize,
}

impl<T> RingBuffer<T> {
    /// Create a new ring with the given capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            count: 0,
        }
    }

    fn slot_index(&self, index: usize) -> usize {
        (self.head + index) % self.slots.len()
    }

    /// Append an entry at the back
    ///
    /// Returns [`Error::Full`] if no slot is free; the entry is dropped.
    pub fn enqueue(&mut self, item: T) -> Result<()> {
        if self.is_full() {
            return Err(Error::Full {
                capacity: self.capacity(),
            });
        }
        let index = self.slot_index(self.count);
        self.slots[index] = Some(item);
        self.count += 1;
        Ok(())
    }

    /// Remove and return the front entry
    pub fn dequeue(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.count -= 1;
        item
    }

    /// Front entry without removing it
    pub fn peek(&self) -> Option<&T> {
        self.get(0)
    }

    /// Back (most recently enqueued) entry
    pub fn peek_back(&self) -> Option<&T> {
        self.count.checked_sub(1).and_then(|last| self.get(last))
    }

    /// Entry at `index` counted from the front
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.count {
            return None;
        }
        self.slots[self.slot_index(index)].as_ref()
    }

    /// Drop up to `count` entries from the front, returning how many went
    pub fn discard_front(&mut self, count: usize) -> usize {
        let discard = count.min(self.count);
        for _ in 0..discard {
            self.slots[self.head] = None;
            self.head = (self.head + 1) % self.slots.len();
        }
        self.count -= discard;
        discard
    }

    /// Iterate over all entries, oldest first
    pub fn iter(&self) -> RingIter<'_, T> {
        RingIter {
            ring: self,
            next: 0,
            end: self.count,
        }
    }

    /// Iterate over `count` entries starting at `start` (clipped to the stored entries)
    pub fn iter_range(&self, start: usize, count: usize) -> RingIter<'_, T> {
        let next = start.min(self.count);
        let end = start.saturating_add(count).min(self.count);
        RingIter {
            ring: self,
            next,
            end,
        }
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.count = 0;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Get statistics about the ring
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            capacity: self.capacity(),
            count: self.count,
        }
    }
}

/// Borrowing, non-copying iterator over a [`RingBuffer`] range
#[derive(Debug)]
pub struct RingIter<'a, T> {
    ring: &'a RingBuffer<T>,
    next: usize,
    end: usize,
}

impl<'a, T> Iterator for RingIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let item = self.ring.get(self.next);
        self.next += 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for RingIter<'_, T> {}

impl<T> Clone for RingIter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            ring: self.ring,
            next: self.next,
            end: self.end,
        }
    }
}

/// Statistics about a ring buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    /// Maximum capacity
    pub capacity: usize,
    /// Current number of stored entries
    pub count: usize,
}

impl BufferStats {
    /// Get the fill percentage (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f32 {
        self.count as f32 / self.capacity as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let ring: RingBuffer<u32> = RingBuffer::new(8);
        assert_eq!(ring.capacity(), 8);
        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());
        assert!(ring.peek().is_none());
    }

    #[test]
    fn test_fifo_order() {
        let mut ring = RingBuffer::new(4);
        ring.enqueue("a").unwrap();
        ring.enqueue("b").unwrap();
        ring.enqueue("c").unwrap();

        assert_eq!(ring.peek(), Some(&"a"));
        assert_eq!(ring.peek_back(), Some(&"c"));
        assert_eq!(ring.dequeue(), Some("a"));
        assert_eq!(ring.dequeue(), Some("b"));
        assert_eq!(ring.dequeue(), Some("c"));
        assert_eq!(ring.dequeue(), None);
    }

    #[test]
    fn test_enqueue_when_full() {
        let mut ring = RingBuffer::new(2);
        ring.enqueue(1).unwrap();
        ring.enqueue(2).unwrap();
        assert!(ring.is_full());
        assert_eq!(ring.enqueue(3), Err(Error::Full { capacity: 2 }));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_wraps_around() {
        let mut ring = RingBuffer::new(3);
        for value in 0..3 {
            ring.enqueue(value).unwrap();
        }
        ring.dequeue();
        ring.dequeue();
        ring.enqueue(3).unwrap();
        ring.enqueue(4).unwrap();

        let values: Vec<_> = ring.iter().copied().collect();
        assert_eq!(values, vec![2, 3, 4]);
        assert_eq!(ring.get(2), Some(&4));
        assert_eq!(ring.get(3), None);
    }

    #[test]
    fn test_discard_front() {
        let mut ring = RingBuffer::new(8);
        for value in 0..5 {
            ring.enqueue(value).unwrap();
        }
        assert_eq!(ring.discard_front(3), 3);
        assert_eq!(ring.peek(), Some(&3));
        assert_eq!(ring.discard_front(10), 2);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_iter_range_clips() {
        let mut ring = RingBuffer::new(8);
        for value in 10..16 {
            ring.enqueue(value).unwrap();
        }
        let middle: Vec<_> = ring.iter_range(2, 3).copied().collect();
        assert_eq!(middle, vec![12, 13, 14]);

        let tail = ring.iter_range(4, 100);
        assert_eq!(tail.len(), 2);
        assert_eq!(ring.iter_range(9, 2).count(), 0);
    }

    #[test]
    fn test_clear_and_stats() {
        let mut ring = RingBuffer::new(4);
        ring.enqueue(1).unwrap();
        ring.enqueue(2).unwrap();
        let stats = ring.stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.fill_ratio(), 0.5);

        ring.clear();
        assert!(ring.is_empty());
        ring.enqueue(7).unwrap();
        assert_eq!(ring.peek(), Some(&7));
    }
}
