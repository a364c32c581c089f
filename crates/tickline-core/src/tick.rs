//! Wrapping logical clock for simulation steps
//!
//! A `TickId` names one discrete simulation step. It is a `u32` on the wire
//! and wraps, so ordering is always expressed through the signed wrapping
//! distance rather than a plain integer comparison.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one simulation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickId(pub u32);

impl TickId {
    /// Create a new tick ID
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw tick value
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// The tick that follows this one
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// The tick that precedes this one
    pub fn previous(&self) -> Self {
        Self(self.0.wrapping_sub(1))
    }

    /// Move `count` ticks forward
    pub fn advanced_by(&self, count: u32) -> Self {
        Self(self.0.wrapping_add(count))
    }

    /// Signed distance from `self` to `later` (`later - self`)
    ///
    /// Positive when `later` is ahead of `self`. Correct across the `u32`
    /// wrap as long as the two ticks are less than `2^31` apart.
    pub fn diff_to(&self, later: TickId) -> i32 {
        later.0.wrapping_sub(self.0) as i32
    }

    /// Whether `self` comes strictly before `other`
    pub fn is_before(&self, other: TickId) -> bool {
        self.diff_to(other) > 0
    }

    /// Whether `self` comes strictly after `other`
    pub fn is_after(&self, other: TickId) -> bool {
        other.is_before(*self)
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick:{}", self.0)
    }
}

/// Inclusive range of consecutive ticks `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRange {
    pub start: TickId,
    pub end: TickId,
}

impl TickRange {
    /// Create a range; `end` must not be before `start`
    pub fn new(start: TickId, end: TickId) -> Self {
        debug_assert!(!end.is_before(start), "range end {end} before start {start}");
        Self { start, end }
    }

    /// Range starting at `start` covering `count` ticks (`count >= 1`)
    pub fn from_count(start: TickId, count: u32) -> Self {
        Self::new(start, start.advanced_by(count.saturating_sub(1)))
    }

    /// Number of ticks in the range
    pub fn len(&self) -> usize {
        self.start.diff_to(self.end) as usize + 1
    }

    /// Ranges always hold at least one tick
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `tick` lies inside the range
    pub fn contains(&self, tick: TickId) -> bool {
        !tick.is_before(self.start) && !tick.is_after(self.end)
    }

    /// Intersection with `other`, `None` if they do not overlap
    pub fn clamp_to(&self, other: TickRange) -> Option<TickRange> {
        let start = if self.start.is_before(other.start) {
            other.start
        } else {
            self.start
        };
        let end = if self.end.is_after(other.end) {
            other.end
        } else {
            self.end
        };
        if end.is_before(start) {
            None
        } else {
            Some(TickRange { start, end })
        }
    }
}

impl fmt::Display for TickRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} ..= {}]", self.start.0, self.end.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_wraps() {
        assert_eq!(TickId(u32::MAX).next(), TickId(0));
        assert_eq!(TickId(0).previous(), TickId(u32::MAX));
    }

    #[test]
    fn test_ordering_across_wrap() {
        let late = TickId(u32::MAX - 1);
        let wrapped = late.advanced_by(4);
        assert_eq!(wrapped, TickId(2));
        assert_eq!(late.diff_to(wrapped), 4);
        assert!(late.is_before(wrapped));
        assert!(wrapped.is_after(late));
        assert!(!late.is_before(late));
    }

    #[test]
    fn test_range_len_and_contains() {
        let range = TickRange::new(TickId(10), TickId(14));
        assert_eq!(range.len(), 5);
        assert!(range.contains(TickId(10)));
        assert!(range.contains(TickId(14)));
        assert!(!range.contains(TickId(15)));
        assert!(!range.contains(TickId(9)));
        assert_eq!(TickRange::from_count(TickId(3), 1).len(), 1);
    }

    #[test]
    fn test_range_clamp() {
        let available = TickRange::new(TickId(20), TickId(40));
        let request = TickRange::new(TickId(10), TickId(25));
        assert_eq!(
            request.clamp_to(available),
            Some(TickRange::new(TickId(20), TickId(25)))
        );

        let disjoint = TickRange::new(TickId(41), TickId(50));
        assert_eq!(disjoint.clamp_to(available), None);
    }
}
