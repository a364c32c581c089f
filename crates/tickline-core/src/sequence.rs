//! Ordered-datagram sequence ids and gap detection
//!
//! Every datagram carries a 16-bit wrapping sequence id. The receiver keeps
//! the last accepted id and accepts a new one only when it is a valid
//! successor, i.e. the forward distance lies in `[1, 32767]`:
//!
//! ```text
//! diff = (next - last) mod 65536
//! diff == 0              duplicate        -> reject
//! 1 <= diff <= 32767     successor        -> accept, diff - 1 datagrams missed
//! diff >= 32768          stale/reordered  -> reject
//! ```

use crate::{OctetReader, OctetWriter, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest forward distance still treated as "newer"
pub const MAX_FORWARD_DIFF: u16 = 32767;

/// 16-bit wrapping datagram counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(pub u16);

impl SequenceId {
    /// Create a new sequence ID
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the raw value
    pub fn raw(&self) -> u16 {
        self.0
    }

    /// The id that follows this one
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Forward distance from `self` to `next`, computed mod 65536
    ///
    /// The result is unsigned and therefore never negative.
    pub fn forward_diff(&self, next: SequenceId) -> u16 {
        next.0.wrapping_sub(self.0)
    }

    /// Whether `next` may be accepted after `self`
    pub fn is_valid_successor(&self, next: SequenceId) -> bool {
        let diff = self.forward_diff(next);
        (1..=MAX_FORWARD_DIFF).contains(&diff)
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// Result of feeding one sequence id to a [`SequenceGapDetector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapOutcome {
    /// The datagram is newer than the last accepted one
    Accepted {
        /// Datagrams skipped since the previously accepted one
        missed: u16,
    },
    /// Duplicate, stale or reordered datagram
    Rejected {
        /// Forward distance that caused the rejection (0 or >= 32768)
        diff: u16,
    },
}

impl GapOutcome {
    /// Whether the datagram should be processed
    pub fn is_accepted(&self) -> bool {
        matches!(self, GapOutcome::Accepted { .. })
    }
}

/// Running counters kept by a [`SequenceGapDetector`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GapStats {
    pub accepted: u64,
    pub rejected: u64,
    pub missed: u64,
}

/// Receive-side ordering filter for one datagram stream
#[derive(Debug, Clone, Default)]
pub struct SequenceGapDetector {
    last_accepted: Option<SequenceId>,
    stats: GapStats,
}

impl SequenceGapDetector {
    /// Create a detector that has not seen any datagram yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a freshly read sequence id
    ///
    /// The very first id is always accepted.
    pub fn receive(&mut self, id: SequenceId) -> GapOutcome {
        let outcome = match self.last_accepted {
            None => GapOutcome::Accepted { missed: 0 },
            Some(last) => {
                let diff = last.forward_diff(id);
                if last.is_valid_successor(id) {
                    GapOutcome::Accepted { missed: diff - 1 }
                } else {
                    GapOutcome::Rejected { diff }
                }
            }
        };

        match outcome {
            GapOutcome::Accepted { missed } => {
                self.last_accepted = Some(id);
                self.stats.accepted += 1;
                self.stats.missed += u64::from(missed);
            }
            GapOutcome::Rejected { .. } => self.stats.rejected += 1,
        }
        outcome
    }

    /// Last accepted sequence id, if any
    pub fn last_accepted(&self) -> Option<SequenceId> {
        self.last_accepted
    }

    /// Counters since creation
    pub fn stats(&self) -> GapStats {
        self.stats
    }
}

/// Send-side counter stamping outgoing datagrams
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    next: SequenceId,
}

impl SequenceCounter {
    /// Counter starting at sequence id 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter starting at an arbitrary id
    pub fn starting_at(id: SequenceId) -> Self {
        Self { next: id }
    }

    /// Hand out the next id
    pub fn next_id(&mut self) -> SequenceId {
        let id = self.next;
        self.next = self.next.next();
        id
    }
}

/// Write the `u16` ordered-datagram header
pub fn write_datagram_header(writer: &mut OctetWriter, id: SequenceId) {
    writer.write_u16(id.0);
}

/// Read the `u16` ordered-datagram header
pub fn read_datagram_header(reader: &mut OctetReader<'_>) -> Result<SequenceId> {
    reader.read_u16().map(SequenceId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_datagram_accepted() {
        let mut detector = SequenceGapDetector::new();
        assert_eq!(
            detector.receive(SequenceId(9000)),
            GapOutcome::Accepted { missed: 0 }
        );
        assert_eq!(detector.last_accepted(), Some(SequenceId(9000)));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut detector = SequenceGapDetector::new();
        detector.receive(SequenceId(5));
        assert_eq!(detector.receive(SequenceId(5)), GapOutcome::Rejected { diff: 0 });
        assert_eq!(detector.stats().rejected, 1);
    }

    #[test]
    fn test_missed_count() {
        let mut detector = SequenceGapDetector::new();
        detector.receive(SequenceId(10));
        assert_eq!(
            detector.receive(SequenceId(14)),
            GapOutcome::Accepted { missed: 3 }
        );
        assert_eq!(detector.stats().missed, 3);
    }

    #[test]
    fn test_reordered_rejected() {
        let mut detector = SequenceGapDetector::new();
        detector.receive(SequenceId(10));
        detector.receive(SequenceId(12));
        assert!(!detector.receive(SequenceId(11)).is_accepted());
        assert_eq!(detector.last_accepted(), Some(SequenceId(12)));
    }

    #[test]
    fn test_accepts_across_wrap() {
        let mut detector = SequenceGapDetector::new();
        detector.receive(SequenceId(u16::MAX));
        assert_eq!(
            detector.receive(SequenceId(1)),
            GapOutcome::Accepted { missed: 1 }
        );
    }

    #[test]
    fn test_boundary_diffs() {
        let base = SequenceId(100);
        assert!(base.is_valid_successor(SequenceId(100u16.wrapping_add(32767))));
        assert!(!base.is_valid_successor(SequenceId(100u16.wrapping_add(32768))));
    }

    #[test]
    fn test_counter_wraps() {
        let mut counter = SequenceCounter::starting_at(SequenceId(u16::MAX));
        assert_eq!(counter.next_id(), SequenceId(u16::MAX));
        assert_eq!(counter.next_id(), SequenceId(0));
    }

    #[test]
    fn test_header_round_trip() {
        let mut writer = OctetWriter::new();
        write_datagram_header(&mut writer, SequenceId(0xABCD));
        let octets = writer.into_vec();
        assert_eq!(octets, vec![0xAB, 0xCD]);
        let mut reader = OctetReader::new(&octets);
        assert_eq!(read_datagram_header(&mut reader).unwrap(), SequenceId(0xABCD));
    }

    proptest! {
        #[test]
        fn prop_successor_matches_forward_diff(last in any::<u16>(), next in any::<u16>()) {
            let last = SequenceId(last);
            let next = SequenceId(next);
            let diff = last.forward_diff(next);
            let expected = (u32::from(next.0) + 65536 - u32::from(last.0)) % 65536;
            prop_assert_eq!(u32::from(diff), expected);
            prop_assert_eq!(last.is_valid_successor(next), (1..=32767).contains(&diff));
        }

        #[test]
        fn prop_missed_is_diff_minus_one(last in any::<u16>(), step in 1u16..=32767) {
            let mut detector = SequenceGapDetector::new();
            detector.receive(SequenceId(last));
            let outcome = detector.receive(SequenceId(last.wrapping_add(step)));
            prop_assert_eq!(outcome, GapOutcome::Accepted { missed: step - 1 });
        }
    }
}
