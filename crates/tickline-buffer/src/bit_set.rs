//! Fixed-length bit vector

use crate::{Error, Result};

const WORD_BITS: usize = 64;

/// Fixed bit vector tracking which of `bit_count` items have arrived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
    bit_count: usize,
    set_count: usize,
}

impl BitSet {
    /// Create a bit set with every bit cleared
    pub fn new(bit_count: usize) -> Self {
        Self {
            words: vec![0; bit_count.div_ceil(WORD_BITS)],
            bit_count,
            set_count: 0,
        }
    }

    fn check(&self, index: usize) -> Result<()> {
        if index >= self.bit_count {
            return Err(Error::BitOutOfRange {
                index,
                bit_count: self.bit_count,
            });
        }
        Ok(())
    }

    /// Set a bit, returning `true` if it was previously clear
    pub fn set(&mut self, index: usize) -> Result<bool> {
        self.check(index)?;
        let word = &mut self.words[index / WORD_BITS];
        let mask = 1u64 << (index % WORD_BITS);
        let newly_set = *word & mask == 0;
        *word |= mask;
        if newly_set {
            self.set_count += 1;
        }
        Ok(newly_set)
    }

    /// Clear a bit, returning `true` if it was previously set
    pub fn unset(&mut self, index: usize) -> Result<bool> {
        self.check(index)?;
        let word = &mut self.words[index / WORD_BITS];
        let mask = 1u64 << (index % WORD_BITS);
        let was_set = *word & mask != 0;
        *word &= !mask;
        if was_set {
            self.set_count -= 1;
        }
        Ok(was_set)
    }

    /// Whether a bit is set; out-of-range bits read as clear
    pub fn is_set(&self, index: usize) -> bool {
        index < self.bit_count && self.words[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }

    pub fn count_set(&self) -> usize {
        self.set_count
    }

    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    pub fn is_all_set(&self) -> bool {
        self.set_count == self.bit_count
    }

    /// Lowest clear bit, or `None` when every bit is set
    pub fn first_unset(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, word)| **word != u64::MAX)
            .map(|(word_index, word)| word_index * WORD_BITS + word.trailing_ones() as usize)
            .filter(|index| *index < self.bit_count)
    }

    /// 64 bits starting at `base` (bit `i` of the result = bit `base + i`)
    ///
    /// Bits past the end of the set read as clear.
    pub fn window_mask(&self, base: usize) -> u64 {
        (0..WORD_BITS)
            .filter(|offset| self.is_set(base + offset))
            .fold(0u64, |mask, offset| mask | (1u64 << offset))
    }

    /// Clear every bit
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|word| *word = 0);
        self.set_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_count() {
        let mut bits = BitSet::new(130);
        assert!(bits.set(0).unwrap());
        assert!(bits.set(129).unwrap());
        assert!(!bits.set(129).unwrap());

        assert!(bits.is_set(0));
        assert!(bits.is_set(129));
        assert!(!bits.is_set(64));
        assert_eq!(bits.count_set(), 2);
    }

    #[test]
    fn test_out_of_range() {
        let mut bits = BitSet::new(10);
        assert_eq!(
            bits.set(10),
            Err(Error::BitOutOfRange {
                index: 10,
                bit_count: 10
            })
        );
        assert!(!bits.is_set(10));
    }

    #[test]
    fn test_first_unset_and_all_set() {
        let mut bits = BitSet::new(70);
        for index in 0..70 {
            if index != 66 {
                bits.set(index).unwrap();
            }
        }
        assert_eq!(bits.first_unset(), Some(66));
        assert!(!bits.is_all_set());

        bits.set(66).unwrap();
        assert_eq!(bits.first_unset(), None);
        assert!(bits.is_all_set());

        bits.unset(3).unwrap();
        assert_eq!(bits.first_unset(), Some(3));
        assert_eq!(bits.count_set(), 69);
    }

    #[test]
    fn test_window_mask() {
        let mut bits = BitSet::new(100);
        bits.set(10).unwrap();
        bits.set(12).unwrap();
        bits.set(73).unwrap();
        bits.set(80).unwrap();

        assert_eq!(bits.window_mask(10), 1 | (1 << 2) | (1 << 63));
        // past-the-end bits read as clear
        assert_eq!(bits.window_mask(80), 1);
    }

    #[test]
    fn test_empty_set() {
        let bits = BitSet::new(0);
        assert!(bits.is_all_set());
        assert_eq!(bits.first_unset(), None);
    }
}
