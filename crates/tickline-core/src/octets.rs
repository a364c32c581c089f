//! Big-endian octet reader and writer
//!
//! All tickline wire formats are sequences of fixed-width big-endian fields
//! and length-prefixed octet runs. The writer supports back-patching a field
//! written earlier (used for batch counts that are only known once the batch
//! has been filled).
//!
//! # Example
//! ```
//! use tickline_core::{OctetReader, OctetWriter};
//!
//! let mut writer = OctetWriter::new();
//! let count_at = writer.position();
//! writer.write_u8(0);
//! writer.write_u32(0xDEAD_BEEF);
//! writer.patch_u8(count_at, 1);
//!
//! let octets = writer.into_vec();
//! let mut reader = OctetReader::new(&octets);
//! assert_eq!(reader.read_u8().unwrap(), 1);
//! assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
//! assert!(reader.is_empty());
//! ```

use crate::{Error, Result};

/// Growable big-endian writer
#[derive(Debug, Clone, Default)]
pub struct OctetWriter {
    octets: Vec<u8>,
}

impl OctetWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with room for `capacity` octets
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            octets: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.octets.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.octets.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.octets.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.octets.extend_from_slice(&value.to_be_bytes());
    }

    /// Append raw octets without a length prefix
    pub fn write_octets(&mut self, octets: &[u8]) {
        self.octets.extend_from_slice(octets);
    }

    /// Append a `u8` length prefix followed by the octets
    pub fn write_octets_u8_len(&mut self, octets: &[u8]) -> Result<()> {
        let len = u8::try_from(octets.len()).map_err(|_| Error::FieldOverflow {
            field: "u8 length",
            value: octets.len(),
        })?;
        self.write_u8(len);
        self.write_octets(octets);
        Ok(())
    }

    /// Overwrite a previously written `u8`
    ///
    /// # Panics
    ///
    /// Panics if `position` was never written.
    pub fn patch_u8(&mut self, position: usize, value: u8) {
        self.octets[position] = value;
    }

    /// Drop everything written after `position`
    pub fn truncate(&mut self, position: usize) {
        self.octets.truncate(position);
    }

    /// Number of octets written so far
    pub fn position(&self) -> usize {
        self.octets.len()
    }

    pub fn len(&self) -> usize {
        self.octets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.octets.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.octets
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.octets
    }
}

/// Cursor over a received datagram
#[derive(Debug, Clone)]
pub struct OctetReader<'a> {
    octets: &'a [u8],
    position: usize,
}

impl<'a> OctetReader<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            position: 0,
        }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if count > remaining {
            return Err(Error::UnexpectedEnd {
                needed: count,
                remaining,
            });
        }
        let slice = &self.octets[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.take_array().map(u16::from_be_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.take_array().map(u32::from_be_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.take_array().map(u64::from_be_bytes)
    }

    /// Borrow the next `count` octets
    pub fn read_octets(&mut self, count: usize) -> Result<&'a [u8]> {
        self.take(count)
    }

    /// Read a `u8` length prefix and the octets it announces
    pub fn read_octets_u8_len(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u8()? as usize;
        self.take(len)
    }

    /// Look at the next octet without consuming it
    pub fn peek_u8(&self) -> Result<u8> {
        self.octets
            .get(self.position)
            .copied()
            .ok_or(Error::UnexpectedEnd {
                needed: 1,
                remaining: 0,
            })
    }

    /// Octets not yet consumed
    pub fn remaining(&self) -> usize {
        self.octets.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Number of octets consumed so far
    pub fn position(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_layout() {
        let mut writer = OctetWriter::new();
        writer.write_u16(0x0102);
        writer.write_u32(0x0304_0506);
        writer.write_u64(0x0708_090A_0B0C_0D0E);
        assert_eq!(
            writer.as_slice(),
            &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14]
        );
    }

    #[test]
    fn test_read_past_end() {
        let octets = [0x01, 0x02, 0x03];
        let mut reader = OctetReader::new(&octets);
        assert_eq!(reader.read_u16().unwrap(), 0x0102);
        assert_eq!(
            reader.read_u32(),
            Err(Error::UnexpectedEnd {
                needed: 4,
                remaining: 1
            })
        );
        // failed reads do not consume
        assert_eq!(reader.read_u8().unwrap(), 0x03);
    }

    #[test]
    fn test_length_prefixed_octets() {
        let mut writer = OctetWriter::new();
        writer.write_octets_u8_len(b"abc").unwrap();
        writer.write_octets_u8_len(b"").unwrap();
        let octets = writer.into_vec();

        let mut reader = OctetReader::new(&octets);
        assert_eq!(reader.read_octets_u8_len().unwrap(), b"abc");
        assert_eq!(reader.read_octets_u8_len().unwrap(), b"");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_length_prefix_overflow() {
        let mut writer = OctetWriter::new();
        let too_long = vec![0u8; 256];
        assert_eq!(
            writer.write_octets_u8_len(&too_long),
            Err(Error::FieldOverflow {
                field: "u8 length",
                value: 256
            })
        );
    }

    #[test]
    fn test_truncate_and_peek() {
        let mut writer = OctetWriter::new();
        writer.write_u8(9);
        let mark = writer.position();
        writer.write_u32(1);
        writer.truncate(mark);
        assert_eq!(writer.len(), 1);

        let octets = writer.into_vec();
        let reader = OctetReader::new(&octets);
        assert_eq!(reader.peek_u8().unwrap(), 9);
        assert_eq!(reader.position(), 0);
    }
}
