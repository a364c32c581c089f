//! Blob stream commands on the wire
//!
//! Every command starts with its command byte; all fields are big-endian.
//!
//! ```text
//! StartTransfer     0x24  transfer_id u16, octet_count u32, chunk_size u16
//! AckStartTransfer  0x25  transfer_id u16
//! SetChunk          0x55  chunk_id u32, payload_len u16, payload (<= 1024)
//! AckChunk          0x35  base u32, mask u64
//! ```

use crate::{Error, Result, MAX_CHUNK_SIZE};
use tickline_core::{OctetReader, OctetWriter};

pub const CMD_START_TRANSFER: u8 = 0x24;
pub const CMD_ACK_START_TRANSFER: u8 = 0x25;
pub const CMD_SET_CHUNK: u8 = 0x55;
pub const CMD_ACK_CHUNK: u8 = 0x35;

/// Octets a `SetChunk` command adds on top of its payload
pub const SET_CHUNK_OVERHEAD: usize = 1 + 4 + 2;

/// One decoded blob stream command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobCommand {
    StartTransfer {
        transfer_id: u16,
        octet_count: u32,
        chunk_size: u16,
    },
    AckStartTransfer {
        transfer_id: u16,
    },
    SetChunk {
        chunk_id: u32,
        payload: Vec<u8>,
    },
    AckChunk {
        base: u32,
        mask: u64,
    },
}

impl BlobCommand {
    /// Whether `byte` introduces a blob command
    pub fn is_command_byte(byte: u8) -> bool {
        matches!(
            byte,
            CMD_START_TRANSFER | CMD_ACK_START_TRANSFER | CMD_SET_CHUNK | CMD_ACK_CHUNK
        )
    }

    pub fn command_byte(&self) -> u8 {
        match self {
            BlobCommand::StartTransfer { .. } => CMD_START_TRANSFER,
            BlobCommand::AckStartTransfer { .. } => CMD_ACK_START_TRANSFER,
            BlobCommand::SetChunk { .. } => CMD_SET_CHUNK,
            BlobCommand::AckChunk { .. } => CMD_ACK_CHUNK,
        }
    }

    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            BlobCommand::StartTransfer { .. } => "StartTransfer",
            BlobCommand::AckStartTransfer { .. } => "AckStartTransfer",
            BlobCommand::SetChunk { .. } => "SetChunk",
            BlobCommand::AckChunk { .. } => "AckChunk",
        }
    }

    /// Write the command byte and body
    pub fn encode(&self, writer: &mut OctetWriter) -> Result<()> {
        writer.write_u8(self.command_byte());
        match self {
            BlobCommand::StartTransfer {
                transfer_id,
                octet_count,
                chunk_size,
            } => {
                writer.write_u16(*transfer_id);
                writer.write_u32(*octet_count);
                writer.write_u16(*chunk_size);
            }
            BlobCommand::AckStartTransfer { transfer_id } => writer.write_u16(*transfer_id),
            BlobCommand::SetChunk { chunk_id, payload } => {
                if payload.len() > MAX_CHUNK_SIZE {
                    return Err(Error::PayloadTooLarge(payload.len()));
                }
                writer.write_u32(*chunk_id);
                writer.write_u16(payload.len() as u16);
                writer.write_octets(payload);
            }
            BlobCommand::AckChunk { base, mask } => {
                writer.write_u32(*base);
                writer.write_u64(*mask);
            }
        }
        Ok(())
    }

    /// Read a command byte and the body it announces
    pub fn decode(reader: &mut OctetReader<'_>) -> Result<Self> {
        let command = reader.read_u8()?;
        Self::decode_body(command, reader)
    }

    /// Read the body of a command whose byte was already consumed
    pub fn decode_body(command: u8, reader: &mut OctetReader<'_>) -> Result<Self> {
        let decoded = match command {
            CMD_START_TRANSFER => BlobCommand::StartTransfer {
                transfer_id: reader.read_u16()?,
                octet_count: reader.read_u32()?,
                chunk_size: reader.read_u16()?,
            },
            CMD_ACK_START_TRANSFER => BlobCommand::AckStartTransfer {
                transfer_id: reader.read_u16()?,
            },
            CMD_SET_CHUNK => {
                let chunk_id = reader.read_u32()?;
                let len = reader.read_u16()? as usize;
                if len > MAX_CHUNK_SIZE {
                    return Err(Error::PayloadTooLarge(len));
                }
                BlobCommand::SetChunk {
                    chunk_id,
                    payload: reader.read_octets(len)?.to_vec(),
                }
            }
            CMD_ACK_CHUNK => BlobCommand::AckChunk {
                base: reader.read_u32()?,
                mask: reader.read_u64()?,
            },
            other => return Err(Error::UnknownCommand(other)),
        };
        Ok(decoded)
    }
}
