//! Datagram framing and the multiplexed command sets
//!
//! Every datagram is a `u16` sequence id followed by exactly one command.
//! The command byte is decoded once into [`ClientCommand`] or
//! [`HostCommand`]; an unknown byte is a decode error.
//!
//! | byte      | direction     | command                        |
//! |-----------|---------------|--------------------------------|
//! | `0x02`    | client → host | PredictedSteps                 |
//! | `0x03`    | client → host | RequestAuthoritativeSteps      |
//! | `0x08`    | host → client | AuthoritativeSteps             |
//! | `0x24`    | both          | blob StartTransfer             |
//! | `0x25`    | both          | blob AckStartTransfer          |
//! | `0x55`    | both          | blob SetChunk                  |
//! | `0x35`    | both          | blob AckChunk                  |

use crate::wire::{
    read_authoritative_batch, read_predicted_steps, write_authoritative_batch,
    write_predicted_steps, AuthoritativeStepsBatch, PlayerSteps,
};
use crate::{Error, Result};
use tickline_blob::BlobCommand;
use tickline_core::{
    read_datagram_header, write_datagram_header, OctetReader, OctetWriter, SequenceId, TickId,
};

pub const CMD_PREDICTED_STEPS: u8 = 0x02;
pub const CMD_REQUEST_AUTHORITATIVE_STEPS: u8 = 0x03;
pub const CMD_AUTHORITATIVE_STEPS: u8 = 0x08;

/// Default upper bound for one datagram
pub const DEFAULT_MAX_DATAGRAM_OCTETS: usize = 1100;

/// Commands a client sends to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Every step the host has not consumed yet, per local player
    PredictedSteps(Vec<PlayerSteps>),
    /// Ask for authoritative steps starting at `waiting_for_tick_id`
    RequestAuthoritativeSteps { waiting_for_tick_id: TickId },
    Blob(BlobCommand),
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::PredictedSteps(_) => "PredictedSteps",
            ClientCommand::RequestAuthoritativeSteps { .. } => "RequestAuthoritativeSteps",
            ClientCommand::Blob(command) => command.name(),
        }
    }

    pub fn encode(&self, writer: &mut OctetWriter) -> Result<()> {
        match self {
            ClientCommand::PredictedSteps(players) => {
                writer.write_u8(CMD_PREDICTED_STEPS);
                write_predicted_steps(writer, players)
            }
            ClientCommand::RequestAuthoritativeSteps {
                waiting_for_tick_id,
            } => {
                writer.write_u8(CMD_REQUEST_AUTHORITATIVE_STEPS);
                writer.write_u32(waiting_for_tick_id.raw());
                Ok(())
            }
            ClientCommand::Blob(command) => Ok(command.encode(writer)?),
        }
    }

    pub fn decode(reader: &mut OctetReader<'_>) -> Result<Self> {
        let command = reader.read_u8()?;
        let decoded = match command {
            CMD_PREDICTED_STEPS => ClientCommand::PredictedSteps(read_predicted_steps(reader)?),
            CMD_REQUEST_AUTHORITATIVE_STEPS => ClientCommand::RequestAuthoritativeSteps {
                waiting_for_tick_id: TickId(reader.read_u32()?),
            },
            byte if BlobCommand::is_command_byte(byte) => {
                ClientCommand::Blob(BlobCommand::decode_body(byte, reader)?)
            }
            other => return Err(Error::UnknownCommand(other)),
        };
        Ok(decoded)
    }

    /// Frame the command behind a sequence header
    pub fn to_datagram(&self, sequence: SequenceId) -> Result<Vec<u8>> {
        let mut writer = OctetWriter::new();
        write_datagram_header(&mut writer, sequence);
        self.encode(&mut writer)?;
        Ok(writer.into_vec())
    }

    /// Split a datagram into its sequence id and command
    pub fn from_datagram(octets: &[u8]) -> Result<(SequenceId, Self)> {
        let mut reader = OctetReader::new(octets);
        let sequence = read_datagram_header(&mut reader)?;
        Ok((sequence, Self::decode(&mut reader)?))
    }
}

/// Commands the host sends to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    AuthoritativeSteps(AuthoritativeStepsBatch),
    Blob(BlobCommand),
}

impl HostCommand {
    pub fn name(&self) -> &'static str {
        match self {
            HostCommand::AuthoritativeSteps(_) => "AuthoritativeSteps",
            HostCommand::Blob(command) => command.name(),
        }
    }

    pub fn encode(&self, writer: &mut OctetWriter) -> Result<()> {
        match self {
            HostCommand::AuthoritativeSteps(batch) => {
                writer.write_u8(CMD_AUTHORITATIVE_STEPS);
                let written = write_authoritative_batch(
                    writer,
                    batch.start_tick_id,
                    &batch.steps,
                    usize::MAX,
                )?;
                if written < batch.steps.len() {
                    return Err(tickline_core::Error::FieldOverflow {
                        field: "authoritative step count",
                        value: batch.steps.len(),
                    }
                    .into());
                }
                Ok(())
            }
            HostCommand::Blob(command) => Ok(command.encode(writer)?),
        }
    }

    pub fn decode(reader: &mut OctetReader<'_>) -> Result<Self> {
        let command = reader.read_u8()?;
        let decoded = match command {
            CMD_AUTHORITATIVE_STEPS => {
                HostCommand::AuthoritativeSteps(read_authoritative_batch(reader)?)
            }
            byte if BlobCommand::is_command_byte(byte) => {
                HostCommand::Blob(BlobCommand::decode_body(byte, reader)?)
            }
            other => return Err(Error::UnknownCommand(other)),
        };
        Ok(decoded)
    }

    pub fn to_datagram(&self, sequence: SequenceId) -> Result<Vec<u8>> {
        let mut writer = OctetWriter::new();
        write_datagram_header(&mut writer, sequence);
        self.encode(&mut writer)?;
        Ok(writer.into_vec())
    }

    pub fn from_datagram(octets: &[u8]) -> Result<(SequenceId, Self)> {
        let mut reader = OctetReader::new(octets);
        let sequence = read_datagram_header(&mut reader)?;
        Ok((sequence, Self::decode(&mut reader)?))
    }
}
