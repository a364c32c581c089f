//! Step codecs
//!
//! All fields are big-endian.
//!
//! ```text
//! PredictedSteps body
//!   localPlayerCount u8
//!   per player: localIndex u8, stepCount u8, firstTickId u32,
//!               stepCount × [0xBD, payloadLen u8, payload]
//!
//! CombinedAuthoritativeStep record
//!   participantCount u8
//!   per participant: (mask << 7 | participantId) u8, then
//!                    connectState u8             (mask set)
//!                    payloadLen u8, payload      (mask clear)
//!
//! AuthoritativeSteps body
//!   startTickId u32, count u8, count × record
//! ```
//!
//! Writers that take a `limit` stop before the datagram would grow past it
//! and back-patch the count they announced.

use crate::{
    AuthoritativeStepRecord, CombinedAuthoritativeStep, ConnectState, Error, PredictedStep, Result,
    MAX_STEP_PAYLOAD_OCTETS,
};
use std::collections::BTreeMap;
use tickline_core::{LocalIndex, OctetReader, OctetWriter, ParticipantId, TickId};

/// Marker in front of every step inside a PredictedSteps body
pub const STEP_MARKER: u8 = 0xBD;

const CONNECT_STATE_FLAG: u8 = 0x80;
const PARTICIPANT_ID_BITS: u8 = 0x7F;

/// Consecutive predicted step payloads of one local player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSteps {
    pub local_index: LocalIndex,
    pub first_tick_id: TickId,
    pub payloads: Vec<Vec<u8>>,
}

impl PlayerSteps {
    /// Tick of the last payload
    pub fn last_tick_id(&self) -> Option<TickId> {
        let count = u32::try_from(self.payloads.len()).ok()?;
        count
            .checked_sub(1)
            .map(|last| self.first_tick_id.advanced_by(last))
    }
}

/// Consecutive composed steps starting at `start_tick_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoritativeStepsBatch {
    pub start_tick_id: TickId,
    pub steps: Vec<CombinedAuthoritativeStep>,
}

fn u8_count(field: &'static str, value: usize) -> Result<u8> {
    u8::try_from(value).map_err(|_| tickline_core::Error::FieldOverflow { field, value }.into())
}

/// Write a full PredictedSteps body
pub fn write_predicted_steps(writer: &mut OctetWriter, players: &[PlayerSteps]) -> Result<()> {
    writer.write_u8(u8_count("local player count", players.len())?);
    for player in players {
        writer.write_u8(player.local_index);
        writer.write_u8(u8_count("step count", player.payloads.len())?);
        writer.write_u32(player.first_tick_id.raw());
        for payload in &player.payloads {
            if payload.len() > MAX_STEP_PAYLOAD_OCTETS {
                return Err(Error::PayloadTooLarge(payload.len()));
            }
            writer.write_u8(STEP_MARKER);
            writer.write_octets_u8_len(payload)?;
        }
    }
    Ok(())
}

/// Write one player's steps, stopping before `writer` grows past `limit`
///
/// Returns the number of steps written; when none fit, the player header is
/// removed again and 0 is returned.
pub fn write_player_steps_bounded<'a, I>(
    writer: &mut OctetWriter,
    local_index: LocalIndex,
    steps: I,
    limit: usize,
) -> Result<usize>
where
    I: IntoIterator<Item = &'a PredictedStep>,
{
    let mut steps = steps.into_iter().peekable();
    let Some(first) = steps.peek() else {
        return Ok(0);
    };
    let first_tick_id = first.tick_id;

    let header_at = writer.position();
    writer.write_u8(local_index);
    let count_at = writer.position();
    writer.write_u8(0);
    writer.write_u32(first_tick_id.raw());

    let mut expected = first_tick_id;
    let mut written = 0usize;
    for step in steps {
        if written == u8::MAX as usize {
            break;
        }
        if step.tick_id != expected {
            return Err(Error::TickDiscontinuity {
                expected,
                actual: step.tick_id,
            });
        }
        let before = writer.position();
        writer.write_u8(STEP_MARKER);
        writer.write_octets_u8_len(step.payload())?;
        if writer.len() > limit {
            writer.truncate(before);
            break;
        }
        written += 1;
        expected = expected.next();
    }

    if written == 0 {
        writer.truncate(header_at);
    } else {
        writer.patch_u8(count_at, written as u8);
    }
    Ok(written)
}

/// Read a PredictedSteps body
pub fn read_predicted_steps(reader: &mut OctetReader<'_>) -> Result<Vec<PlayerSteps>> {
    let player_count = reader.read_u8()?;
    let mut players = Vec::with_capacity(player_count as usize);
    for _ in 0..player_count {
        let local_index = reader.read_u8()?;
        let step_count = reader.read_u8()?;
        let first_tick_id = TickId(reader.read_u32()?);
        let mut payloads = Vec::with_capacity(step_count as usize);
        for _ in 0..step_count {
            let marker = reader.read_u8()?;
            if marker != STEP_MARKER {
                return Err(Error::InvalidStepMarker(marker));
            }
            let payload = reader.read_octets_u8_len()?;
            if payload.len() > MAX_STEP_PAYLOAD_OCTETS {
                return Err(Error::PayloadTooLarge(payload.len()));
            }
            payloads.push(payload.to_vec());
        }
        players.push(PlayerSteps {
            local_index,
            first_tick_id,
            payloads,
        });
    }
    Ok(players)
}

/// Write one composed step without its tick id
pub fn write_record(writer: &mut OctetWriter, step: &CombinedAuthoritativeStep) -> Result<()> {
    writer.write_u8(u8_count("participant count", step.steps.len())?);
    for (participant, record) in &step.steps {
        let id = participant.raw() & PARTICIPANT_ID_BITS;
        if record.is_normal() {
            writer.write_u8(id);
            writer.write_octets_u8_len(&record.payload)?;
        } else {
            writer.write_u8(CONNECT_STATE_FLAG | id);
            writer.write_u8(record.connect_state.code());
        }
    }
    Ok(())
}

/// Read one composed step for `tick_id`
pub fn read_record(
    reader: &mut OctetReader<'_>,
    tick_id: TickId,
) -> Result<CombinedAuthoritativeStep> {
    let participant_count = reader.read_u8()?;
    let mut steps = BTreeMap::new();
    for _ in 0..participant_count {
        let header = reader.read_u8()?;
        let participant = ParticipantId::new(header & PARTICIPANT_ID_BITS)?;
        let record = if header & CONNECT_STATE_FLAG != 0 {
            AuthoritativeStepRecord::synthesised(ConnectState::from_code(reader.read_u8()?)?)
        } else {
            AuthoritativeStepRecord::normal(reader.read_octets_u8_len()?.to_vec())
        };
        steps.insert(participant, record);
    }
    Ok(CombinedAuthoritativeStep { tick_id, steps })
}

/// Write consecutive steps from `start_tick_id`, stopping before `writer` grows past `limit`
///
/// Returns the number of steps written. Fails with [`Error::DatagramLimit`]
/// if not even the first step fits.
pub fn write_authoritative_batch<'a, I>(
    writer: &mut OctetWriter,
    start_tick_id: TickId,
    steps: I,
    limit: usize,
) -> Result<usize>
where
    I: IntoIterator<Item = &'a CombinedAuthoritativeStep>,
{
    writer.write_u32(start_tick_id.raw());
    let count_at = writer.position();
    writer.write_u8(0);

    let mut expected = start_tick_id;
    let mut written = 0usize;
    for step in steps {
        if written == u8::MAX as usize {
            break;
        }
        if step.tick_id != expected {
            return Err(Error::TickDiscontinuity {
                expected,
                actual: step.tick_id,
            });
        }
        let before = writer.position();
        write_record(writer, step)?;
        if writer.len() > limit {
            if written == 0 {
                return Err(Error::DatagramLimit {
                    needed: writer.len(),
                    limit,
                });
            }
            writer.truncate(before);
            break;
        }
        written += 1;
        expected = expected.next();
    }

    writer.patch_u8(count_at, written as u8);
    Ok(written)
}

/// Read an AuthoritativeSteps body
pub fn read_authoritative_batch(reader: &mut OctetReader<'_>) -> Result<AuthoritativeStepsBatch> {
    let start_tick_id = TickId(reader.read_u32()?);
    let count = reader.read_u8()?;
    let mut steps = Vec::with_capacity(count as usize);
    let mut tick_id = start_tick_id;
    for _ in 0..count {
        steps.push(read_record(reader, tick_id)?);
        tick_id = tick_id.next();
    }
    Ok(AuthoritativeStepsBatch {
        start_tick_id,
        steps,
    })
}
