//! Step types flowing between clients and the host

use crate::{Error, Result, MAX_STEP_PAYLOAD_OCTETS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tickline_core::{ParticipantId, TickId};

/// One participant's input for one tick, sent before the host confirms it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedStep {
    pub tick_id: TickId,
    payload: Vec<u8>,
}

impl PredictedStep {
    /// Create a step, rejecting payloads above 64 octets
    pub fn new(tick_id: TickId, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > MAX_STEP_PAYLOAD_OCTETS {
            return Err(Error::PayloadTooLarge(payload.len()));
        }
        Ok(Self { tick_id, payload })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Whether a participant's input for a tick is genuine or synthesised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectState {
    /// The participant's predicted step arrived in time
    #[default]
    Normal,
    /// No step was buffered when the tick was composed
    StepNotProvidedInTime,
    /// The participant's connection is gone and may come back
    WaitingForReconnect,
}

impl ConnectState {
    /// Wire code
    pub fn code(&self) -> u8 {
        match self {
            ConnectState::Normal => 0,
            ConnectState::StepNotProvidedInTime => 1,
            ConnectState::WaitingForReconnect => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(ConnectState::Normal),
            1 => Ok(ConnectState::StepNotProvidedInTime),
            2 => Ok(ConnectState::WaitingForReconnect),
            other => Err(Error::InvalidConnectState(other)),
        }
    }
}

/// One participant's entry in a composed tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoritativeStepRecord {
    pub connect_state: ConnectState,
    /// Empty unless `connect_state` is [`ConnectState::Normal`]
    pub payload: Vec<u8>,
}

impl AuthoritativeStepRecord {
    /// Record carrying a participant's real input
    pub fn normal(payload: Vec<u8>) -> Self {
        Self {
            connect_state: ConnectState::Normal,
            payload,
        }
    }

    /// Synthesised record with no payload
    pub fn synthesised(connect_state: ConnectState) -> Self {
        Self {
            connect_state,
            payload: Vec::new(),
        }
    }

    pub fn is_normal(&self) -> bool {
        self.connect_state == ConnectState::Normal
    }
}

/// The host's final input set for one tick, one record per participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedAuthoritativeStep {
    pub tick_id: TickId,
    pub steps: BTreeMap<ParticipantId, AuthoritativeStepRecord>,
}

impl CombinedAuthoritativeStep {
    pub fn new(tick_id: TickId) -> Self {
        Self {
            tick_id,
            steps: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, participant: ParticipantId, record: AuthoritativeStepRecord) {
        self.steps.insert(participant, record);
    }

    pub fn get(&self, participant: ParticipantId) -> Option<&AuthoritativeStepRecord> {
        self.steps.get(&participant)
    }

    pub fn participant_count(&self) -> usize {
        self.steps.len()
    }

    /// Participants whose record was synthesised
    pub fn missing_participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.steps
            .iter()
            .filter(|(_, record)| !record.is_normal())
            .map(|(id, _)| *id)
    }
}
