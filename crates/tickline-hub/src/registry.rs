//! Participant registry and the composition availability heuristic
//!
//! A participant is one logical input source. Several may share a
//! connection (one per local player), so participants are looked up by
//! `(connection, local_index)`. Ids are the lowest free value in `0..64`
//! and stay stable until the participant is removed.

use crate::{CompositionThresholds, Error, Result};
use indexmap::IndexMap;
use log::{debug, info};
use std::collections::BTreeMap;
use tickline_core::{ConnectionId, LocalIndex, ParticipantId, TickId, MAX_PARTICIPANTS};
use tickline_netcode::PredictedStepQueue;

/// One registered input source
#[derive(Debug, Clone)]
pub struct Participant {
    id: ParticipantId,
    connection_id: ConnectionId,
    local_index: LocalIndex,
    queue: PredictedStepQueue,
    /// Ticks composed without this participant's input
    penalty: u32,
    waiting_for_reconnect: bool,
}

impl Participant {
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn local_index(&self) -> LocalIndex {
        self.local_index
    }

    pub fn queue(&self) -> &PredictedStepQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut PredictedStepQueue {
        &mut self.queue
    }

    pub fn penalty(&self) -> u32 {
        self.penalty
    }

    pub(crate) fn add_penalty(&mut self) {
        self.penalty = self.penalty.saturating_add(1);
    }

    /// Whether the connection dropped and the participant is kept for a reconnect
    pub fn is_waiting_for_reconnect(&self) -> bool {
        self.waiting_for_reconnect
    }

    /// Whether the participant has no input for `tick_id` and cannot get any in time
    ///
    /// True when the queue is empty or only holds ticks after `tick_id`.
    pub fn is_non_contributing(&self, tick_id: TickId) -> bool {
        match self.queue.earliest() {
            Some(earliest) => earliest.is_after(tick_id),
            None => true,
        }
    }
}

/// Snapshot of how far ahead participants are relative to one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Availability {
    /// `latest buffered - tick` of the furthest-ahead participant
    pub max_lead: Option<i32>,
    /// Connected participants that cannot contribute to the tick
    pub non_contributing: usize,
}

impl Availability {
    /// Whether composing the tick now is justified
    pub fn justifies_composition(&self, thresholds: &CompositionThresholds) -> bool {
        let Some(lead) = self.max_lead else {
            return false;
        };
        let lead = i64::from(lead);
        if lead > i64::from(thresholds.compose_regardless_lead) {
            return true;
        }
        lead > i64::from(thresholds.compose_when_all_present_lead) && self.non_contributing == 0
    }
}

/// Owns every participant of a session
#[derive(Debug, Clone)]
pub struct ParticipantRegistry {
    participants: BTreeMap<ParticipantId, Participant>,
    by_connection: IndexMap<(ConnectionId, LocalIndex), ParticipantId>,
    queue_capacity: usize,
    max_participants: usize,
}

impl ParticipantRegistry {
    /// Create an empty registry; new participants get queues of `queue_capacity`
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            participants: BTreeMap::new(),
            by_connection: IndexMap::new(),
            queue_capacity,
            max_participants: MAX_PARTICIPANTS,
        }
    }

    /// Refuse registrations beyond `max_participants` (capped at 64)
    pub fn with_max_participants(mut self, max_participants: usize) -> Self {
        self.max_participants = max_participants.min(MAX_PARTICIPANTS);
        self
    }

    pub fn max_participants(&self) -> usize {
        self.max_participants
    }

    /// Register a participant for `(connection, local_index)`
    ///
    /// Its queue expects the first step at `waiting_for_tick_id`.
    pub fn create(
        &mut self,
        connection: ConnectionId,
        local_index: LocalIndex,
        waiting_for_tick_id: TickId,
    ) -> Result<ParticipantId> {
        let limited = self.max_participants < MAX_PARTICIPANTS;
        if limited && self.participants.len() >= self.max_participants {
            return Err(Error::RegistryFull(self.max_participants));
        }
        let id = self.lowest_free_id()?;
        let participant = Participant {
            id,
            connection_id: connection,
            local_index,
            queue: PredictedStepQueue::new(self.queue_capacity, waiting_for_tick_id),
            penalty: 0,
            waiting_for_reconnect: false,
        };
        self.participants.insert(id, participant);
        self.by_connection.insert((connection, local_index), id);
        info!(
            "Registered {} for {} local player {}",
            id, connection, local_index
        );
        Ok(id)
    }

    /// Existing participant for `(connection, local_index)`, or a new one
    pub fn get_or_create(
        &mut self,
        connection: ConnectionId,
        local_index: LocalIndex,
        waiting_for_tick_id: TickId,
    ) -> Result<ParticipantId> {
        match self.lookup(connection, local_index) {
            Some(id) => Ok(id),
            None => self.create(connection, local_index, waiting_for_tick_id),
        }
    }

    fn lowest_free_id(&self) -> Result<ParticipantId> {
        for raw in 0..MAX_PARTICIPANTS as u8 {
            let id = ParticipantId::new(raw)?;
            if !self.participants.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(Error::ParticipantsExhausted(MAX_PARTICIPANTS))
    }

    pub fn lookup(
        &self,
        connection: ConnectionId,
        local_index: LocalIndex,
    ) -> Option<ParticipantId> {
        self.by_connection.get(&(connection, local_index)).copied()
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn get_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(&id)
    }

    /// Participants hosted by `connection`, in registration order
    pub fn participants_for_connection(&self, connection: ConnectionId) -> Vec<ParticipantId> {
        self.by_connection
            .iter()
            .filter(|((owner, _), _)| *owner == connection)
            .map(|(_, id)| *id)
            .collect()
    }

    /// Remove one participant, freeing its id
    pub fn remove(&mut self, id: ParticipantId) -> Result<Participant> {
        let participant = self
            .participants
            .remove(&id)
            .ok_or(Error::UnknownParticipant(id))?;
        self.by_connection
            .shift_remove(&(participant.connection_id, participant.local_index));
        Ok(participant)
    }

    /// Remove every participant of `connection`
    pub fn remove_connection(&mut self, connection: ConnectionId) -> Vec<ParticipantId> {
        let removed = self.participants_for_connection(connection);
        for id in &removed {
            if let Some(participant) = self.participants.remove(id) {
                self.by_connection
                    .shift_remove(&(participant.connection_id, participant.local_index));
                info!(
                    "Removed {} (penalty {}) after {} left",
                    id, participant.penalty, connection
                );
            }
        }
        removed
    }

    /// Mark every participant of `connection` as waiting for a reconnect
    ///
    /// Waiting participants get `WaitingForReconnect` records and do not hold
    /// back composition.
    pub fn set_waiting_for_reconnect(&mut self, connection: ConnectionId, waiting: bool) -> usize {
        let ids = self.participants_for_connection(connection);
        let mut changed = 0;
        for id in ids {
            if let Some(participant) = self.participants.get_mut(&id) {
                if participant.waiting_for_reconnect != waiting {
                    participant.waiting_for_reconnect = waiting;
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            debug!(
                "{} participants of {} waiting for reconnect: {}",
                changed, connection, waiting
            );
        }
        changed
    }

    /// Lead and stragglers relative to `tick_id`
    pub fn availability(&self, tick_id: TickId) -> Availability {
        let mut availability = Availability::default();
        for participant in self.participants.values() {
            if participant.waiting_for_reconnect {
                continue;
            }
            if participant.is_non_contributing(tick_id) {
                availability.non_contributing += 1;
            }
            if let Some(latest) = participant.queue.latest() {
                let lead = tick_id.diff_to(latest);
                availability.max_lead =
                    Some(availability.max_lead.map_or(lead, |max| max.max(lead)));
            }
        }
        availability
    }

    /// Whether enough input is buffered to compose `tick_id`
    ///
    /// Composes regardless of stragglers once the lead passes
    /// `compose_regardless_lead`; between the two thresholds only when every
    /// connected participant can contribute; otherwise waits.
    pub fn is_anyone_ahead_of(
        &self,
        tick_id: TickId,
        thresholds: &CompositionThresholds,
    ) -> bool {
        self.availability(tick_id).justifies_composition(thresholds)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Participant> {
        self.participants.values_mut()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickline_netcode::PredictedStep;

    fn fill(registry: &mut ParticipantRegistry, id: ParticipantId, ticks: std::ops::Range<u32>) {
        let queue = registry.get_mut(id).unwrap().queue_mut();
        for tick in ticks {
            queue
                .add_predicted_step(PredictedStep::new(TickId(tick), vec![]).unwrap())
                .unwrap();
        }
    }

    #[test]
    fn test_lowest_free_id() {
        let mut registry = ParticipantRegistry::new(8);
        let a = registry.create(ConnectionId(1), 0, TickId(0)).unwrap();
        let b = registry.create(ConnectionId(1), 1, TickId(0)).unwrap();
        let c = registry.create(ConnectionId(2), 0, TickId(0)).unwrap();
        assert_eq!((a.raw(), b.raw(), c.raw()), (0, 1, 2));

        registry.remove(b).unwrap();
        let d = registry.create(ConnectionId(3), 0, TickId(0)).unwrap();
        assert_eq!(d.raw(), 1);
        assert_eq!(registry.lookup(ConnectionId(3), 0), Some(d));
        assert_eq!(registry.lookup(ConnectionId(1), 1), None);
    }

    #[test]
    fn test_exhaustion_is_fatal() {
        let mut registry = ParticipantRegistry::new(1);
        for index in 0..64u32 {
            registry.create(ConnectionId(index), 0, TickId(0)).unwrap();
        }
        let error = registry.create(ConnectionId(99), 0, TickId(0)).unwrap_err();
        assert!(matches!(error, Error::ParticipantsExhausted(64)));
        assert!(error.is_fatal());
    }

    #[test]
    fn test_limit_refuses_extra_participants() {
        let mut registry = ParticipantRegistry::new(4).with_max_participants(2);
        registry.create(ConnectionId(1), 0, TickId(0)).unwrap();
        let second = registry.create(ConnectionId(2), 0, TickId(0)).unwrap();

        let error = registry.create(ConnectionId(3), 0, TickId(0)).unwrap_err();
        assert!(matches!(error, Error::RegistryFull(2)));
        assert!(!error.is_fatal());

        // a freed slot can be reused
        registry.remove(second).unwrap();
        assert_eq!(registry.create(ConnectionId(3), 0, TickId(0)).unwrap(), second);
        assert_eq!(
            ParticipantRegistry::new(4).with_max_participants(100).max_participants(),
            64
        );
    }

    #[test]
    fn test_get_or_create_is_stable() {
        let mut registry = ParticipantRegistry::new(8);
        let first = registry.get_or_create(ConnectionId(5), 2, TickId(0)).unwrap();
        let again = registry.get_or_create(ConnectionId(5), 2, TickId(9)).unwrap();
        assert_eq!(first, again);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_connection() {
        let mut registry = ParticipantRegistry::new(8);
        registry.create(ConnectionId(1), 0, TickId(0)).unwrap();
        registry.create(ConnectionId(2), 0, TickId(0)).unwrap();
        registry.create(ConnectionId(1), 1, TickId(0)).unwrap();
        assert_eq!(registry.participants_for_connection(ConnectionId(1)).len(), 2);

        let removed = registry.remove_connection(ConnectionId(1));
        assert_eq!(removed.len(), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.participants_for_connection(ConnectionId(1)).is_empty());
        assert!(matches!(
            registry.remove(removed[0]),
            Err(Error::UnknownParticipant(_))
        ));
    }

    #[test]
    fn test_no_participants_never_composes() {
        let registry = ParticipantRegistry::new(8);
        assert!(!registry.is_anyone_ahead_of(TickId(0), &CompositionThresholds::default()));
    }

    #[test]
    fn test_small_lead_waits() {
        let mut registry = ParticipantRegistry::new(32);
        let a = registry.create(ConnectionId(1), 0, TickId(0)).unwrap();
        fill(&mut registry, a, 0..6);

        // lead 5 is not more than 5
        let thresholds = CompositionThresholds::default();
        assert_eq!(registry.availability(TickId(0)).max_lead, Some(5));
        assert!(!registry.is_anyone_ahead_of(TickId(0), &thresholds));

        fill(&mut registry, a, 6..7);
        assert!(registry.is_anyone_ahead_of(TickId(0), &thresholds));
    }

    #[test]
    fn test_straggler_blocks_until_regardless_lead() {
        let thresholds = CompositionThresholds::default();
        let mut registry = ParticipantRegistry::new(32);
        let fast = registry.create(ConnectionId(1), 0, TickId(0)).unwrap();
        registry.create(ConnectionId(2), 0, TickId(0)).unwrap();

        fill(&mut registry, fast, 0..10);
        let availability = registry.availability(TickId(0));
        assert_eq!(availability.non_contributing, 1);
        assert!(!registry.is_anyone_ahead_of(TickId(0), &thresholds));

        fill(&mut registry, fast, 10..17);
        assert_eq!(registry.availability(TickId(0)).max_lead, Some(16));
        assert!(registry.is_anyone_ahead_of(TickId(0), &thresholds));
    }

    #[test]
    fn test_participant_ahead_of_tick_is_non_contributing() {
        let mut registry = ParticipantRegistry::new(32);
        let early = registry.create(ConnectionId(1), 0, TickId(0)).unwrap();
        let late = registry.create(ConnectionId(2), 0, TickId(4)).unwrap();
        fill(&mut registry, early, 0..8);
        fill(&mut registry, late, 4..8);

        assert!(registry.get(late).unwrap().is_non_contributing(TickId(2)));
        assert!(!registry.get(early).unwrap().is_non_contributing(TickId(2)));
        assert_eq!(registry.availability(TickId(1)).non_contributing, 1);
    }

    #[test]
    fn test_reconnect_wait_does_not_hold_back() {
        let thresholds = CompositionThresholds::default();
        let mut registry = ParticipantRegistry::new(32);
        let fast = registry.create(ConnectionId(1), 0, TickId(0)).unwrap();
        registry.create(ConnectionId(2), 0, TickId(0)).unwrap();
        fill(&mut registry, fast, 0..8);
        assert!(!registry.is_anyone_ahead_of(TickId(0), &thresholds));

        assert_eq!(registry.set_waiting_for_reconnect(ConnectionId(2), true), 1);
        assert!(registry.is_anyone_ahead_of(TickId(0), &thresholds));
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = CompositionThresholds {
            compose_when_all_present_lead: 0,
            compose_regardless_lead: 2,
        };
        let mut registry = ParticipantRegistry::new(8);
        let a = registry.create(ConnectionId(1), 0, TickId(0)).unwrap();
        fill(&mut registry, a, 0..2);
        assert!(registry.is_anyone_ahead_of(TickId(0), &thresholds));
    }
}
