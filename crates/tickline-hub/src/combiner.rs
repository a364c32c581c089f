//! Splices buffered predicted steps into one authoritative tick

use crate::ParticipantRegistry;
use log::trace;
use tickline_core::TickId;
use tickline_netcode::{AuthoritativeStepRecord, CombinedAuthoritativeStep, ConnectState};

/// Counters kept by a [`StepCombiner`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombinerStats {
    /// Ticks composed
    pub composed: u64,
    /// Records carrying real input
    pub provided: u64,
    /// Records synthesised for missing input
    pub synthesised: u64,
}

/// Builds [`CombinedAuthoritativeStep`]s from the registry's queues
#[derive(Debug, Clone, Default)]
pub struct StepCombiner {
    stats: CombinerStats,
}

impl StepCombiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose `tick_id` with one record per registered participant
    ///
    /// A participant with a buffered step for the tick contributes it as
    /// `Normal`; everyone else gets an empty `StepNotProvidedInTime` (or
    /// `WaitingForReconnect`) record and a penalty. Every queue is then
    /// trimmed up to and including `tick_id`.
    pub fn compose_one_step(
        &mut self,
        registry: &mut ParticipantRegistry,
        tick_id: TickId,
    ) -> CombinedAuthoritativeStep {
        let mut combined = CombinedAuthoritativeStep::new(tick_id);
        for participant in registry.iter_mut() {
            let provided = participant
                .queue()
                .get(tick_id)
                .map(|step| step.payload().to_vec());

            let record = match provided {
                Some(payload) => {
                    self.stats.provided += 1;
                    AuthoritativeStepRecord::normal(payload)
                }
                None => {
                    self.stats.synthesised += 1;
                    participant.add_penalty();
                    let state = if participant.is_waiting_for_reconnect() {
                        ConnectState::WaitingForReconnect
                    } else {
                        ConnectState::StepNotProvidedInTime
                    };
                    trace!("{} has no step for {}", participant.id(), tick_id);
                    AuthoritativeStepRecord::synthesised(state)
                }
            };
            combined.insert(participant.id(), record);
            participant
                .queue_mut()
                .discard_up_to_and_excluding(tick_id.next());
        }
        self.stats.composed += 1;
        combined
    }

    pub fn stats(&self) -> CombinerStats {
        self.stats
    }
}
