//! Authoritative step production loop

use crate::{CompositionThresholds, ParticipantRegistry, Result, StepCombiner};
use log::debug;
use tickline_core::TickId;
use tickline_netcode::AuthoritativeStepQueue;

/// Composes ticks one at a time, never skipping one
#[derive(Debug, Clone)]
pub struct AuthoritativeStepProducer {
    next_tick_id: TickId,
    combiner: StepCombiner,
    thresholds: CompositionThresholds,
}

impl AuthoritativeStepProducer {
    /// Create a producer whose first composed tick is `first_tick_id`
    pub fn new(first_tick_id: TickId, thresholds: CompositionThresholds) -> Self {
        Self {
            next_tick_id: first_tick_id,
            combiner: StepCombiner::new(),
            thresholds,
        }
    }

    /// Compose ticks while the registry justifies it, returning how many
    ///
    /// Each composed tick is pushed to `queue`; a continuity failure there is
    /// fatal and stops production.
    pub fn produce(
        &mut self,
        registry: &mut ParticipantRegistry,
        queue: &mut AuthoritativeStepQueue,
    ) -> Result<usize> {
        let mut produced = 0;
        while registry.is_anyone_ahead_of(self.next_tick_id, &self.thresholds) {
            self.produce_one(registry, queue)?;
            produced += 1;
        }
        if produced > 0 {
            debug!(
                "Produced {} authoritative steps, next is {}",
                produced, self.next_tick_id
            );
        }
        Ok(produced)
    }

    /// Compose the next tick unconditionally
    pub fn produce_one(
        &mut self,
        registry: &mut ParticipantRegistry,
        queue: &mut AuthoritativeStepQueue,
    ) -> Result<TickId> {
        let tick_id = self.next_tick_id;
        let step = self.combiner.compose_one_step(registry, tick_id);
        queue.add(step)?;
        self.next_tick_id = tick_id.next();
        Ok(tick_id)
    }

    /// Tick the next composition will produce
    pub fn next_tick_id(&self) -> TickId {
        self.next_tick_id
    }

    pub fn combiner(&self) -> &StepCombiner {
        &self.combiner
    }

    pub fn thresholds(&self) -> &CompositionThresholds {
        &self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickline_core::ConnectionId;
    use tickline_netcode::PredictedStep;

    fn setup(
        first: TickId,
    ) -> (
        ParticipantRegistry,
        AuthoritativeStepQueue,
        AuthoritativeStepProducer,
    ) {
        (
            ParticipantRegistry::new(64),
            AuthoritativeStepQueue::new(60, first),
            AuthoritativeStepProducer::new(first, CompositionThresholds::default()),
        )
    }

    #[test]
    fn test_produces_down_to_threshold() {
        let (mut registry, mut queue, mut producer) = setup(TickId(0));
        let a = registry.create(ConnectionId(1), 0, TickId(0)).unwrap();
        let participant_queue = registry.get_mut(a).unwrap().queue_mut();
        for tick in 0..10 {
            participant_queue
                .add_predicted_step(PredictedStep::new(TickId(tick), vec![tick as u8]).unwrap())
                .unwrap();
        }

        // latest is 9: compose while 9 - t > 5, i.e. t = 0..=3
        assert_eq!(producer.produce(&mut registry, &mut queue).unwrap(), 4);
        assert_eq!(producer.next_tick_id(), TickId(4));
        assert_eq!(queue.range().unwrap().end, TickId(3));
        assert_eq!(queue.get(TickId(2)).unwrap().get(a).unwrap().payload, vec![2]);

        assert_eq!(producer.produce(&mut registry, &mut queue).unwrap(), 0);
    }

    #[test]
    fn test_straggler_gets_synthesised_records() {
        let (mut registry, mut queue, mut producer) = setup(TickId(100));
        let fast = registry.create(ConnectionId(1), 0, TickId(100)).unwrap();
        let slow = registry.create(ConnectionId(2), 0, TickId(100)).unwrap();
        let fast_queue = registry.get_mut(fast).unwrap().queue_mut();
        for tick in 100..120 {
            fast_queue
                .add_predicted_step(PredictedStep::new(TickId(tick), vec![]).unwrap())
                .unwrap();
        }

        // latest 119: composes while 119 - t > 15
        assert_eq!(producer.produce(&mut registry, &mut queue).unwrap(), 4);
        let step = queue.get(TickId(103)).unwrap();
        assert!(step.get(fast).unwrap().is_normal());
        assert!(!step.get(slow).unwrap().is_normal());
        assert_eq!(registry.get(slow).unwrap().penalty(), 4);
    }

    #[test]
    fn test_discontinuous_queue_is_fatal() {
        let mut registry = ParticipantRegistry::new(8);
        let mut queue = AuthoritativeStepQueue::new(8, TickId(0));
        let mut producer =
            AuthoritativeStepProducer::new(TickId(5), CompositionThresholds::default());
        registry.create(ConnectionId(1), 0, TickId(5)).unwrap();

        let error = producer.produce_one(&mut registry, &mut queue).unwrap_err();
        assert!(error.is_fatal());
        assert_eq!(producer.next_tick_id(), TickId(5));
    }
}
