//! Authoritative-side input production
//!
//! The peer that controls an entity records one input per tick and decides
//! whether to put it on the wire. A change (non-default input or a physical
//! pose change) refills the resend budget; every send then carries the newest
//! records so a few lost packets never lose an input.

use crate::wire;
use crate::{ReplicationConfig, Result};
use rewind_core::{DeliveryClass, InputPayload, InputRecord, Pose, Tick};
use rewind_history::TickIndexedHistory;
use tracing::{trace, warn};

/// Outcome of producing one tick of input
#[derive(Debug, Default)]
pub struct Produced {
    /// The input counted as a change and refilled the resend budget
    pub changed: bool,
    /// Encoded input message to send, if any
    pub message: Option<Vec<u8>>,
}

/// Records authoritative input and builds redundant input messages
#[derive(Debug)]
pub struct InputProducer<T> {
    /// Produced input, oldest first
    history: TickIndexedHistory<InputRecord<T>>,
    /// Records per message and sends per change
    redundancy: u8,
    /// Channel input travels on
    channel: DeliveryClass,
    /// Sends left before going quiet
    remaining: u8,
    /// Value `remaining` is reset to on a change
    budget: u8,
    /// When relaying, keep only this many records
    relay_limit: Option<usize>,
    /// Pose seen on the previous tick
    last_pose: Option<Pose>,
    /// Pose delta treated as a change
    pose_tolerance: f32,
    /// Total messages produced
    sent: u64,
}

impl<T: InputPayload> InputProducer<T> {
    /// Producer for an owning peer that keeps history for replay
    pub fn new(config: &ReplicationConfig) -> Self {
        Self {
            history: TickIndexedHistory::new(config.history_capacity),
            redundancy: config.redundancy,
            channel: config.input_channel,
            remaining: 0,
            budget: config.resend_budget(config.input_channel),
            relay_limit: None,
            last_pose: None,
            pose_tolerance: config.pose_tolerance,
            sent: 0,
        }
    }

    /// Producer for a server that never replays; history is cut to the redundancy bound
    pub fn relay(config: &ReplicationConfig) -> Self {
        let mut producer = Self::new(config);
        producer.relay_limit = Some(config.redundancy as usize);
        producer
    }

    /// Record this tick's sampled input and build a message if one is due
    ///
    /// `max_payload` is the channel's size limit; messages that do not fit are
    /// rebuilt with fewer records.
    pub fn produce(
        &mut self,
        tick: Tick,
        payload: T,
        pose: Option<Pose>,
        max_payload: usize,
    ) -> Result<Produced> {
        let pose_changed = self.pose_changed(pose);
        let changed = !payload.is_default() || pose_changed;
        self.record(InputRecord::created(tick, payload, self.channel), changed);
        let message = self.flush(tick, max_payload)?;
        Ok(Produced { changed, message })
    }

    /// Relay a record consumed from another peer
    pub fn forward(
        &mut self,
        record: InputRecord<T>,
        current: Tick,
        max_payload: usize,
    ) -> Result<Produced> {
        // Fillers stay local; observers synthesize their own
        let changed = record.created && !record.payload.is_default();
        if record.created {
            self.record(record, changed);
        }
        let message = self.flush(current, max_payload)?;
        Ok(Produced { changed, message })
    }

    fn pose_changed(&mut self, pose: Option<Pose>) -> bool {
        let changed = match (self.last_pose, pose) {
            (Some(previous), Some(current)) => previous.differs_from(&current, self.pose_tolerance),
            _ => false,
        };
        self.last_pose = pose;
        changed
    }

    fn record(&mut self, mut record: InputRecord<T>, changed: bool) {
        if changed {
            self.refill();
        }
        record.channel = self.channel;
        self.history.insert(record);
        if let Some(limit) = self.relay_limit {
            self.history.retain_newest(limit);
        }
    }

    /// Refill the resend budget
    pub fn refill(&mut self) {
        self.remaining = self.budget;
    }

    fn flush(&mut self, sender_tick: Tick, max_payload: usize) -> Result<Option<Vec<u8>>> {
        if self.remaining == 0 || self.history.is_empty() {
            return Ok(None);
        }

        let mut count = (self.redundancy as usize).min(self.history.len());
        let mut bytes = wire::encode_inputs(Some(sender_tick), self.history.newest(count).collect::<Vec<_>>())?;
        while bytes.len() > max_payload && count > 1 {
            count -= 1;
            bytes = wire::encode_inputs(Some(sender_tick), self.history.newest(count).collect::<Vec<_>>())?;
        }
        if bytes.len() > max_payload {
            warn!(size = bytes.len(), max_payload, "single input record exceeds channel limit");
        }

        self.remaining -= 1;
        self.sent += 1;
        trace!(tick = %sender_tick, records = count, remaining = self.remaining, "input message built");
        Ok(Some(bytes))
    }

    /// Produced input, oldest first
    pub fn history(&self) -> &TickIndexedHistory<InputRecord<T>> {
        &self.history
    }

    /// Drop input at or before a reconciled tick
    pub fn trim_through(&mut self, tick: Tick) -> usize {
        self.history.trim_through(tick)
    }

    /// Sends left before going quiet
    pub fn remaining(&self) -> u8 {
        self.remaining
    }

    /// Total messages produced
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Channel input travels on
    pub fn channel(&self) -> DeliveryClass {
        self.channel
    }

    /// Forget all history and resend state
    pub fn reset(&mut self) {
        self.history.clear();
        self.remaining = 0;
        self.last_pose = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{decode_inputs, InputBatch};

    const LIMIT: usize = 1200;

    fn producer(redundancy: u8) -> InputProducer<i32> {
        InputProducer::new(&ReplicationConfig::default().with_redundancy(redundancy))
    }

    fn sent_ticks(message: &[u8]) -> Vec<u64> {
        let batch: InputBatch<i32> = decode_inputs(message, 8).unwrap();
        batch.records.iter().map(|(tick, _)| tick.raw()).collect()
    }

    #[test]
    fn test_redundant_resend_then_stop() {
        let mut producer = producer(3);
        let mut sent_at = Vec::new();

        for tick in 10..16 {
            let payload = if tick == 10 { 5 } else { 0 };
            let produced = producer.produce(Tick(tick), payload, None, LIMIT).unwrap();
            assert_eq!(produced.changed, tick == 10);
            if produced.message.is_some() {
                sent_at.push(tick);
            }
        }

        assert_eq!(sent_at, vec![10, 11, 12]);
        assert_eq!(producer.remaining(), 0);
        assert_eq!(producer.history().len(), 6);
    }

    #[test]
    fn test_message_carries_newest_records() {
        let mut producer = producer(3);
        let first = producer.produce(Tick(1), 1, None, LIMIT).unwrap();
        assert_eq!(sent_ticks(&first.message.unwrap()), vec![1]);

        producer.produce(Tick(2), 1, None, LIMIT).unwrap();
        let third = producer.produce(Tick(3), 1, None, LIMIT).unwrap();
        let fourth = producer.produce(Tick(4), 1, None, LIMIT).unwrap();
        assert_eq!(sent_ticks(&third.message.unwrap()), vec![1, 2, 3]);
        assert_eq!(sent_ticks(&fourth.message.unwrap()), vec![2, 3, 4]);
    }

    #[test]
    fn test_default_input_never_sent() {
        let mut producer = producer(3);
        for tick in 0..5 {
            let produced = producer.produce(Tick(tick), 0, None, LIMIT).unwrap();
            assert!(produced.message.is_none());
        }
        assert_eq!(producer.sent(), 0);
    }

    #[test]
    fn test_pose_change_counts_as_change() {
        let mut producer = producer(2);
        producer.produce(Tick(0), 0, Some(Pose::at([0.0; 3])), LIMIT).unwrap();
        let produced = producer
            .produce(Tick(1), 0, Some(Pose::at([0.5, 0.0, 0.0])), LIMIT)
            .unwrap();
        assert!(produced.changed);
        assert!(produced.message.is_some());
    }

    #[test]
    fn test_reliable_sends_once() {
        let config = ReplicationConfig {
            input_channel: DeliveryClass::Reliable,
            ..ReplicationConfig::default()
        };
        let mut producer: InputProducer<i32> = InputProducer::new(&config);
        assert!(producer.produce(Tick(0), 3, None, LIMIT).unwrap().message.is_some());
        assert!(producer.produce(Tick(1), 0, None, LIMIT).unwrap().message.is_none());
    }

    #[test]
    fn test_shrinks_to_fit_channel() {
        let mut producer = producer(3);
        producer.produce(Tick(1), 1, None, LIMIT).unwrap();
        producer.produce(Tick(2), 1, None, LIMIT).unwrap();
        let full = producer.produce(Tick(3), 1, None, LIMIT).unwrap().message.unwrap();

        let produced = producer.produce(Tick(4), 1, None, full.len() - 1).unwrap();
        let ticks = sent_ticks(&produced.message.unwrap());
        assert!(ticks.len() < 3);
        assert_eq!(ticks.last(), Some(&4));
    }

    #[test]
    fn test_relay_trims_to_redundancy() {
        let mut relay: InputProducer<i32> = InputProducer::relay(&ReplicationConfig::default());
        for tick in 0..10 {
            relay
                .forward(
                    InputRecord::created(Tick(tick), 1, DeliveryClass::Unreliable),
                    Tick(tick),
                    LIMIT,
                )
                .unwrap();
        }
        assert_eq!(relay.history().len(), 3);
        assert_eq!(relay.history().first_tick(), Some(Tick(7)));
    }

    #[test]
    fn test_forwarded_filler_is_not_a_change() {
        let mut relay: InputProducer<i32> = InputProducer::relay(&ReplicationConfig::default());
        let produced = relay
            .forward(InputRecord::synthesized(Tick(1), DeliveryClass::Unreliable), Tick(1), LIMIT)
            .unwrap();
        assert!(!produced.changed);
        assert!(produced.message.is_none());
    }

    #[test]
    fn test_forwarded_fillers_never_sent() {
        let mut relay: InputProducer<i32> = InputProducer::relay(&ReplicationConfig::default());
        relay
            .forward(InputRecord::created(Tick(5), 1, DeliveryClass::Unreliable), Tick(30), LIMIT)
            .unwrap();

        // Filler stamped with the relay's own clock
        let produced = relay
            .forward(InputRecord::synthesized(Tick(31), DeliveryClass::Unreliable), Tick(31), LIMIT)
            .unwrap();
        assert_eq!(sent_ticks(&produced.message.unwrap()), vec![5]);
        assert_eq!(relay.history().last_tick(), Some(Tick(5)));
    }

    #[test]
    fn test_reset() {
        let mut producer = producer(3);
        producer.produce(Tick(1), 1, None, LIMIT).unwrap();
        producer.reset();
        assert!(producer.history().is_empty());
        assert_eq!(producer.remaining(), 0);
    }
}
