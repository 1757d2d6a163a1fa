//! Non-authoritative input consumption
//!
//! Receives redundant input batches from the controlling peer and supplies
//! one record per local tick to the step function. Two orderings exist:
//!
//! - **Future**: records queue in arrival order behind an interpolation
//!   buffer and run strictly in that order. The server always consumes this
//!   way since it never replays.
//! - **Inserted**: records are written straight into the past of history so
//!   the next replay re-runs those ticks with the real input. History stays
//!   dense because every consumed tick commits a record, real or synthesized.

use crate::config::InputOrdering;
use crate::wire;
use crate::{ReplicationConfig, Result};
use rewind_core::{DeliveryClass, InputPayload, InputRecord, Tick};
use rewind_history::TickIndexedHistory;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Counters kept by a consumer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Records accepted from the network
    pub accepted: u64,
    /// Records discarded as stale or duplicate
    pub stale: u64,
    /// Queued records dropped by lossy catch-up or queue overflow
    pub skipped: u64,
    /// Filler records synthesized for ticks without input
    pub synthesized: u64,
}

/// Result of receiving one input message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Received {
    /// Newly accepted records
    pub accepted: usize,
    /// Records discarded as stale
    pub stale: usize,
    /// Records written into already-consumed ticks (inserted ordering only)
    pub late: usize,
}

/// Receives input batches and hands out one record per tick
#[derive(Debug)]
pub struct InputConsumer<T> {
    ordering: InputOrdering,
    /// Records not yet applied, ascending by tick
    queue: VecDeque<InputRecord<T>>,
    /// Oldest queued records are dropped beyond this
    queue_limit: usize,
    /// Applied records
    history: TickIndexedHistory<InputRecord<T>>,
    /// Server relays keep only this many applied records
    relay_limit: Option<usize>,
    channel: DeliveryClass,
    max_redundancy: u8,
    interpolation: usize,
    lossy_catchup: bool,
    /// Newest tick accepted from the network
    last_received: Option<Tick>,
    /// Tick of the last real record handed out
    last_ordered: Option<Tick>,
    /// Tick of the last record handed out, real or filler
    cursor: Option<Tick>,
    /// Sender's tick from the newest message
    last_sender_tick: Option<Tick>,
    /// Interpolation buffer has filled once
    primed: bool,
    stats: ConsumerStats,
}

impl<T: InputPayload> InputConsumer<T> {
    /// Consumer for a client, using the configured ordering
    pub fn new(config: &ReplicationConfig) -> Self {
        Self {
            ordering: config.ordering,
            queue: VecDeque::new(),
            queue_limit: config.history_capacity,
            history: TickIndexedHistory::new(config.history_capacity),
            relay_limit: None,
            channel: config.input_channel,
            max_redundancy: config.max_redundancy,
            interpolation: config.interpolation as usize,
            lossy_catchup: config.lossy_catchup,
            last_received: None,
            last_ordered: None,
            cursor: None,
            last_sender_tick: None,
            primed: false,
            stats: ConsumerStats::default(),
        }
    }

    /// Consumer for a server relay: always queued, history cut to the redundancy bound
    pub fn relay(config: &ReplicationConfig) -> Self {
        let mut consumer = Self::new(config);
        consumer.ordering = InputOrdering::Future;
        consumer.relay_limit = Some(config.redundancy as usize);
        consumer
    }

    /// Decode an input message body and merge its records
    ///
    /// Fails with a protocol violation when the batch is larger than
    /// `max_redundancy` or malformed; nothing is merged in that case.
    pub fn receive(&mut self, body: &[u8]) -> Result<Received> {
        let batch = wire::decode_inputs::<T>(body, self.max_redundancy)?;
        if let Some(sender_tick) = batch.sender_tick {
            self.last_sender_tick = Some(self.last_sender_tick.map_or(sender_tick, |t| t.max(sender_tick)));
        }

        let mut received = Received::default();
        for (tick, payload) in batch.records {
            let record = InputRecord::created(tick, payload, self.channel);
            let accepted = match self.ordering {
                InputOrdering::Future => self.enqueue(record),
                InputOrdering::Inserted => self.insert(record, &mut received),
            };
            if accepted {
                received.accepted += 1;
                self.last_received = Some(self.last_received.map_or(tick, |t| t.max(tick)));
            } else {
                received.stale += 1;
            }
        }

        self.enforce_queue_limit();
        self.stats.accepted += received.accepted as u64;
        self.stats.stale += received.stale as u64;
        if received.stale > 0 {
            trace!(stale = received.stale, "discarded stale input records");
        }
        Ok(received)
    }

    fn enforce_queue_limit(&mut self) {
        let excess = self.queue.len().saturating_sub(self.queue_limit);
        if excess == 0 {
            return;
        }
        for _ in 0..excess {
            self.queue.pop_front();
        }
        self.stats.skipped += excess as u64;
        debug!(dropped = excess, limit = self.queue_limit, "input queue overflow, oldest dropped");
    }

    fn enqueue(&mut self, record: InputRecord<T>) -> bool {
        if self.last_received.is_some_and(|last| record.tick <= last) {
            return false;
        }
        self.queue.push_back(record);
        true
    }

    fn insert(&mut self, record: InputRecord<T>, received: &mut Received) -> bool {
        let tick = record.tick;
        if self.history.first_tick().is_some_and(|first| tick < first) {
            return false;
        }
        if self.history.get(tick).is_some_and(|existing| existing.created) {
            return false;
        }

        if self.cursor.is_some_and(|cursor| tick <= cursor) {
            // Replaces the filler that ran for this tick; the next replay picks it up
            self.history.insert(record);
            received.late += 1;
            return true;
        }

        match self.queue.binary_search_by_key(&tick, |queued| queued.tick) {
            Ok(_) => false,
            Err(index) => {
                self.queue.insert(index, record);
                true
            }
        }
    }

    /// Record to step with for the local tick `current`
    ///
    /// The caller runs the step and then hands the record back through
    /// [`commit`](Self::commit).
    pub fn next(&mut self, current: Tick) -> InputRecord<T> {
        match self.ordering {
            InputOrdering::Future => self.next_queued(current),
            InputOrdering::Inserted => self.next_inserted(current),
        }
    }

    fn next_queued(&mut self, current: Tick) -> InputRecord<T> {
        if !self.primed {
            if self.queue.is_empty() || self.queue.len() < self.interpolation {
                return self.synthesize(current);
            }
            self.primed = true;
        }

        if self.lossy_catchup && self.queue.len() > self.interpolation.max(1) {
            if let Some(dropped) = self.queue.pop_front() {
                self.stats.skipped += 1;
                trace!(tick = %dropped.tick, queued = self.queue.len(), "lossy catch-up skipped input");
            }
        }

        match self.queue.pop_front() {
            Some(record) => {
                self.last_ordered = Some(record.tick);
                self.cursor = Some(record.tick);
                record
            }
            None => self.synthesize(current),
        }
    }

    fn next_inserted(&mut self, current: Tick) -> InputRecord<T> {
        // Anything that fell behind the cursor goes into the past of history
        while self.queue.front().is_some_and(|queued| queued.tick < current) {
            if let Some(late) = self.queue.pop_front() {
                self.history.insert(late);
            }
        }

        self.cursor = Some(current);
        if self.queue.front().is_some_and(|queued| queued.tick == current) {
            if let Some(record) = self.queue.pop_front() {
                self.last_ordered = Some(current);
                return record;
            }
        }
        if let Some(record) = self.history.get(current).filter(|r| r.created) {
            self.last_ordered = Some(current);
            return record.clone();
        }
        self.stats.synthesized += 1;
        InputRecord::synthesized(current, self.channel)
    }

    /// Filler for the tick after the last real one, without moving that cursor
    fn synthesize(&mut self, current: Tick) -> InputRecord<T> {
        let tick = self.last_ordered.map_or(current, Tick::next);
        self.cursor = Some(tick);
        self.stats.synthesized += 1;
        InputRecord::synthesized(tick, self.channel)
    }

    /// Move a stepped record into history
    pub fn commit(&mut self, record: InputRecord<T>) {
        // A filler before the first real record carries the local tick, not the sender's
        if !record.created && self.last_ordered.is_none() && self.ordering == InputOrdering::Future {
            return;
        }
        if record.created || self.history.get(record.tick).is_none() {
            self.history.insert(record);
        }
        if let Some(limit) = self.relay_limit {
            self.history.retain_newest(limit);
        }
    }

    /// Drop applied and queued records at or before a reconciled tick
    pub fn trim_through(&mut self, tick: Tick) -> usize {
        let mut removed = self.history.trim_through(tick);
        while self.queue.front().is_some_and(|queued| queued.tick <= tick) {
            self.queue.pop_front();
            removed += 1;
        }
        if removed > 0 {
            debug!(%tick, removed, "trimmed consumed input");
        }
        removed
    }

    /// Applied records
    pub fn history(&self) -> &TickIndexedHistory<InputRecord<T>> {
        &self.history
    }

    /// Records waiting to be applied
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Effective ordering
    pub fn ordering(&self) -> InputOrdering {
        self.ordering
    }

    /// Tick of the last real record handed out
    pub fn last_ordered(&self) -> Option<Tick> {
        self.last_ordered
    }

    /// Newest tick accepted from the network
    pub fn last_received(&self) -> Option<Tick> {
        self.last_received
    }

    /// Sender's tick from the newest message
    pub fn last_sender_tick(&self) -> Option<Tick> {
        self.last_sender_tick
    }

    /// Counters
    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }

    /// Forget all records and trackers
    pub fn reset(&mut self) {
        self.queue.clear();
        self.history.clear();
        self.last_received = None;
        self.last_ordered = None;
        self.cursor = None;
        self.last_sender_tick = None;
        self.primed = false;
    }
}
