//! Rewind History - Bounded, tick-ordered record buffer
//!
//! This crate provides the history used for both replicated inputs and local
//! state snapshots:
//!
//! - **Bounded memory**: oldest records are evicted once capacity is exceeded
//! - **O(1) lookup while dense**: a tick's index is `tick - first_tick` as long
//!   as the buffer has no gaps
//! - **Arbitrary insertion**: late records land in the middle, in tick order
//! - **Range trim**: drop everything up to a reconciled tick
//!
//! # Example
//!
//! ```rust
//! use rewind_core::{DeliveryClass, InputRecord, Tick};
//! use rewind_history::{TickIndexedHistory, TickSearch};
//!
//! let mut history = TickIndexedHistory::new(64);
//! for tick in [100, 101, 103] {
//!     history.insert(InputRecord::created(Tick(tick), 0u8, DeliveryClass::Unreliable));
//! }
//!
//! assert_eq!(history.find(Tick(101)), TickSearch::Exact(1));
//! assert_eq!(history.find(Tick(102)), TickSearch::InsertMiddle(2));
//! ```

use rewind_core::{Tick, TickKeyed};
use std::collections::VecDeque;

/// Where a tick sits relative to the records in a history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSearch {
    /// A record with this tick is stored at the index
    Exact(usize),
    /// The tick precedes every record (or the history is empty)
    InsertBeginning,
    /// The tick belongs before the record at the index
    InsertMiddle(usize),
    /// The tick follows every record
    InsertEnd,
}

impl TickSearch {
    /// Index of the exact match, if any
    pub fn exact(self) -> Option<usize> {
        match self {
            TickSearch::Exact(index) => Some(index),
            _ => None,
        }
    }
}

/// Ordered, capacity-bounded buffer of tick-keyed records
///
/// Records are strictly ascending by tick with no duplicates. Inserting a
/// record for a tick already present replaces the old one in place.
#[derive(Debug, Clone)]
pub struct TickIndexedHistory<R> {
    /// Records, oldest first
    records: VecDeque<R>,
    /// Maximum number of records retained
    capacity: usize,
}

impl<R: TickKeyed> TickIndexedHistory<R> {
    /// Create a history holding at most `capacity` records
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Locate `tick`
    ///
    /// Tries the direct index `tick - first_tick` first, which hits whenever
    /// the buffer is contiguous up to that point, then falls back to a scan.
    pub fn find(&self, tick: Tick) -> TickSearch {
        let Some(first) = self.records.front().map(TickKeyed::tick) else {
            return TickSearch::InsertBeginning;
        };

        if let Some(diff) = tick.since(first) {
            if let Ok(index) = usize::try_from(diff) {
                if self
                    .records
                    .get(index)
                    .is_some_and(|record| record.tick() == tick)
                {
                    return TickSearch::Exact(index);
                }
            }
        }

        self.find_brute(tick, first)
    }

    fn find_brute(&self, tick: Tick, first: Tick) -> TickSearch {
        if tick < first {
            return TickSearch::InsertBeginning;
        }
        let last = self.records.back().map(TickKeyed::tick).unwrap_or(first);
        if tick > last {
            return TickSearch::InsertEnd;
        }

        for (index, record) in self.records.iter().enumerate() {
            let stored = record.tick();
            if stored == tick {
                return TickSearch::Exact(index);
            }
            if stored > tick {
                return TickSearch::InsertMiddle(index);
            }
        }
        TickSearch::InsertEnd
    }

    /// Store a record at its tick position
    ///
    /// Replaces an existing record for the same tick, then evicts the oldest
    /// records beyond capacity. Returns where the record was placed.
    pub fn insert(&mut self, record: R) -> TickSearch {
        let placement = self.find(record.tick());
        match placement {
            TickSearch::Exact(index) => self.records[index] = record,
            TickSearch::InsertBeginning => self.records.push_front(record),
            TickSearch::InsertMiddle(index) => self.records.insert(index, record),
            TickSearch::InsertEnd => self.records.push_back(record),
        }
        self.enforce_capacity();
        placement
    }

    fn enforce_capacity(&mut self) {
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    /// Get the record for `tick`
    pub fn get(&self, tick: Tick) -> Option<&R> {
        self.find(tick).exact().and_then(|index| self.records.get(index))
    }

    /// Get the record for `tick` mutably
    pub fn get_mut(&mut self, tick: Tick) -> Option<&mut R> {
        let index = self.find(tick).exact()?;
        self.records.get_mut(index)
    }

    /// Get the record at `index` (0 is oldest)
    pub fn at(&self, index: usize) -> Option<&R> {
        self.records.get(index)
    }

    /// Oldest record
    pub fn first(&self) -> Option<&R> {
        self.records.front()
    }

    /// Newest record
    pub fn last(&self) -> Option<&R> {
        self.records.back()
    }

    /// Tick of the oldest record
    pub fn first_tick(&self) -> Option<Tick> {
        self.records.front().map(TickKeyed::tick)
    }

    /// Tick of the newest record
    pub fn last_tick(&self) -> Option<Tick> {
        self.records.back().map(TickKeyed::tick)
    }

    /// Remove every record at or before `tick`; returns how many were removed
    pub fn trim_through(&mut self, tick: Tick) -> usize {
        let mut removed = 0;
        while self.records.front().is_some_and(|r| r.tick() <= tick) {
            self.records.pop_front();
            removed += 1;
        }
        removed
    }

    /// Keep only the newest `count` records; returns how many were removed
    pub fn retain_newest(&mut self, count: usize) -> usize {
        let excess = self.records.len().saturating_sub(count);
        self.records.drain(..excess);
        excess
    }

    /// The newest `count` records, oldest first
    pub fn newest(&self, count: usize) -> impl Iterator<Item = &R> {
        let skip = self.records.len().saturating_sub(count);
        self.records.iter().skip(skip)
    }

    /// All records, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records.iter()
    }

    /// Records with a tick strictly after `tick`
    pub fn iter_after(&self, tick: Tick) -> impl Iterator<Item = &R> {
        self.records.iter().filter(move |r| r.tick() > tick)
    }

    /// Whether every tick between the oldest and newest record is present
    pub fn is_contiguous(&self) -> bool {
        match (self.first_tick(), self.last_tick()) {
            (Some(first), Some(last)) => {
                last.since(first).map(|span| span + 1) == Some(self.records.len() as u64)
            }
            _ => true,
        }
    }

    /// Remove all records
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Change the capacity, evicting the oldest records if needed
    pub fn set_capacity(&mut self, capacity: usize) {
        assert!(capacity > 0, "Capacity must be greater than 0");
        self.capacity = capacity;
        self.enforce_capacity();
    }

    /// Maximum number of records retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records stored
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are stored
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get statistics about the buffer
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            capacity: self.capacity,
            count: self.records.len(),
            oldest_tick: self.first_tick(),
            newest_tick: self.last_tick(),
        }
    }
}

impl<R: TickKeyed> Default for TickIndexedHistory<R> {
    fn default() -> Self {
        Self::new(128) // ~2 seconds at 60 ticks per second
    }
}

/// Statistics about a history buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    /// Maximum capacity
    pub capacity: usize,
    /// Current number of stored records
    pub count: usize,
    /// Oldest tick in the buffer
    pub oldest_tick: Option<Tick>,
    /// Newest tick in the buffer
    pub newest_tick: Option<Tick>,
}

impl BufferStats {
    /// Ticks spanned by the buffer (newest - oldest)
    pub fn tick_span(&self) -> u64 {
        match (self.oldest_tick, self.newest_tick) {
            (Some(oldest), Some(newest)) => newest.since(oldest).unwrap_or(0),
            _ => 0,
        }
    }

    /// Get the fill percentage (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f32 {
        self.count as f32 / self.capacity as f32
    }
}
