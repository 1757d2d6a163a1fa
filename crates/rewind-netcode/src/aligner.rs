//! Matching corrections against local history
//!
//! A predicting client records its own state after every simulated tick.
//! When a correction arrives (or a self-correction is estimated) the aligner
//! resolves the matching history entry, trims everything at or before it,
//! and hands the baseline to the replay loop.
//!
//! # Index resolution
//!
//! ```text
//! index = target - first_tick          out of range -> clear history
//! stored = history[index].tick
//! stored != target -> index += target - stored
//!                                      out of range -> clear history
//! ```
//!
//! A failed alignment is never fatal: local history is dropped and the next
//! correction starts fresh.

use crate::wire;
use crate::Result;
use rewind_core::{Snapshot, Tick};
use rewind_history::TickIndexedHistory;
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::{debug, trace};

/// Why a correction could not be matched to local history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignError {
    /// Nothing has been recorded locally
    NoHistory,
    /// The target lies before or after the recorded range
    OutOfRange { target: Tick, first: Tick, len: usize },
    /// Shifting by the stored tick's drift still missed the target
    Drifted { target: Tick, stored: Tick },
    /// The correction is further behind than the configured rewind limit
    TooOld { target: Tick, end: Tick },
}

impl fmt::Display for AlignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignError::NoHistory => write!(f, "no local history"),
            AlignError::OutOfRange { target, first, len } => {
                write!(f, "tick {target} outside history of {len} from {first}")
            }
            AlignError::Drifted { target, stored } => {
                write!(f, "tick {target} not found after shifting from {stored}")
            }
            AlignError::TooOld { target, end } => {
                write!(f, "tick {target} too far behind {end}")
            }
        }
    }
}

/// A correction matched to local history
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment<S> {
    /// State to restore before replaying
    pub snapshot: Snapshot<S>,
    /// Whether the baseline came from the authority
    pub authoritative: bool,
    /// Resolved history index before trimming
    pub index: usize,
    /// Whether the index had to be shifted
    pub shifted: bool,
}

/// Result of an alignment attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AlignOutcome<S> {
    Aligned(Alignment<S>),
    /// History was cleared; the authoritative correction, if any, is handed back
    Failed {
        reason: AlignError,
        correction: Option<Snapshot<S>>,
    },
}

/// Local snapshot history and received authoritative corrections
#[derive(Debug)]
pub struct SnapshotAligner<S> {
    local: TickIndexedHistory<Snapshot<S>>,
    /// Corrections not yet aligned, including ones ahead of local simulation
    incoming: TickIndexedHistory<Snapshot<S>>,
    last_authoritative: Option<Tick>,
    max_rewind: u64,
}

impl<S: Clone + DeserializeOwned> SnapshotAligner<S> {
    pub fn new(capacity: usize, max_rewind: u32) -> Self {
        Self {
            local: TickIndexedHistory::new(capacity),
            incoming: TickIndexedHistory::new(capacity),
            last_authoritative: None,
            max_rewind: u64::from(max_rewind),
        }
    }

    /// Store the locally simulated state for `tick`
    pub fn record_local(&mut self, tick: Tick, state: S) {
        self.local.insert(Snapshot::new(tick, state));
    }

    /// Decode a correction body; returns whether it was newer than anything seen
    pub fn receive(&mut self, body: &[u8]) -> Result<bool> {
        let snapshot: Snapshot<S> = wire::decode_correction(body)?;
        Ok(self.offer(snapshot))
    }

    /// Keep `snapshot` for alignment unless it is stale
    pub fn offer(&mut self, snapshot: Snapshot<S>) -> bool {
        let newest = self.incoming.last_tick().or(self.last_authoritative);
        if newest.is_some_and(|newest| snapshot.tick <= newest) {
            trace!(tick = %snapshot.tick, "discarded stale correction");
            return false;
        }
        self.incoming.insert(snapshot);
        true
    }

    fn take_correction(&mut self, end: Tick) -> Option<Snapshot<S>> {
        let correction = self.incoming.iter().filter(|s| s.tick <= end).last().cloned()?;
        self.incoming.trim_through(correction.tick);
        Some(correction)
    }

    /// Resolve the newest reachable correction, or an estimated tick, against history
    ///
    /// `end` is the last simulated tick. Corrections for ticks after `end`
    /// wait until local simulation reaches them. Returns `None` when there is
    /// nothing to reconcile this tick.
    pub fn align(&mut self, end: Tick, estimate: Option<Tick>) -> Option<AlignOutcome<S>> {
        let (target, correction) = match self.take_correction(end) {
            Some(snapshot) => {
                self.last_authoritative = Some(snapshot.tick);
                (snapshot.tick, Some(snapshot))
            }
            None => (estimate?, None),
        };

        if end.since(target).is_some_and(|behind| behind > self.max_rewind) {
            return Some(self.fail(AlignError::TooOld { target, end }, correction));
        }

        let (index, shifted) = match self.resolve(target) {
            Ok(resolved) => resolved,
            Err(reason) => return Some(self.fail(reason, correction)),
        };

        let authoritative = correction.is_some();
        let snapshot = match correction {
            Some(snapshot) => snapshot,
            None => match self.local.at(index) {
                Some(candidate) => candidate.clone(),
                None => return Some(self.fail(AlignError::NoHistory, None)),
            },
        };

        self.local.trim_through(target);
        debug!(%target, index, shifted, authoritative, "correction aligned");
        Some(AlignOutcome::Aligned(Alignment {
            snapshot,
            authoritative,
            index,
            shifted,
        }))
    }

    fn resolve(&self, target: Tick) -> std::result::Result<(usize, bool), AlignError> {
        let first = self.local.first_tick().ok_or(AlignError::NoHistory)?;
        let len = self.local.len();
        let in_range = |index: i64| index >= 0 && (index as usize) < len;

        let index = target.signed_diff(first);
        if !in_range(index) {
            return Err(AlignError::OutOfRange { target, first, len });
        }

        let stored = self.local.at(index as usize).map_or(target, |s| s.tick);
        if stored == target {
            return Ok((index as usize, false));
        }

        let shifted = index + target.signed_diff(stored);
        if in_range(shifted)
            && self
                .local
                .at(shifted as usize)
                .is_some_and(|s| s.tick == target)
        {
            return Ok((shifted as usize, true));
        }
        Err(AlignError::Drifted { target, stored })
    }

    fn fail(&mut self, reason: AlignError, correction: Option<Snapshot<S>>) -> AlignOutcome<S> {
        self.local.clear();
        AlignOutcome::Failed { reason, correction }
    }

    /// Local history, oldest first
    pub fn local(&self) -> &TickIndexedHistory<Snapshot<S>> {
        &self.local
    }

    /// Whether a correction is waiting to be aligned
    pub fn has_pending(&self) -> bool {
        !self.incoming.is_empty()
    }

    /// Tick of the newest authoritative correction aligned or attempted
    pub fn last_authoritative(&self) -> Option<Tick> {
        self.last_authoritative
    }

    /// Drop all history and trackers
    pub fn reset(&mut self) {
        self.local.clear();
        self.incoming.clear();
        self.last_authoritative = None;
    }
}
