//! Buffered records: per-tick inputs and state snapshots

use crate::{ReplicationState, Tick};
use serde::{Deserialize, Serialize};

/// Delivery guarantee of the channel a record travels on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeliveryClass {
    /// Guaranteed, ordered delivery
    Reliable,
    /// Best effort; may be lost or reordered
    #[default]
    Unreliable,
}

impl DeliveryClass {
    /// Whether this channel guarantees delivery
    pub fn is_reliable(self) -> bool {
        matches!(self, DeliveryClass::Reliable)
    }
}

/// Anything stored in a tick-indexed buffer
pub trait TickKeyed {
    /// The tick this entry belongs to
    fn tick(&self) -> Tick;
}

/// One tick of input for an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord<T> {
    /// Tick this input applies to
    pub tick: Tick,
    /// The input itself
    pub payload: T,
    /// `false` for fillers synthesized when no real input exists for the tick
    pub created: bool,
    /// Channel the record arrived on (or will be sent on)
    pub channel: DeliveryClass,
}

impl<T> InputRecord<T> {
    /// A record backed by real input
    pub fn created(tick: Tick, payload: T, channel: DeliveryClass) -> Self {
        Self {
            tick,
            payload,
            created: true,
            channel,
        }
    }

    /// A default filler for a tick with no real input
    pub fn synthesized(tick: Tick, channel: DeliveryClass) -> Self
    where
        T: Default,
    {
        Self {
            tick,
            payload: T::default(),
            created: false,
            channel,
        }
    }

    /// Replication state for running this record in the tick loop
    pub fn ticked_state(&self) -> ReplicationState {
        if self.created {
            ReplicationState::TICKED | ReplicationState::CREATED
        } else {
            ReplicationState::TICKED
        }
    }
}

impl<T> TickKeyed for InputRecord<T> {
    fn tick(&self) -> Tick {
        self.tick
    }
}

/// Full simulation state of an entity at a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    /// Tick after which this state was captured
    pub tick: Tick,
    /// The correction state
    pub state: S,
}

impl<S> Snapshot<S> {
    /// Create a new snapshot
    pub fn new(tick: Tick, state: S) -> Self {
        Self { tick, state }
    }
}

impl<S> TickKeyed for Snapshot<S> {
    fn tick(&self) -> Tick {
        self.tick
    }
}
