//! The simulated-entity seam
//!
//! Each entity type implements `SimulatedEntity` once. The engine calls it to
//! sample input, run the deterministic step, and build or apply corrections;
//! it never needs to know what the input or state look like.

use crate::{DeliveryClass, Outbox, ReplicationState, Target, Tick};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Input data carried per tick
///
/// `is_default` decides whether an input counts as a change worth resending.
/// Any `PartialEq` type gets the comparison against `Default::default()`.
pub trait InputPayload: Clone + Default + Serialize + DeserializeOwned {
    /// Whether this input carries no intent
    fn is_default(&self) -> bool;
}

impl<T> InputPayload for T
where
    T: Clone + Default + PartialEq + Serialize + DeserializeOwned,
{
    fn is_default(&self) -> bool {
        *self == T::default()
    }
}

/// Position and orientation, used to detect physical changes between ticks
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Position
    pub position: [f32; 3],
    /// Rotation quaternion (x, y, z, w)
    pub rotation: [f32; 4],
}

impl Pose {
    /// Pose at a position with identity rotation
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Whether any component differs from `other` by more than `tolerance`
    pub fn differs_from(&self, other: &Pose, tolerance: f32) -> bool {
        self.position
            .iter()
            .zip(other.position.iter())
            .chain(self.rotation.iter().zip(other.rotation.iter()))
            .any(|(a, b)| (a - b).abs() > tolerance)
    }
}

/// Context handed to every step
pub struct StepContext<'a> {
    tick: Tick,
    state: ReplicationState,
    outbox: &'a mut Outbox,
}

impl<'a> StepContext<'a> {
    /// Create a context for one step
    pub fn new(tick: Tick, state: ReplicationState, outbox: &'a mut Outbox) -> Self {
        Self {
            tick,
            state,
            outbox,
        }
    }

    /// Tick being simulated
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Why this step runs
    pub fn state(&self) -> ReplicationState {
        self.state
    }

    /// Whether this step is a replay
    pub fn is_replaying(&self) -> bool {
        self.state.is_replayed()
    }

    /// Emit a message from inside the step
    ///
    /// Dropped during replay; returns whether the message was queued.
    pub fn send(&mut self, target: Target, channel: DeliveryClass, bytes: Vec<u8>) -> bool {
        self.outbox.push(target, channel, bytes)
    }
}

/// An entity driven by the prediction engine
pub trait SimulatedEntity {
    /// Per-tick input
    type Input: InputPayload;
    /// Full correction state
    type Correction: Clone + Serialize + DeserializeOwned;

    /// Sample input for `tick` on the peer that controls the entity
    fn sample_input(&mut self, tick: Tick) -> Self::Input;

    /// Advance the simulation one tick with `input`
    ///
    /// Must be deterministic: the same state and input produce the same result
    /// on every peer and on every replay.
    fn step(&mut self, ctx: &mut StepContext<'_>, input: &Self::Input);

    /// Capture the current state as a correction
    fn build_correction(&self) -> Self::Correction;

    /// Restore state from a correction
    fn apply_correction(&mut self, correction: &Self::Correction);

    /// Current pose, for entities with a physical presence
    fn pose(&self) -> Option<Pose> {
        None
    }
}
