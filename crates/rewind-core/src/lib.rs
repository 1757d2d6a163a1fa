//! Rewind Core - Shared types for tick-indexed prediction and reconciliation
//!
//! This crate provides the vocabulary used by every other rewind crate:
//! - Discrete simulation time (`Tick`) and the `Clock` seam
//! - Replication flags passed to step functions (`ReplicationState`)
//! - Buffered data (`InputRecord`, `Snapshot`) and their delivery class
//! - Peer roles and the ownership provider seam (`Role`, `RoleProvider`)
//! - The `SimulatedEntity` trait implemented once per entity type
//! - The `Outbox` side-effect gate that silences replayed ticks
//!
//! ## Determinism
//!
//! Nothing in this crate reads wall-clock time. All timing is expressed in
//! ticks; `Clock` implementations decide how ticks map onto real time.

mod entity;
mod error;
mod identity;
mod outbox;
mod record;
mod role;
mod state;
pub mod time;

pub use entity::{InputPayload, Pose, SimulatedEntity, StepContext};
pub use error::{Error, Result};
pub use identity::{EntityId, PeerId};
pub use outbox::{Outbound, Outbox, Target};
pub use record::{DeliveryClass, InputRecord, Snapshot, TickKeyed};
pub use role::{Ownership, Role, RoleProvider};
pub use state::ReplicationState;
pub use time::{Clock, ManualClock, Tick};
