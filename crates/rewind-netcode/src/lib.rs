//! Rewind Netcode - Client-side prediction and server reconciliation
//!
//! This crate drives deterministic entities across one authoritative server
//! and any number of predicting clients:
//!
//! - **Input production**: the controlling peer records input every tick and
//!   resends changes redundantly over unreliable channels
//! - **Input consumption**: other peers queue or insert received input and
//!   step with real or synthesized records
//! - **Corrections**: the server periodically broadcasts full state
//! - **Alignment**: clients match corrections to their own recorded history
//! - **Replay**: clients rewind to the correction and re-simulate to the present
//!
//! # Architecture
//!
//! ```text
//! ┌──────────── Owner ────────────┐        ┌──────────── Server ───────────┐
//! │ InputProducer ──▶ step        │ input  │ InputConsumer ──▶ step        │
//! │      │            │           │───────▶│      │             │          │
//! │      ▼            ▼           │        │      ▼             ▼          │
//! │  history     local snapshots  │        │  forwarder   SnapshotProducer │
//! │      │            │           │ corr.  │      │             │          │
//! │      └──▶ SnapshotAligner ◀───┼────────┼──────┼─────────────┘          │
//! │               │               │        └──────┼────────────────────────┘
//! │               ▼               │               ▼
//! │      ReplayOrchestrator       │          Observers
//! └───────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use rewind_core::{EntityId, ManualClock, Ownership, PeerId};
//! use rewind_netcode::{MemoryNetwork, PredictionManager, ReplicationConfig, Sender};
//!
//! let network = MemoryNetwork::new();
//! let mut link = network.connect(PeerId(1));
//! let mut client = PredictionManager::new(ReplicationConfig::default());
//! client.register(EntityId(1), player, &Ownership::owned_by_me(PeerId(1)))?;
//!
//! let mut clock = ManualClock::new(60);
//! loop {
//!     for bytes in network.drain_client(PeerId(1)) {
//!         client.enqueue(Sender::Server, bytes);
//!     }
//!     client.run_tick(&clock, &mut link);
//!     clock.advance();
//! }
//! ```

mod aligner;
pub mod config;
mod consumer;
mod error;
mod manager;
mod memory;
mod prediction;
mod producer;
mod replay;
mod snapshot;
mod transport;
pub mod wire;

pub use aligner::{AlignError, AlignOutcome, Alignment, SnapshotAligner};
pub use config::{InputOrdering, ReplicationConfig, TickEstimate};
pub use consumer::{ConsumerStats, InputConsumer, Received};
pub use error::{Error, Result};
pub use manager::{PredictionManager, ReplicatedEntity, TickReport};
pub use memory::{MemoryError, MemoryNetwork, MemoryTransport};
pub use prediction::PredictedEntity;
pub use producer::{InputProducer, Produced};
pub use replay::{ReconcileStats, ReplayOrchestrator, ReplayReport};
pub use snapshot::SnapshotProducer;
pub use transport::{ChannelLimits, Sender, Transport};
pub use wire::MessageKind;

// Re-export history types used in public signatures
pub use rewind_history::{BufferStats, TickIndexedHistory};
