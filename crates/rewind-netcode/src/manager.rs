//! Multi-entity registry and tick loop
//!
//! The manager owns every predicted entity of one peer, keyed by
//! `EntityId`. Inbound bytes are queued as they arrive and drained at a
//! single point per tick, before any entity steps:
//!
//! ```text
//! run_tick:
//!   drain inbox -> decode envelope -> dispatch (entity, kind)
//!   reconcile every entity
//!   tick every entity
//!   post-tick every entity
//!   flush outboxes -> transport
//! ```
//!
//! Entities are visited in registration order so every peer runs them in the
//! same sequence.

use crate::prediction::PredictedEntity;
use crate::replay::ReconcileStats;
use crate::transport::{ChannelLimits, Sender, Transport};
use crate::wire::{self, MessageKind};
use crate::{Error, ReplicationConfig, Result};
use indexmap::{IndexMap, IndexSet};
use rewind_core::{Clock, EntityId, Outbound, Ownership, PeerId, Role, RoleProvider, SimulatedEntity};
use std::any::Any;
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// Type-erased view of a `PredictedEntity`
pub trait ReplicatedEntity {
    fn id(&self) -> EntityId;
    fn role(&self) -> Role;
    fn receive(&mut self, sender: Sender, kind: MessageKind, body: &[u8]) -> Result<()>;
    fn reconcile(&mut self, clock: &dyn Clock);
    fn tick(&mut self, clock: &dyn Clock, limits: &ChannelLimits);
    fn post_tick(&mut self, clock: &dyn Clock);
    fn drain_outbox(&mut self) -> Vec<Outbound>;
    fn set_ownership(&mut self, ownership: &Ownership);
    fn reset(&mut self);
    fn stats(&self) -> ReconcileStats;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<E: SimulatedEntity + 'static> ReplicatedEntity for PredictedEntity<E> {
    fn id(&self) -> EntityId {
        PredictedEntity::id(self)
    }

    fn role(&self) -> Role {
        PredictedEntity::role(self)
    }

    fn receive(&mut self, sender: Sender, kind: MessageKind, body: &[u8]) -> Result<()> {
        PredictedEntity::receive(self, sender, kind, body)
    }

    fn reconcile(&mut self, clock: &dyn Clock) {
        PredictedEntity::reconcile(self, clock)
    }

    fn tick(&mut self, clock: &dyn Clock, limits: &ChannelLimits) {
        PredictedEntity::tick(self, clock, limits)
    }

    fn post_tick(&mut self, clock: &dyn Clock) {
        PredictedEntity::post_tick(self, clock)
    }

    fn drain_outbox(&mut self) -> Vec<Outbound> {
        PredictedEntity::drain_outbox(self)
    }

    fn set_ownership(&mut self, ownership: &Ownership) {
        PredictedEntity::set_ownership(self, ownership)
    }

    fn reset(&mut self) {
        PredictedEntity::reset(self)
    }

    fn stats(&self) -> ReconcileStats {
        PredictedEntity::stats(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// What one `run_tick` did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Inbound messages dispatched to an entity
    pub dispatched: usize,
    /// Inbound messages dropped (bad envelope, unknown entity, violation, kicked sender)
    pub rejected: usize,
    /// Clients disconnected this tick
    pub kicked: Vec<PeerId>,
    /// Outbound messages handed to the transport
    pub sent: usize,
    /// Outbound messages the transport refused
    pub send_failures: usize,
}

/// Registry of predicted entities for one peer
#[derive(Default)]
pub struct PredictionManager {
    entities: IndexMap<EntityId, Box<dyn ReplicatedEntity>>,
    inbox: VecDeque<(Sender, Vec<u8>)>,
    /// Clients disconnected for protocol violations
    kicked: IndexSet<PeerId>,
    config: ReplicationConfig,
}

impl PredictionManager {
    /// Create a manager whose entities default to `config`
    pub fn new(config: ReplicationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Register an entity with the manager's configuration
    pub fn register<E: SimulatedEntity + 'static>(
        &mut self,
        id: EntityId,
        entity: E,
        roles: &impl RoleProvider,
    ) -> Result<()> {
        let config = self.config.clone();
        self.register_with(id, entity, config, roles)
    }

    /// Register an entity with its own configuration
    pub fn register_with<E: SimulatedEntity + 'static>(
        &mut self,
        id: EntityId,
        entity: E,
        config: ReplicationConfig,
        roles: &impl RoleProvider,
    ) -> Result<()> {
        config.validate()?;
        if self.entities.contains_key(&id) {
            return Err(Error::Contract(format!("{id} registered twice")));
        }
        let predicted = PredictedEntity::new(id, entity, config, roles);
        debug!(entity = %id, role = ?predicted.role(), "entity registered");
        self.entities.insert(id, Box::new(predicted));
        Ok(())
    }

    /// Tear down an entity; its buffers are cleared before it is dropped
    pub fn remove(&mut self, id: EntityId) -> bool {
        match self.entities.shift_remove(&id) {
            Some(mut entity) => {
                entity.reset();
                debug!(entity = %id, "entity removed");
                true
            }
            None => false,
        }
    }

    /// Apply an ownership change to one entity
    pub fn set_ownership(&mut self, id: EntityId, ownership: &Ownership) -> Result<()> {
        let entity = self.entities.get_mut(&id).ok_or(Error::UnknownEntity(id))?;
        entity.set_ownership(ownership);
        Ok(())
    }

    /// Typed access to a registered entity
    pub fn get<E: SimulatedEntity + 'static>(&self, id: EntityId) -> Option<&PredictedEntity<E>> {
        self.entities.get(&id)?.as_any().downcast_ref()
    }

    /// Typed mutable access to a registered entity
    pub fn get_mut<E: SimulatedEntity + 'static>(
        &mut self,
        id: EntityId,
    ) -> Option<&mut PredictedEntity<E>> {
        self.entities.get_mut(&id)?.as_any_mut().downcast_mut()
    }

    /// Reconciliation counters of one entity
    pub fn stats(&self, id: EntityId) -> Option<ReconcileStats> {
        self.entities.get(&id).map(|entity| entity.stats())
    }

    /// Registered entity ids, in registration order
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Queue bytes delivered by the transport; they are processed by the next `run_tick`
    pub fn enqueue(&mut self, sender: Sender, bytes: Vec<u8>) {
        self.inbox.push_back((sender, bytes));
    }

    /// Clients disconnected for protocol violations
    pub fn kicked(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.kicked.iter().copied()
    }

    /// Run one full tick: receive, reconcile, step, post-tick, flush
    pub fn run_tick<T: Transport>(&mut self, clock: &dyn Clock, transport: &mut T) -> TickReport {
        let mut report = TickReport::default();
        self.drain_inbox(transport, &mut report);

        let limits = transport.limits();
        for entity in self.entities.values_mut() {
            entity.reconcile(clock);
        }
        for entity in self.entities.values_mut() {
            entity.tick(clock, &limits);
        }
        for entity in self.entities.values_mut() {
            entity.post_tick(clock);
        }

        self.flush(transport, &mut report);
        trace!(
            tick = %clock.current_tick(),
            dispatched = report.dispatched,
            sent = report.sent,
            "tick complete"
        );
        report
    }

    fn drain_inbox<T: Transport>(&mut self, transport: &mut T, report: &mut TickReport) {
        while let Some((sender, bytes)) = self.inbox.pop_front() {
            if sender.peer().is_some_and(|peer| self.kicked.contains(&peer)) {
                report.rejected += 1;
                continue;
            }

            match self.dispatch(sender, &bytes) {
                Ok(()) => report.dispatched += 1,
                Err(err) => {
                    report.rejected += 1;
                    match sender.peer() {
                        Some(peer) if err.is_protocol_violation() => {
                            warn!(%peer, error = %err, "protocol violation, disconnecting");
                            if let Err(e) = transport.disconnect(peer, &err.to_string()) {
                                warn!(%peer, error = %e, "disconnect failed");
                            }
                            self.kicked.insert(peer);
                            report.kicked.push(peer);
                        }
                        _ => debug!(?sender, error = %err, "inbound message dropped"),
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, sender: Sender, bytes: &[u8]) -> Result<()> {
        let (envelope, body) = wire::decode_envelope(bytes)?;
        let entity = self
            .entities
            .get_mut(&envelope.entity)
            .ok_or(Error::UnknownEntity(envelope.entity))?;
        entity.receive(sender, envelope.kind, body)
    }

    fn flush<T: Transport>(&mut self, transport: &mut T, report: &mut TickReport) {
        for entity in self.entities.values_mut() {
            for message in entity.drain_outbox() {
                match transport.send(message.target, message.channel, &message.bytes) {
                    Ok(()) => report.sent += 1,
                    Err(err) => {
                        report.send_failures += 1;
                        let err = Error::Transport(err.to_string());
                        warn!(entity = %entity.id(), error = %err, "message not sent");
                    }
                }
            }
        }
    }
}
