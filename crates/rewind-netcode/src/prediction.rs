//! Per-entity prediction driver
//!
//! `PredictedEntity` wires the producers, consumer, aligner, and replay loop
//! around one `SimulatedEntity` and runs them in a fixed phase order every
//! tick:
//!
//! 1. `receive` - buffered inbound messages are merged
//! 2. `reconcile` - a pending correction is aligned and replayed, atomically
//! 3. `tick` - input is produced or consumed, then the entity steps
//! 4. `post_tick` - the local snapshot is recorded, corrections are produced
//! 5. outbox drained to the transport by the caller
//!
//! Which components run depends on the resolved [`Role`].

use crate::aligner::{AlignOutcome, SnapshotAligner};
use crate::consumer::InputConsumer;
use crate::producer::InputProducer;
use crate::replay::{ReconcileStats, ReplayOrchestrator};
use crate::snapshot::SnapshotProducer;
use crate::transport::{ChannelLimits, Sender};
use crate::wire::{self, MessageKind};
use crate::{Error, ReplicationConfig, Result, TickEstimate};
use rewind_core::{
    Clock, DeliveryClass, EntityId, Outbound, Outbox, Ownership, ReplicationState, Role,
    RoleProvider, SimulatedEntity, StepContext, Target, Tick,
};
use tracing::{debug, error, warn};

/// One entity under prediction and reconciliation
pub struct PredictedEntity<E: SimulatedEntity> {
    id: EntityId,
    entity: E,
    config: ReplicationConfig,
    ownership: Ownership,
    role: Role,
    /// Input sampled locally (owner, server authority)
    producer: InputProducer<E::Input>,
    /// Input received from the controlling peer (server relay, observer)
    consumer: InputConsumer<E::Input>,
    /// Re-sends consumed input to observers (server relay)
    forwarder: InputProducer<E::Input>,
    corrections: SnapshotProducer,
    aligner: SnapshotAligner<E::Correction>,
    replay: ReplayOrchestrator,
    outbox: Outbox,
    /// Tick of the most recent step, in the controlling peer's timeline
    last_step_tick: Option<Tick>,
    stats: ReconcileStats,
}

impl<E: SimulatedEntity> PredictedEntity<E> {
    /// Wrap `entity` with the role resolved from `roles`
    pub fn new(id: EntityId, entity: E, config: ReplicationConfig, roles: &impl RoleProvider) -> Self {
        let (ownership, role) = Self::resolve(roles);
        Self {
            id,
            entity,
            producer: Self::producer_for(&config, role),
            consumer: Self::consumer_for(&config, role),
            forwarder: InputProducer::relay(&config),
            corrections: SnapshotProducer::new(&config),
            aligner: SnapshotAligner::new(config.snapshot_capacity, config.max_rewind),
            replay: ReplayOrchestrator::new(),
            outbox: Outbox::new(),
            last_step_tick: None,
            stats: ReconcileStats::default(),
            config,
            ownership,
            role,
        }
    }

    /// The provider's role, and its owner only while the provider reports it valid
    fn resolve(roles: &impl RoleProvider) -> (Ownership, Role) {
        let ownership = Ownership {
            server: roles.is_server(),
            local_authority: roles.is_local_authority(),
            owner: roles.owner().filter(|_| roles.is_owner_valid()),
        };
        (ownership, roles.role())
    }

    fn producer_for(config: &ReplicationConfig, role: Role) -> InputProducer<E::Input> {
        if role.is_server() {
            InputProducer::relay(config)
        } else {
            InputProducer::new(config)
        }
    }

    fn consumer_for(config: &ReplicationConfig, role: Role) -> InputConsumer<E::Input> {
        if role.is_server() {
            InputConsumer::relay(config)
        } else {
            InputConsumer::new(config)
        }
    }

    /// Merge one inbound message addressed to this entity
    ///
    /// Messages a client is not allowed to send are protocol violations;
    /// unexpected messages from the server are ignored.
    pub fn receive(&mut self, sender: Sender, kind: MessageKind, body: &[u8]) -> Result<()> {
        let owner = self.ownership.owner.map(Sender::Client);
        match (kind, self.role) {
            (MessageKind::Input, Role::ServerRelay) if Some(sender) == owner => {
                self.consumer.receive(body)?;
            }
            (MessageKind::Input, Role::Observer) if sender == Sender::Server => {
                self.consumer.receive(body)?;
            }
            (MessageKind::Correction, Role::Owner | Role::Observer) if sender == Sender::Server => {
                self.aligner.receive(body)?;
            }
            _ if sender.is_untrusted() => {
                return Err(Error::protocol(format!(
                    "{kind:?} from {sender:?} not accepted for {} as {:?}",
                    self.id, self.role
                )));
            }
            _ => {
                debug!(entity = %self.id, ?kind, role = ?self.role, "ignored unexpected message");
            }
        }
        Ok(())
    }

    /// Align a pending correction (or an estimated tick) and replay
    pub fn reconcile(&mut self, clock: &dyn Clock) {
        if !self.role.replays() {
            return;
        }
        let Some(end) = self.last_step_tick else {
            return;
        };

        let estimate = match self.config.tick_estimate {
            TickEstimate::Disabled => None,
            TickEstimate::Fixed(ticks) => end.checked_back(u64::from(ticks)).ok(),
            TickEstimate::RoundTrip => end.checked_back(clock.round_trip_ticks()).ok(),
        };

        match self.aligner.align(end, estimate) {
            None => {}
            Some(AlignOutcome::Aligned(alignment)) => {
                let target = alignment.snapshot.tick;
                let local_authority = self.role == Role::Owner;
                let inputs = if local_authority {
                    self.producer.trim_through(target);
                    self.producer.history()
                } else {
                    self.consumer.trim_through(target);
                    self.consumer.history()
                };

                let aligner = &mut self.aligner;
                let report = self.replay.run(
                    &mut self.entity,
                    &alignment.snapshot,
                    inputs,
                    end,
                    local_authority,
                    &mut self.outbox,
                    |tick, entity| aligner.record_local(tick, entity.build_correction()),
                );
                self.stats.record(&report, alignment.authoritative);
            }
            Some(AlignOutcome::Failed { reason, correction }) => {
                self.stats.alignment_failures += 1;
                self.stats.history_clears += 1;
                warn!(entity = %self.id, %reason, "correction not aligned, local history cleared");

                if let Some(snapshot) = correction.filter(|_| self.config.snap_when_unaligned) {
                    self.entity.apply_correction(&snapshot.state);
                    self.stats.snaps += 1;
                    debug!(entity = %self.id, tick = %snapshot.tick, "snapped to correction");
                }
            }
        }
    }

    /// Produce or consume this tick's input and step the entity
    pub fn tick(&mut self, clock: &dyn Clock, limits: &ChannelLimits) {
        let current = clock.current_tick();
        match self.role {
            Role::Owner | Role::ServerAuthority => self.tick_authoritative(current, limits),
            Role::ServerRelay | Role::Observer => self.tick_consumer(current, limits),
        }
    }

    fn tick_authoritative(&mut self, current: Tick, limits: &ChannelLimits) {
        let input = self.entity.sample_input(current);
        let pose = self.entity.pose();
        let max_payload = self.body_limit(limits, self.producer.channel());

        match self.producer.produce(current, input.clone(), pose, max_payload) {
            Ok(produced) => {
                if produced.changed {
                    self.corrections.mark_changed();
                }
                let target = match self.role {
                    Role::Owner => Some(Target::Server),
                    _ if self.config.state_forwarding => Some(Target::Observers { except: None }),
                    _ => None,
                };
                if let (Some(body), Some(target)) = (produced.message, target) {
                    self.send(target, self.producer.channel(), MessageKind::Input, &body);
                }
            }
            Err(err) => error!(entity = %self.id, error = %err, "input not produced"),
        }

        self.step(current, ReplicationState::TICKED | ReplicationState::CREATED, &input);
    }

    fn tick_consumer(&mut self, current: Tick, limits: &ChannelLimits) {
        let record = self.consumer.next(current);
        self.step(record.tick, record.ticked_state(), &record.payload);

        if self.role == Role::ServerRelay && self.config.state_forwarding {
            let max_payload = self.body_limit(limits, self.forwarder.channel());
            match self.forwarder.forward(record.clone(), current, max_payload) {
                Ok(produced) => {
                    if produced.changed {
                        self.corrections.mark_changed();
                    }
                    if let Some(body) = produced.message {
                        let except = self.ownership.owner;
                        self.send(Target::Observers { except }, self.forwarder.channel(), MessageKind::Input, &body);
                    }
                }
                Err(err) => error!(entity = %self.id, error = %err, "input not forwarded"),
            }
        }

        self.consumer.commit(record);
    }

    /// Channel limit left for an input body once the envelope is added
    fn body_limit(&self, limits: &ChannelLimits, channel: DeliveryClass) -> usize {
        let header = wire::envelope_len(self.id, MessageKind::Input).unwrap_or(0);
        limits.for_channel(channel).saturating_sub(header)
    }

    fn step(&mut self, tick: Tick, state: ReplicationState, input: &E::Input) {
        let mut ctx = StepContext::new(tick, state, &mut self.outbox);
        self.entity.step(&mut ctx, input);
        self.last_step_tick = Some(tick);
    }

    /// Record the local snapshot and produce a correction if one is due
    pub fn post_tick(&mut self, clock: &dyn Clock) {
        let Some(tick) = self.last_step_tick else {
            return;
        };

        if self.role.replays() {
            self.aligner.record_local(tick, self.entity.build_correction());
        }

        // A relay has nothing authoritative to say until the owner's input arrives
        let idle_relay = self.role == Role::ServerRelay && self.consumer.last_ordered().is_none();
        if self.role.is_server() && !idle_relay {
            let target = if self.config.state_forwarding {
                Some(Target::Observers { except: None })
            } else {
                self.ownership.owner.map(Target::Peer)
            };
            let Some(target) = target else {
                return;
            };
            let state = self.entity.build_correction();
            match self.corrections.produce(clock.current_tick(), tick, &state) {
                Ok(Some(body)) => {
                    self.send(target, self.corrections.channel(), MessageKind::Correction, &body)
                }
                Ok(None) => {}
                Err(err) => error!(entity = %self.id, error = %err, "correction not produced"),
            }
        }
    }

    fn send(&mut self, target: Target, channel: DeliveryClass, kind: MessageKind, body: &[u8]) {
        match wire::encode_envelope(self.id, kind, body) {
            Ok(bytes) => {
                self.outbox.push(target, channel, bytes);
            }
            Err(err) => error!(entity = %self.id, error = %err, "envelope not encoded"),
        }
    }

    /// Take everything queued for the transport
    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        self.outbox.drain().collect()
    }

    /// Apply an ownership change: every buffer and tracker starts over
    pub fn set_ownership(&mut self, roles: &impl RoleProvider) {
        let (ownership, role) = Self::resolve(roles);
        if role != self.role {
            debug!(entity = %self.id, from = ?self.role, to = ?role, "role changed");
        }
        self.ownership = ownership;
        self.role = role;
        self.producer = Self::producer_for(&self.config, role);
        self.consumer = Self::consumer_for(&self.config, role);
        self.reset();
    }

    /// Clear all buffers, resend counters, and last-seen trackers
    pub fn reset(&mut self) {
        self.producer.reset();
        self.consumer.reset();
        self.forwarder.reset();
        self.corrections.reset();
        self.aligner.reset();
        self.outbox.clear();
        self.last_step_tick = None;
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut E {
        &mut self.entity
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }

    /// Tick of the most recent step
    pub fn last_step_tick(&self) -> Option<Tick> {
        self.last_step_tick
    }

    pub fn producer(&self) -> &InputProducer<E::Input> {
        &self.producer
    }

    pub fn consumer(&self) -> &InputConsumer<E::Input> {
        &self.consumer
    }

    pub fn aligner(&self) -> &SnapshotAligner<E::Correction> {
        &self.aligner
    }

    /// Whether a replay pass is running
    pub fn is_replaying(&self) -> bool {
        self.replay.is_replaying()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InputOrdering;
    use rewind_core::{ManualClock, PeerId, Snapshot};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default)]
    struct Walker {
        x: i32,
        script: Vec<(u64, i32)>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Walk {
        dx: i32,
    }

    impl SimulatedEntity for Walker {
        type Input = Walk;
        type Correction = i32;

        fn sample_input(&mut self, tick: Tick) -> Walk {
            let dx = self
                .script
                .iter()
                .find(|(t, _)| *t == tick.raw())
                .map_or(0, |(_, dx)| *dx);
            Walk { dx }
        }

        fn step(&mut self, _ctx: &mut StepContext<'_>, input: &Walk) {
            self.x += input.dx;
        }

        fn build_correction(&self) -> i32 {
            self.x
        }

        fn apply_correction(&mut self, correction: &i32) {
            self.x = *correction;
        }
    }

    fn walker(script: &[(u64, i32)]) -> Walker {
        Walker {
            x: 0,
            script: script.to_vec(),
        }
    }

    fn run_tick(entity: &mut PredictedEntity<Walker>, clock: &ManualClock) {
        entity.reconcile(clock);
        entity.tick(clock, &ChannelLimits::default());
        entity.post_tick(clock);
    }

    fn correction(tick: u64, x: i32) -> Vec<u8> {
        wire::encode_correction(Tick(tick), &x).unwrap()
    }

    #[test]
    fn test_owner_sends_input_to_server() {
        let mut owner = PredictedEntity::new(
            EntityId(1),
            walker(&[(0, 2)]),
            ReplicationConfig::default(),
            &Ownership::owned_by_me(PeerId(1)),
        );
        assert_eq!(owner.role(), Role::Owner);

        let clock = ManualClock::default();
        run_tick(&mut owner, &clock);

        let sent = owner.drain_outbox();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, Target::Server);
        let (envelope, _) = wire::decode_envelope(&sent[0].bytes).unwrap();
        assert_eq!(envelope.kind, MessageKind::Input);
        assert_eq!(owner.entity().x, 2);
        assert_eq!(owner.aligner().local().len(), 1);
    }

    #[test]
    fn test_owner_replays_after_correction() {
        let mut owner = PredictedEntity::new(
            EntityId(1),
            walker(&[(1, 1), (2, 1), (3, 1), (4, 1)]),
            ReplicationConfig::default(),
            &Ownership::owned_by_me(PeerId(1)),
        );
        let mut clock = ManualClock::default();
        for _ in 0..5 {
            run_tick(&mut owner, &clock);
            clock.advance();
        }
        assert_eq!(owner.entity().x, 4);

        // Server says x was 10 after tick 2; ticks 3 and 4 replay on top
        owner.receive(Sender::Server, MessageKind::Correction, &correction(2, 10)).unwrap();
        owner.reconcile(&clock);

        assert_eq!(owner.entity().x, 12);
        assert_eq!(owner.stats().corrections, 1);
        assert_eq!(owner.stats().replayed_ticks, 2);
        assert_eq!(owner.producer().history().first_tick(), Some(Tick(3)));
        assert_eq!(owner.aligner().local().first_tick(), Some(Tick(3)));
        assert!(owner.drain_outbox().iter().all(|m| m.target == Target::Server));
    }

    #[test]
    fn test_client_sending_corrections_is_violation() {
        let mut server = PredictedEntity::new(
            EntityId(1),
            walker(&[]),
            ReplicationConfig::default(),
            &Ownership::server_for(PeerId(4)),
        );
        assert_eq!(server.role(), Role::ServerRelay);

        let err = server
            .receive(Sender::Client(PeerId(4)), MessageKind::Correction, &correction(1, 1))
            .unwrap_err();
        assert!(err.is_protocol_violation());

        // Input from a client that does not own the entity
        let err = server
            .receive(Sender::Client(PeerId(9)), MessageKind::Input, &[])
            .unwrap_err();
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn test_server_relay_consumes_and_corrects() {
        let config = ReplicationConfig::default().with_interpolation(1);
        let mut server = PredictedEntity::new(EntityId(1), walker(&[]), config, &Ownership::server_for(PeerId(4)));

        let records = [rewind_core::InputRecord::created(Tick(7), Walk { dx: 3 }, DeliveryClass::Unreliable)];
        let body = wire::encode_inputs(Some(Tick(7)), &records).unwrap();
        server.receive(Sender::Client(PeerId(4)), MessageKind::Input, &body).unwrap();

        let clock = ManualClock::default().starting_at(Tick(9));
        run_tick(&mut server, &clock);
        assert_eq!(server.entity().x, 3);
        assert_eq!(server.last_step_tick(), Some(Tick(7)));

        let sent = server.drain_outbox();
        let kinds: Vec<_> = sent
            .iter()
            .map(|m| (wire::decode_envelope(&m.bytes).unwrap().0.kind, m.target))
            .collect();
        assert!(kinds.contains(&(MessageKind::Input, Target::Observers { except: Some(PeerId(4)) })));
        assert!(kinds.contains(&(MessageKind::Correction, Target::Observers { except: None })));

        let correction = sent
            .iter()
            .find_map(|m| match wire::decode_envelope(&m.bytes).unwrap() {
                (envelope, body) if envelope.kind == MessageKind::Correction => {
                    Some(wire::decode_correction::<i32>(body).unwrap())
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(correction, Snapshot::new(Tick(7), 3));
    }

    fn input_ticks(sent: &[Outbound]) -> Vec<Vec<u64>> {
        sent.iter()
            .filter_map(|m| match wire::decode_envelope(&m.bytes).unwrap() {
                (envelope, body) if envelope.kind == MessageKind::Input => {
                    let batch = wire::decode_inputs::<Walk>(body, 8).unwrap();
                    Some(batch.records.iter().map(|(tick, _)| tick.raw()).collect())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_relay_with_offset_clock_forwards_owner_ticks_only() {
        let mut server = PredictedEntity::new(
            EntityId(1),
            walker(&[]),
            ReplicationConfig::default(),
            &Ownership::server_for(PeerId(4)),
        );
        let mut observer: InputConsumer<Walk> = InputConsumer::new(&ReplicationConfig::default());

        // Server clock runs 20 ticks ahead of the owner's
        let mut clock = ManualClock::default().starting_at(Tick(20));
        let mut forwarded = Vec::new();
        for tick in 0..8u64 {
            let records: Vec<_> = (tick.saturating_sub(2)..=tick)
                .map(|t| rewind_core::InputRecord::created(Tick(t), Walk { dx: 1 }, DeliveryClass::Unreliable))
                .collect();
            let body = wire::encode_inputs(Some(Tick(tick)), &records).unwrap();
            server.receive(Sender::Client(PeerId(4)), MessageKind::Input, &body).unwrap();
            run_tick(&mut server, &clock);
            clock.advance();

            for message in server.drain_outbox() {
                let (envelope, body) = wire::decode_envelope(&message.bytes).unwrap();
                if envelope.kind == MessageKind::Input {
                    observer.receive(body).unwrap();
                    forwarded.push(message);
                }
            }
        }

        let batches = input_ticks(&forwarded);
        assert!(!batches.is_empty());
        assert!(batches.iter().flatten().all(|&t| t < 8));
        assert!(server.consumer().history().iter().all(|r| r.created && r.tick < Tick(8)));
        // Every owner tick the relay consumed reaches the observer
        assert_eq!(observer.stats().accepted, 7);
        assert_eq!(observer.last_received(), Some(Tick(6)));
    }

    #[test]
    fn test_outbound_input_fits_channel_limit() {
        // Any limit that fits one record plus the envelope
        for limit in 12..40 {
            let mut owner = PredictedEntity::new(
                EntityId(300),
                walker(&[(0, 1), (1, -70), (2, 900), (3, 1)]),
                ReplicationConfig::default(),
                &Ownership::owned_by_me(PeerId(1)),
            );
            let limits = ChannelLimits {
                reliable: 64 * 1024,
                unreliable: limit,
            };
            let mut clock = ManualClock::default();
            for _ in 0..4 {
                owner.tick(&clock, &limits);
                owner.post_tick(&clock);
                clock.advance();

                let sent = owner.drain_outbox();
                assert_eq!(sent.len(), 1);
                assert!(sent[0].bytes.len() <= limit, "{} bytes over limit {limit}", sent[0].bytes.len());
            }
        }
    }

    /// Host that still reports a departed owner
    struct StaleOwner;

    impl RoleProvider for StaleOwner {
        fn is_local_authority(&self) -> bool {
            false
        }

        fn is_server(&self) -> bool {
            true
        }

        fn is_owner_valid(&self) -> bool {
            false
        }

        fn owner(&self) -> Option<PeerId> {
            Some(PeerId(4))
        }
    }

    #[test]
    fn test_invalid_owner_resolves_to_authority() {
        let mut server = PredictedEntity::new(EntityId(1), walker(&[]), ReplicationConfig::default(), &StaleOwner);
        assert_eq!(server.role(), Role::ServerAuthority);

        // Input from the stale owner is no longer accepted
        let err = server
            .receive(Sender::Client(PeerId(4)), MessageKind::Input, &[])
            .unwrap_err();
        assert!(err.is_protocol_violation());

        server.set_ownership(&Ownership::server_for(PeerId(4)));
        assert_eq!(server.role(), Role::ServerRelay);
        server.set_ownership(&StaleOwner);
        assert_eq!(server.role(), Role::ServerAuthority);
    }

    #[test]
    fn test_correction_without_forwarding_goes_to_owner() {
        let config = ReplicationConfig {
            state_forwarding: false,
            ..ReplicationConfig::default()
        };
        let mut server = PredictedEntity::new(
            EntityId(1),
            walker(&[]),
            config.with_interpolation(0),
            &Ownership::server_for(PeerId(4)),
        );
        let clock = ManualClock::default();
        run_tick(&mut server, &clock);
        assert!(server.drain_outbox().is_empty());

        let records = [rewind_core::InputRecord::created(Tick(0), Walk { dx: 1 }, DeliveryClass::Unreliable)];
        let body = wire::encode_inputs(Some(Tick(0)), &records).unwrap();
        server.receive(Sender::Client(PeerId(4)), MessageKind::Input, &body).unwrap();
        run_tick(&mut server, &clock);

        let sent = server.drain_outbox();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, Target::Peer(PeerId(4)));
    }

    #[test]
    fn test_unaligned_correction_snaps_when_enabled() {
        let config = ReplicationConfig {
            snap_when_unaligned: true,
            snapshot_capacity: 2,
            ..ReplicationConfig::default()
        };
        let mut observer = PredictedEntity::new(EntityId(1), walker(&[]), config, &Ownership::observed(Some(PeerId(2))));
        let mut clock = ManualClock::default();
        for _ in 0..3 {
            run_tick(&mut observer, &clock);
            clock.advance();
        }

        // Only ticks 1 and 2 are still recorded
        observer.receive(Sender::Server, MessageKind::Correction, &correction(0, 77)).unwrap();
        observer.reconcile(&clock);

        assert_eq!(observer.entity().x, 77);
        assert_eq!(observer.stats().alignment_failures, 1);
        assert_eq!(observer.stats().snaps, 1);
        assert!(observer.aligner().local().is_empty());
    }

    #[test]
    fn test_self_correction_from_fixed_estimate() {
        let config = ReplicationConfig::default().with_tick_estimate(TickEstimate::Fixed(2));
        let mut owner = PredictedEntity::new(
            EntityId(1),
            walker(&[(0, 1), (1, 1), (2, 1), (3, 1)]),
            config,
            &Ownership::owned_by_me(PeerId(1)),
        );
        let mut clock = ManualClock::default();
        for _ in 0..4 {
            run_tick(&mut owner, &clock);
            clock.advance();
        }

        // Replaying own predictions converges to the same state
        assert_eq!(owner.entity().x, 4);
        assert!(owner.stats().self_corrections > 0);
        assert_eq!(owner.stats().corrections, 0);
    }

    #[test]
    fn test_ownership_change_resets() {
        let mut entity = PredictedEntity::new(
            EntityId(1),
            walker(&[(0, 1)]),
            ReplicationConfig::default().with_ordering(InputOrdering::Inserted),
            &Ownership::owned_by_me(PeerId(1)),
        );
        let clock = ManualClock::default();
        run_tick(&mut entity, &clock);
        assert!(!entity.producer().history().is_empty());

        entity.set_ownership(&Ownership::observed(Some(PeerId(2))));
        assert_eq!(entity.role(), Role::Observer);
        assert!(entity.producer().history().is_empty());
        assert!(entity.aligner().local().is_empty());
        assert!(entity.drain_outbox().is_empty());
        assert_eq!(entity.last_step_tick(), None);
        assert_eq!(entity.consumer().ordering(), InputOrdering::Inserted);
    }
}
