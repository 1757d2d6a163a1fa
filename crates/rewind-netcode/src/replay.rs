//! Rewind and replay
//!
//! Restores an entity to an aligned snapshot and re-runs the step function
//! for every tick after it up to the last simulated tick, using buffered
//! input. The outbox is suppressed for the whole pass so replayed ticks never
//! emit network traffic; the loop runs to completion inside one call, so the
//! tick loop never observes a partial replay.

use rewind_core::{
    InputRecord, Outbox, ReplicationState, SimulatedEntity, Snapshot, StepContext, Tick,
};
use rewind_history::TickIndexedHistory;
use tracing::{debug, trace};

/// What one replay pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayReport {
    /// Tick the entity was restored to
    pub from: Tick,
    /// Last tick replayed
    pub to: Tick,
    /// Ticks replayed with buffered input
    pub replayed: u64,
    /// Ticks replayed with default input because none was buffered
    pub synthesized: u64,
    /// Ticks left out because the authority had no input for them
    pub skipped: u64,
}

/// Reconciliation counters for one entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Authoritative corrections applied
    pub corrections: u64,
    /// Estimated self-corrections applied
    pub self_corrections: u64,
    /// Ticks re-simulated across all replays
    pub replayed_ticks: u64,
    /// Corrections that could not be matched to history
    pub alignment_failures: u64,
    /// Times local history was dropped
    pub history_clears: u64,
    /// Corrections applied instantly without replay
    pub snaps: u64,
}

impl ReconcileStats {
    /// Record a finished replay
    pub fn record(&mut self, report: &ReplayReport, authoritative: bool) {
        if authoritative {
            self.corrections += 1;
        } else {
            self.self_corrections += 1;
        }
        self.replayed_ticks += report.replayed + report.synthesized;
    }
}

/// Runs replay passes and tracks whether one is in progress
#[derive(Debug, Default)]
pub struct ReplayOrchestrator {
    replaying: bool,
}

impl ReplayOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a replay pass is running
    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    /// Restore `entity` to `snapshot` and replay `(snapshot.tick, end]`
    ///
    /// `after_step` runs after every replayed tick, e.g. to re-record local
    /// snapshots. Missing input is filled with the default payload unless
    /// `local_authority` is set, in which case the tick is skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn run<E, F>(
        &mut self,
        entity: &mut E,
        snapshot: &Snapshot<E::Correction>,
        inputs: &TickIndexedHistory<InputRecord<E::Input>>,
        end: Tick,
        local_authority: bool,
        outbox: &mut Outbox,
        mut after_step: F,
    ) -> ReplayReport
    where
        E: SimulatedEntity,
        F: FnMut(Tick, &E),
    {
        let was_suppressed = outbox.is_suppressed();
        self.replaying = true;
        outbox.set_suppressed(true);
        entity.apply_correction(&snapshot.state);

        let mut report = ReplayReport {
            from: snapshot.tick,
            to: snapshot.tick,
            replayed: 0,
            synthesized: 0,
            skipped: 0,
        };
        let default_input = E::Input::default();

        for tick in snapshot.tick.range_after(end) {
            match inputs.get(tick) {
                Some(record) => {
                    let state = ReplicationState::REPLAYED | record.ticked_state();
                    let mut ctx = StepContext::new(tick, state, outbox);
                    entity.step(&mut ctx, &record.payload);
                    report.replayed += 1;
                }
                None if !local_authority => {
                    let mut ctx = StepContext::new(tick, ReplicationState::REPLAYED, outbox);
                    entity.step(&mut ctx, &default_input);
                    report.synthesized += 1;
                }
                None => {
                    trace!(%tick, "no buffered input on authority, tick skipped");
                    report.skipped += 1;
                    continue;
                }
            }
            report.to = tick;
            after_step(tick, entity);
        }

        outbox.set_suppressed(was_suppressed);
        self.replaying = false;
        debug!(
            from = %report.from,
            to = %report.to,
            replayed = report.replayed,
            synthesized = report.synthesized,
            "replay finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::{DeliveryClass, Target};

    /// Sums inputs and remembers how each tick ran
    #[derive(Debug, Default)]
    struct Counter {
        total: i64,
        states: Vec<(Tick, ReplicationState)>,
    }

    impl SimulatedEntity for Counter {
        type Input = i64;
        type Correction = i64;

        fn sample_input(&mut self, _tick: Tick) -> i64 {
            0
        }

        fn step(&mut self, ctx: &mut StepContext<'_>, input: &i64) {
            self.total += input;
            self.states.push((ctx.tick(), ctx.state()));
            ctx.send(Target::Server, DeliveryClass::Reliable, vec![1]);
        }

        fn build_correction(&self) -> i64 {
            self.total
        }

        fn apply_correction(&mut self, correction: &i64) {
            self.total = *correction;
        }
    }

    fn inputs(ticks: &[(u64, i64)]) -> TickIndexedHistory<InputRecord<i64>> {
        let mut history = TickIndexedHistory::new(32);
        for &(tick, value) in ticks {
            history.insert(InputRecord::created(Tick(tick), value, DeliveryClass::Unreliable));
        }
        history
    }

    #[test]
    fn test_replay_is_idempotent_and_silent() {
        let history = inputs(&[(11, 1), (12, 2), (13, 3)]);
        let snapshot = Snapshot::new(Tick(10), 100);
        let mut outbox = Outbox::new();
        let mut replay = ReplayOrchestrator::new();
        let mut entity = Counter::default();

        let first = replay.run(&mut entity, &snapshot, &history, Tick(13), true, &mut outbox, |_, _| {});
        let after_first = entity.total;
        let second = replay.run(&mut entity, &snapshot, &history, Tick(13), true, &mut outbox, |_, _| {});

        assert_eq!(after_first, 106);
        assert_eq!(entity.total, after_first);
        assert_eq!(first, second);
        assert!(outbox.is_empty());
        assert_eq!(outbox.dropped(), 6);
        assert!(!outbox.is_suppressed());
        assert!(!replay.is_replaying());
    }

    #[test]
    fn test_replay_states() {
        let mut history = inputs(&[(1, 5)]);
        history.insert(InputRecord::synthesized(Tick(2), DeliveryClass::Unreliable));
        let mut entity = Counter::default();
        let mut outbox = Outbox::new();

        let report = ReplayOrchestrator::new().run(
            &mut entity,
            &Snapshot::new(Tick(0), 0),
            &history,
            Tick(3),
            false,
            &mut outbox,
            |_, _| {},
        );

        assert_eq!(report.replayed, 2);
        assert_eq!(report.synthesized, 1);
        assert_eq!(
            entity.states,
            vec![
                (
                    Tick(1),
                    ReplicationState::REPLAYED | ReplicationState::TICKED | ReplicationState::CREATED
                ),
                (Tick(2), ReplicationState::REPLAYED | ReplicationState::TICKED),
                (Tick(3), ReplicationState::REPLAYED),
            ]
        );
    }

    #[test]
    fn test_authority_skips_missing_input() {
        let history = inputs(&[(1, 1), (3, 3)]);
        let mut entity = Counter::default();
        let mut outbox = Outbox::new();
        let mut visited = Vec::new();

        let report = ReplayOrchestrator::new().run(
            &mut entity,
            &Snapshot::new(Tick(0), 0),
            &history,
            Tick(3),
            true,
            &mut outbox,
            |tick, e: &Counter| visited.push((tick, e.total)),
        );

        assert_eq!(report.skipped, 1);
        assert_eq!(report.to, Tick(3));
        assert_eq!(visited, vec![(Tick(1), 1), (Tick(3), 4)]);
    }

    #[test]
    fn test_nothing_to_replay() {
        let history = inputs(&[(5, 1)]);
        let mut entity = Counter::default();
        let report = ReplayOrchestrator::new().run(
            &mut entity,
            &Snapshot::new(Tick(5), 42),
            &history,
            Tick(5),
            true,
            &mut Outbox::new(),
            |_, _| {},
        );
        assert_eq!(entity.total, 42);
        assert_eq!(report.replayed, 0);
    }

    #[test]
    fn test_stats_record() {
        let mut stats = ReconcileStats::default();
        let report = ReplayReport {
            from: Tick(1),
            to: Tick(4),
            replayed: 2,
            synthesized: 1,
            skipped: 0,
        };
        stats.record(&report, true);
        stats.record(&report, false);
        assert_eq!(stats.corrections, 1);
        assert_eq!(stats.self_corrections, 1);
        assert_eq!(stats.replayed_ticks, 6);
    }
}
