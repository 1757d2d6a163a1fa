//! Tick-based time for fixed-rate simulation
//!
//! - `Tick` - Logical time unit, with an explicit unset sentinel
//! - `Clock` - Source of the current tick, tick duration, and round-trip estimate
//! - `ManualClock` - A clock advanced by hand, for hosts that drive their own loop

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::time::Duration;

/// A discrete simulation step identifier
///
/// Ticks increase monotonically. `Tick::UNSET` is reserved as a sentinel and
/// is never a valid simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tick(pub u64);

impl Tick {
    /// Sentinel for "no tick recorded yet"
    pub const UNSET: Tick = Tick(u64::MAX);

    /// The first tick of a simulation
    pub const ZERO: Tick = Tick(0);

    /// Create a tick from its raw value
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Whether this tick holds a real value
    pub fn is_set(self) -> bool {
        self != Self::UNSET
    }

    /// Return `self` if set, or `Error::UnsetTick`
    pub fn validated(self) -> Result<Tick> {
        if self.is_set() {
            Ok(self)
        } else {
            Err(Error::UnsetTick)
        }
    }

    /// The following tick
    pub fn next(self) -> Tick {
        Tick(self.0 + 1)
    }

    /// The preceding tick, if any
    pub fn prev(self) -> Option<Tick> {
        self.0.checked_sub(1).map(Tick)
    }

    /// Step `by` ticks back, failing below zero
    pub fn checked_back(self, by: u64) -> Result<Tick> {
        self.0
            .checked_sub(by)
            .map(Tick)
            .ok_or(Error::TickUnderflow { tick: self, by })
    }

    /// Step `by` ticks back, stopping at zero
    pub fn saturating_back(self, by: u64) -> Tick {
        Tick(self.0.saturating_sub(by))
    }

    /// Number of ticks from `earlier` to `self`, or `None` if `earlier` is later
    pub fn since(self, earlier: Tick) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }

    /// Signed distance `self - other`
    pub fn signed_diff(self, other: Tick) -> i64 {
        self.0.wrapping_sub(other.0) as i64
    }

    /// Iterate ticks in `(self, end]`
    pub fn range_after(self, end: Tick) -> impl Iterator<Item = Tick> {
        (self.0.saturating_add(1)..=end.0).map(Tick)
    }
}

impl Add<u64> for Tick {
    type Output = Tick;

    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl From<u64> for Tick {
    fn from(raw: u64) -> Self {
        Tick(raw)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_set() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "unset")
        }
    }
}

/// Source of simulation time
///
/// Implemented by the host's timing layer. The prediction engine only reads
/// from it; advancing the clock is the host's responsibility.
pub trait Clock {
    /// The current local tick
    fn current_tick(&self) -> Tick;

    /// Fixed duration of one tick
    fn tick_duration(&self) -> Duration;

    /// Current round-trip-time estimate to the authority
    fn round_trip(&self) -> Duration;

    /// Round-trip estimate expressed in whole ticks, rounded up
    fn round_trip_ticks(&self) -> u64 {
        let tick = self.tick_duration().as_nanos();
        if tick == 0 {
            return 0;
        }
        self.round_trip().as_nanos().div_ceil(tick) as u64
    }
}

/// A clock advanced explicitly by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualClock {
    /// Current tick number
    pub tick: Tick,
    /// Duration of one tick
    pub tick_duration: Duration,
    /// Round-trip estimate reported to the engine
    pub round_trip: Duration,
}

impl ManualClock {
    /// Create a clock at tick zero running at `ticks_per_second`
    pub fn new(ticks_per_second: u32) -> Self {
        Self {
            tick: Tick::ZERO,
            tick_duration: Duration::from_secs(1) / ticks_per_second.max(1),
            round_trip: Duration::ZERO,
        }
    }

    /// Start at a specific tick
    pub fn starting_at(mut self, tick: Tick) -> Self {
        self.tick = tick;
        self
    }

    /// Advance to the next tick
    pub fn advance(&mut self) {
        self.tick = self.tick.next();
    }

    /// Set the round-trip estimate
    pub fn set_round_trip(&mut self, round_trip: Duration) {
        self.round_trip = round_trip;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(60)
    }
}

impl Clock for ManualClock {
    fn current_tick(&self) -> Tick {
        self.tick
    }

    fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    fn round_trip(&self) -> Duration {
        self.round_trip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_sentinel() {
        assert!(!Tick::UNSET.is_set());
        assert!(Tick::ZERO.is_set());
        assert_eq!(Tick::UNSET.validated(), Err(Error::UnsetTick));
        assert_eq!(format!("{}", Tick::UNSET), "unset");
        assert_eq!(format!("{}", Tick(7)), "7");
    }

    #[test]
    fn test_tick_arithmetic() {
        assert_eq!(Tick(5).next(), Tick(6));
        assert_eq!(Tick(0).prev(), None);
        assert_eq!(Tick(10).since(Tick(4)), Some(6));
        assert_eq!(Tick(4).since(Tick(10)), None);
        assert_eq!(Tick(53).signed_diff(Tick(54)), -1);
        assert_eq!(Tick(2).saturating_back(5), Tick(0));
        assert!(Tick(2).checked_back(5).is_err());
    }

    #[test]
    fn test_range_after() {
        let ticks: Vec<_> = Tick(3).range_after(Tick(6)).collect();
        assert_eq!(ticks, vec![Tick(4), Tick(5), Tick(6)]);
        assert_eq!(Tick(6).range_after(Tick(6)).count(), 0);
    }

    #[test]
    fn test_manual_clock() {
        let mut clock = ManualClock::new(50).starting_at(Tick(100));
        clock.advance();
        assert_eq!(clock.current_tick(), Tick(101));
        assert_eq!(clock.tick_duration(), Duration::from_millis(20));

        clock.set_round_trip(Duration::from_millis(45));
        assert_eq!(clock.round_trip_ticks(), 3);
    }

    #[test]
    fn test_clock_from_ron() {
        let clock: ManualClock = ron::from_str(
            "(tick: 12, tick_duration: (secs: 0, nanos: 10000000), round_trip: (secs: 0, nanos: 0))",
        )
        .unwrap();
        assert_eq!(clock.current_tick(), Tick(12));
    }
}
