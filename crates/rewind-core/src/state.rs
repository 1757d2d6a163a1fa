//! Replication state flags passed to step functions

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Composable flags describing why a step is running
///
/// - `TICKED`: the step runs as part of the tick loop
/// - `REPLAYED`: the step runs inside a rewind/replay
/// - `CREATED`: the input is real data rather than a synthesized filler
///
/// A first run with real data is `TICKED | CREATED`; a replay of the same
/// tick is `REPLAYED | TICKED | CREATED`; a filler tick is `TICKED` alone.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ReplicationState(u8);

impl ReplicationState {
    /// No flags set
    pub const EMPTY: Self = Self(0);
    /// Ran as part of the tick loop
    pub const TICKED: Self = Self(1);
    /// Running inside a replay
    pub const REPLAYED: Self = Self(1 << 1);
    /// Backed by real, not synthesized, data
    pub const CREATED: Self = Self(1 << 2);

    /// Raw bit representation
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether every flag in `other` is set
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the flags in `other`
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the flags in `other`
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Whether the step runs as part of the tick loop
    pub fn is_ticked(self) -> bool {
        self.contains(Self::TICKED)
    }

    /// Whether the step runs inside a replay
    pub fn is_replayed(self) -> bool {
        self.contains(Self::REPLAYED)
    }

    /// Whether the input is real data
    pub fn is_created(self) -> bool {
        self.contains(Self::CREATED)
    }
}

impl BitOr for ReplicationState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ReplicationState {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ReplicationState {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for ReplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(ReplicationState, &str); 3] = [
            (ReplicationState::REPLAYED, "Replayed"),
            (ReplicationState::TICKED, "Ticked"),
            (ReplicationState::CREATED, "Created"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "Empty")
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}
