//! Replication configuration
//!
//! One `ReplicationConfig` is shared by every entity a manager drives, or
//! given per entity when different entity types need different trade-offs.
//! Configurations load from RON:
//!
//! ```ron
//! (
//!     redundancy: 3,
//!     ordering: Inserted,
//!     interpolation: 1,
//!     tick_estimate: Fixed(4),
//! )
//! ```

use crate::{Error, Result};
use rewind_core::DeliveryClass;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// How a non-authoritative peer orders received input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputOrdering {
    /// Queue input and run it in arrival order; divergence is fixed only by corrections
    #[default]
    Future,
    /// Write input into the past of history so the next replay runs the right tick
    Inserted,
}

/// Where a client takes the tick to self-correct against when no correction arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TickEstimate {
    /// Only reconcile on real corrections
    #[default]
    Disabled,
    /// Fixed number of ticks behind the last simulated tick
    Fixed(u32),
    /// The clock's round-trip estimate, in ticks
    RoundTrip,
}

/// Configuration for prediction and reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Times a changed input or correction is sent
    pub redundancy: u8,
    /// Largest record batch accepted from a peer; larger batches get the sender kicked
    pub max_redundancy: u8,
    /// Channel for input messages
    pub input_channel: DeliveryClass,
    /// Channel for correction messages
    pub correction_channel: DeliveryClass,
    /// Ordering used by non-authoritative clients
    pub ordering: InputOrdering,
    /// Ticks of input buffered before consumption starts
    pub interpolation: u8,
    /// Drop one queued input per tick while the queue exceeds `interpolation`
    pub lossy_catchup: bool,
    /// Capacity of the input history
    pub history_capacity: usize,
    /// Capacity of the local snapshot history
    pub snapshot_capacity: usize,
    /// Ticks between periodic corrections
    pub correction_interval: u32,
    /// Send corrections and relayed input to every observer instead of the owner only
    pub state_forwarding: bool,
    /// Self-correction tick source
    pub tick_estimate: TickEstimate,
    /// Corrections further than this behind the last simulated tick clear history
    pub max_rewind: u32,
    /// Pose delta that counts as a physical change
    pub pose_tolerance: f32,
    /// Apply an unalignable authoritative correction without replay
    pub snap_when_unaligned: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            redundancy: 3,
            max_redundancy: 8,
            input_channel: DeliveryClass::Unreliable,
            correction_channel: DeliveryClass::Unreliable,
            ordering: InputOrdering::Future,
            interpolation: 2,
            lossy_catchup: true,
            history_capacity: 128,
            snapshot_capacity: 128,
            correction_interval: 1,
            state_forwarding: true,
            tick_estimate: TickEstimate::Disabled,
            max_rewind: 64,
            pose_tolerance: 0.0001,
            snap_when_unaligned: false,
        }
    }
}

impl ReplicationConfig {
    /// Parse and validate a RON configuration
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON configuration file
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_ron_str(&content)
    }

    /// Set the redundancy, clamped to `[1, max_redundancy]`
    pub fn with_redundancy(mut self, redundancy: u8) -> Self {
        self.redundancy = redundancy.clamp(1, self.max_redundancy.max(1));
        self
    }

    /// Set the consumer ordering
    pub fn with_ordering(mut self, ordering: InputOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Set the interpolation depth
    pub fn with_interpolation(mut self, ticks: u8) -> Self {
        self.interpolation = ticks;
        self
    }

    /// Set the self-correction tick source
    pub fn with_tick_estimate(mut self, estimate: TickEstimate) -> Self {
        self.tick_estimate = estimate;
        self
    }

    /// Check that the values are usable together
    pub fn validate(&self) -> Result<()> {
        if self.redundancy == 0 {
            return Err(Error::Config("redundancy must be at least 1".into()));
        }
        if self.redundancy > self.max_redundancy {
            return Err(Error::Config(format!(
                "redundancy {} exceeds max_redundancy {}",
                self.redundancy, self.max_redundancy
            )));
        }
        if self.history_capacity == 0 || self.snapshot_capacity == 0 {
            return Err(Error::Config("history capacities must be non-zero".into()));
        }
        if self.correction_interval == 0 {
            return Err(Error::Config("correction_interval must be at least 1".into()));
        }
        if self.max_rewind == 0 {
            return Err(Error::Config("max_rewind must be at least 1".into()));
        }
        if !self.pose_tolerance.is_finite() || self.pose_tolerance < 0.0 {
            return Err(Error::Config("pose_tolerance must be a non-negative number".into()));
        }
        Ok(())
    }

    /// Remaining-send count after a change on `channel`
    pub(crate) fn resend_budget(&self, channel: DeliveryClass) -> u8 {
        if channel.is_reliable() {
            1
        } else {
            self.redundancy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ReplicationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.redundancy, 3);
        assert_eq!(config.ordering, InputOrdering::Future);
    }

    #[test]
    fn test_redundancy_clamped() {
        let config = ReplicationConfig::default().with_redundancy(0);
        assert_eq!(config.redundancy, 1);

        let config = ReplicationConfig::default().with_redundancy(200);
        assert_eq!(config.redundancy, config.max_redundancy);
    }

    #[test]
    fn test_from_ron_partial() {
        let config = ReplicationConfig::from_ron_str(
            "(redundancy: 4, ordering: Inserted, tick_estimate: Fixed(3), input_channel: Reliable)",
        )
        .unwrap();
        assert_eq!(config.redundancy, 4);
        assert_eq!(config.ordering, InputOrdering::Inserted);
        assert_eq!(config.tick_estimate, TickEstimate::Fixed(3));
        assert_eq!(config.input_channel, DeliveryClass::Reliable);
        // Unspecified fields keep their defaults
        assert_eq!(config.history_capacity, 128);
    }

    #[test]
    fn test_from_ron_rejects_invalid() {
        let err = ReplicationConfig::from_ron_str("(redundancy: 9, max_redundancy: 4)").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ReplicationConfig::from_ron_str("(redundancy: \"three\")").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_resend_budget() {
        let config = ReplicationConfig::default();
        assert_eq!(config.resend_budget(DeliveryClass::Unreliable), 3);
        assert_eq!(config.resend_budget(DeliveryClass::Reliable), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ReplicationConfig::load_file("/nonexistent/replication.ron").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
