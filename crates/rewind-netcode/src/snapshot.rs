//! Authoritative correction production
//!
//! The server serializes an entity's full state every `correction_interval`
//! ticks. A state change additionally refills a resend budget, mirroring
//! input redundancy, so a changed state reaches clients even across a lossy
//! link with a long interval.

use crate::wire;
use crate::{Error, ReplicationConfig, Result};
use rewind_core::{DeliveryClass, Tick};
use serde::Serialize;
use tracing::{error, trace};

/// Decides when to send corrections and encodes them
#[derive(Debug, Clone)]
pub struct SnapshotProducer {
    channel: DeliveryClass,
    budget: u8,
    remaining: u8,
    interval: u32,
    /// Local tick of the previous send
    last_sent: Option<Tick>,
    sent: u64,
}

impl SnapshotProducer {
    pub fn new(config: &ReplicationConfig) -> Self {
        Self {
            channel: config.correction_channel,
            budget: config.resend_budget(config.correction_channel),
            remaining: 0,
            interval: config.correction_interval.max(1),
            last_sent: None,
            sent: 0,
        }
    }

    /// Refill the resend budget after a state change
    pub fn mark_changed(&mut self) {
        self.remaining = self.budget;
    }

    /// Encode a correction for `snapshot_tick` if one is due at `current`
    pub fn produce<S: Serialize>(
        &mut self,
        current: Tick,
        snapshot_tick: Tick,
        state: &S,
    ) -> Result<Option<Vec<u8>>> {
        let periodic = match self.last_sent {
            None => true,
            Some(last) => match current.since(last) {
                Some(elapsed) => elapsed >= u64::from(self.interval),
                None => {
                    let fault = Error::Contract(format!(
                        "clock went backwards from {last} to {current}"
                    ));
                    error!(error = %fault, "sending correction immediately");
                    true
                }
            },
        };

        if !periodic && self.remaining == 0 {
            return Ok(None);
        }
        if !periodic {
            self.remaining -= 1;
        }

        let body = wire::encode_correction(snapshot_tick, state)?;
        self.last_sent = Some(current);
        self.sent += 1;
        trace!(tick = %snapshot_tick, remaining = self.remaining, "correction built");
        Ok(Some(body))
    }

    /// Channel corrections travel on
    pub fn channel(&self) -> DeliveryClass {
        self.channel
    }

    /// Total corrections produced
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn reset(&mut self) {
        self.remaining = 0;
        self.last_sent = None;
    }
}
