//! Outbound message queue with a replay gate
//!
//! Everything an entity wants to put on the wire during a tick goes through
//! an `Outbox`. While a replay is running the outbox is suppressed and drops
//! pushes, so re-simulated ticks never emit traffic a second time.

use crate::{DeliveryClass, PeerId};

/// Destination of an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The server (from a client)
    Server,
    /// One client (from the server)
    Peer(PeerId),
    /// Every client observing the entity, optionally excluding one
    Observers { except: Option<PeerId> },
}

/// A message waiting to be handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Where it goes
    pub target: Target,
    /// How it travels
    pub channel: DeliveryClass,
    /// Encoded bytes
    pub bytes: Vec<u8>,
}

/// Per-tick queue of outbound messages
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<Outbound>,
    suppressed: bool,
    dropped: usize,
}

impl Outbox {
    /// Create an empty, open outbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message; returns `false` if the outbox is suppressed
    pub fn push(&mut self, target: Target, channel: DeliveryClass, bytes: Vec<u8>) -> bool {
        if self.suppressed {
            self.dropped += 1;
            return false;
        }
        self.messages.push(Outbound {
            target,
            channel,
            bytes,
        });
        true
    }

    /// Suppress or reopen the outbox
    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
    }

    /// Whether pushes are currently dropped
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Number of pushes dropped while suppressed
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Take all queued messages
    pub fn drain(&mut self) -> impl Iterator<Item = Outbound> + '_ {
        self.messages.drain(..)
    }

    /// Discard all queued messages
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Queued messages
    pub fn messages(&self) -> &[Outbound] {
        &self.messages
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain() {
        let mut outbox = Outbox::new();
        assert!(outbox.push(Target::Server, DeliveryClass::Unreliable, vec![1]));
        assert!(outbox.push(Target::Peer(PeerId(2)), DeliveryClass::Reliable, vec![2]));
        assert_eq!(outbox.len(), 2);

        let drained: Vec<_> = outbox.drain().collect();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].target, Target::Peer(PeerId(2)));
        assert!(outbox.is_empty());

        outbox.push(Target::Server, DeliveryClass::Unreliable, vec![3]);
        outbox.clear();
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_suppressed_drops() {
        let mut outbox = Outbox::new();
        outbox.set_suppressed(true);
        assert!(!outbox.push(Target::Server, DeliveryClass::Unreliable, vec![1]));
        assert!(outbox.is_empty());
        assert_eq!(outbox.dropped(), 1);

        outbox.set_suppressed(false);
        assert!(outbox.push(Target::Server, DeliveryClass::Unreliable, vec![1]));
        assert_eq!(outbox.len(), 1);
    }
}
