//! Transport seam for network communication
//!
//! The engine never opens sockets. Hosts implement `Transport` for their
//! network stack and push received bytes into the `PredictionManager`
//! together with the `Sender` that delivered them.

use rewind_core::{DeliveryClass, PeerId, Target};

/// Who delivered an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    /// The server (trusted)
    Server,
    /// A connected client (untrusted)
    Client(PeerId),
}

impl Sender {
    /// Whether protocol violations from this sender are punished by disconnecting it
    pub fn is_untrusted(self) -> bool {
        matches!(self, Sender::Client(_))
    }

    /// The client behind this sender, if any
    pub fn peer(self) -> Option<PeerId> {
        match self {
            Sender::Client(peer) => Some(peer),
            Sender::Server => None,
        }
    }
}

/// Maximum payload sizes per delivery class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLimits {
    /// Largest reliable message
    pub reliable: usize,
    /// Largest unreliable message
    pub unreliable: usize,
}

impl ChannelLimits {
    /// Limit for `channel`
    pub fn for_channel(&self, channel: DeliveryClass) -> usize {
        match channel {
            DeliveryClass::Reliable => self.reliable,
            DeliveryClass::Unreliable => self.unreliable,
        }
    }
}

impl Default for ChannelLimits {
    fn default() -> Self {
        Self {
            reliable: 64 * 1024,
            unreliable: 1200,
        }
    }
}

/// Outbound side of the network stack
pub trait Transport {
    /// Error type for this transport
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send bytes to `target` on `channel`
    fn send(&mut self, target: Target, channel: DeliveryClass, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Largest payload accepted on `channel`
    fn max_payload(&self, channel: DeliveryClass) -> usize;

    /// Drop a client's connection
    fn disconnect(&mut self, peer: PeerId, reason: &str) -> Result<(), Self::Error>;

    /// Limits for every channel
    fn limits(&self) -> ChannelLimits {
        ChannelLimits {
            reliable: self.max_payload(DeliveryClass::Reliable),
            unreliable: self.max_payload(DeliveryClass::Unreliable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_trust() {
        assert!(!Sender::Server.is_untrusted());
        assert!(Sender::Client(PeerId(4)).is_untrusted());
        assert_eq!(Sender::Client(PeerId(4)).peer(), Some(PeerId(4)));
        assert_eq!(Sender::Server.peer(), None);
    }

    #[test]
    fn test_channel_limits() {
        let limits = ChannelLimits::default();
        assert_eq!(limits.for_channel(DeliveryClass::Unreliable), 1200);
        assert!(limits.for_channel(DeliveryClass::Reliable) > 1200);
    }
}
