//! Error types for rewind-netcode

use rewind_core::EntityId;
use thiserror::Error;

/// Netcode error type
#[derive(Debug, Error)]
pub enum Error {
    /// A peer sent something the protocol forbids
    #[error("Protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    /// Message addressed to an entity that is not registered
    #[error("Unknown entity {0}")]
    UnknownEntity(EntityId),

    /// Message kind byte with no registered handler
    #[error("Unknown message kind {0}")]
    UnknownMessageKind(u8),

    /// Encoding failed on the send side
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A programming contract was broken; the operation degraded
    #[error("Contract error: {0}")]
    Contract(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] rewind_core::Error),
}

impl Error {
    /// Create a protocol violation
    pub fn protocol(reason: impl Into<String>) -> Self {
        Error::ProtocolViolation {
            reason: reason.into(),
        }
    }

    /// Whether the sender of the offending message should be disconnected
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::ProtocolViolation { .. }
                | Error::UnknownEntity(_)
                | Error::UnknownMessageKind(_)
                | Error::Core(_)
        )
    }
}

/// Result type for netcode operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::protocol("too many records").is_protocol_violation());
        assert!(Error::UnknownMessageKind(9).is_protocol_violation());
        assert!(Error::Core(rewind_core::Error::UnsetTick).is_protocol_violation());
        assert!(!Error::Transport("closed".into()).is_protocol_violation());
        assert!(!Error::Contract("clock went backwards".into()).is_protocol_violation());
    }
}
