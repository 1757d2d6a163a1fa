//! In-process transport with deterministic packet loss
//!
//! One `MemoryNetwork` connects a server with any number of clients inside a
//! single thread. Messages wait in per-peer inboxes until the host drains
//! them, which gives one tick of latency when draining once per tick.
//! Unreliable messages can be dropped deterministically (every Nth send).

use crate::transport::{Sender, Transport};
use indexmap::IndexMap;
use rewind_core::{DeliveryClass, PeerId, Target};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use thiserror::Error;
use tracing::trace;

/// Errors from the in-memory transport
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryError {
    /// The target is not reachable from this endpoint
    #[error("invalid route: {0}")]
    InvalidRoute(&'static str),
    /// The client is not connected
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),
    /// The payload is larger than the channel allows
    #[error("payload of {size} bytes exceeds limit {limit}")]
    TooLarge { size: usize, limit: usize },
}

#[derive(Debug, Default)]
struct NetworkState {
    server_inbox: VecDeque<(Sender, Vec<u8>)>,
    clients: IndexMap<PeerId, VecDeque<Vec<u8>>>,
    disconnected: Vec<(PeerId, String)>,
    drop_every: Option<u64>,
    unreliable_sent: u64,
    dropped: u64,
    max_unreliable: usize,
    max_reliable: usize,
}

impl NetworkState {
    fn should_drop(&mut self, channel: DeliveryClass) -> bool {
        if channel.is_reliable() {
            return false;
        }
        self.unreliable_sent += 1;
        match self.drop_every {
            Some(n) if n > 0 && self.unreliable_sent % n == 0 => {
                self.dropped += 1;
                true
            }
            _ => false,
        }
    }
}

/// Shared in-memory network
#[derive(Debug, Clone)]
pub struct MemoryNetwork {
    state: Rc<RefCell<NetworkState>>,
}

impl MemoryNetwork {
    /// Create a lossless network
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(NetworkState {
                max_unreliable: 1200,
                max_reliable: 64 * 1024,
                ..NetworkState::default()
            })),
        }
    }

    /// Drop every `n`th unreliable message (0 disables loss)
    pub fn with_loss_every(self, n: u64) -> Self {
        self.state.borrow_mut().drop_every = Some(n);
        self
    }

    /// Set the unreliable payload limit
    pub fn with_unreliable_limit(self, limit: usize) -> Self {
        self.state.borrow_mut().max_unreliable = limit;
        self
    }

    /// Connect a client and get its endpoint
    pub fn connect(&self, peer: PeerId) -> MemoryTransport {
        self.state.borrow_mut().clients.entry(peer).or_default();
        MemoryTransport {
            state: Rc::clone(&self.state),
            endpoint: Sender::Client(peer),
        }
    }

    /// The server's endpoint
    pub fn server(&self) -> MemoryTransport {
        MemoryTransport {
            state: Rc::clone(&self.state),
            endpoint: Sender::Server,
        }
    }

    /// Take everything delivered to the server
    pub fn drain_server(&self) -> Vec<(Sender, Vec<u8>)> {
        self.state.borrow_mut().server_inbox.drain(..).collect()
    }

    /// Take everything delivered to `peer`
    pub fn drain_client(&self, peer: PeerId) -> Vec<Vec<u8>> {
        self.state
            .borrow_mut()
            .clients
            .get_mut(&peer)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }

    /// Clients disconnected by the server, with reasons
    pub fn disconnected(&self) -> Vec<(PeerId, String)> {
        self.state.borrow().disconnected.clone()
    }

    /// Unreliable messages dropped so far
    pub fn dropped(&self) -> u64 {
        self.state.borrow().dropped
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// One endpoint of a `MemoryNetwork`
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Rc<RefCell<NetworkState>>,
    endpoint: Sender,
}

impl Transport for MemoryTransport {
    type Error = MemoryError;

    fn send(&mut self, target: Target, channel: DeliveryClass, bytes: &[u8]) -> Result<(), MemoryError> {
        let mut state = self.state.borrow_mut();
        let limit = match channel {
            DeliveryClass::Reliable => state.max_reliable,
            DeliveryClass::Unreliable => state.max_unreliable,
        };
        if bytes.len() > limit {
            return Err(MemoryError::TooLarge {
                size: bytes.len(),
                limit,
            });
        }

        match (self.endpoint, target) {
            (Sender::Client(peer), Target::Server) => {
                if !state.clients.contains_key(&peer) {
                    return Err(MemoryError::UnknownPeer(peer));
                }
                if !state.should_drop(channel) {
                    state
                        .server_inbox
                        .push_back((Sender::Client(peer), bytes.to_vec()));
                }
                Ok(())
            }
            (Sender::Server, Target::Peer(peer)) => {
                let dropped = state.should_drop(channel);
                let inbox = state
                    .clients
                    .get_mut(&peer)
                    .ok_or(MemoryError::UnknownPeer(peer))?;
                if !dropped {
                    inbox.push_back(bytes.to_vec());
                }
                Ok(())
            }
            (Sender::Server, Target::Observers { except }) => {
                let peers: Vec<PeerId> = state
                    .clients
                    .keys()
                    .copied()
                    .filter(|peer| Some(*peer) != except)
                    .collect();
                for peer in peers {
                    if state.should_drop(channel) {
                        trace!(%peer, "memory transport dropped message");
                        continue;
                    }
                    if let Some(inbox) = state.clients.get_mut(&peer) {
                        inbox.push_back(bytes.to_vec());
                    }
                }
                Ok(())
            }
            (Sender::Server, Target::Server) => Err(MemoryError::InvalidRoute("server to server")),
            (Sender::Client(_), _) => Err(MemoryError::InvalidRoute("clients only talk to the server")),
        }
    }

    fn max_payload(&self, channel: DeliveryClass) -> usize {
        let state = self.state.borrow();
        match channel {
            DeliveryClass::Reliable => state.max_reliable,
            DeliveryClass::Unreliable => state.max_unreliable,
        }
    }

    fn disconnect(&mut self, peer: PeerId, reason: &str) -> Result<(), MemoryError> {
        let mut state = self.state.borrow_mut();
        if state.clients.shift_remove(&peer).is_none() {
            return Err(MemoryError::UnknownPeer(peer));
        }
        state.server_inbox.retain(|(sender, _)| *sender != Sender::Client(peer));
        state.disconnected.push((peer, reason.to_string()));
        Ok(())
    }
}
