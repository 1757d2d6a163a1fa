//! Peer roles and the ownership provider seam
//!
//! Which code path an entity runs (producing input or consuming it, replaying
//! or relaying) depends on who controls it and where the code runs. The host
//! answers three questions through `RoleProvider`; `Role` is the resolved
//! answer.

use crate::PeerId;
use serde::{Deserialize, Serialize};

/// Resolved role of the local peer for one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Client that controls the entity: produces input and predicts
    Owner,
    /// Server controlling an entity no client owns
    ServerAuthority,
    /// Server for a client-owned entity: consumes the owner's input
    ServerRelay,
    /// Client that does not control the entity
    Observer,
}

impl Role {
    /// Resolve a role from the three ownership questions
    pub fn resolve(is_server: bool, is_local_authority: bool, is_owner_valid: bool) -> Self {
        match (is_server, is_local_authority, is_owner_valid) {
            (true, false, true) => Role::ServerRelay,
            (true, _, _) => Role::ServerAuthority,
            (false, true, _) => Role::Owner,
            (false, false, _) => Role::Observer,
        }
    }

    /// Whether this peer samples input for the entity
    pub fn produces_input(self) -> bool {
        matches!(self, Role::Owner | Role::ServerAuthority)
    }

    /// Whether this peer runs on the server
    pub fn is_server(self) -> bool {
        matches!(self, Role::ServerAuthority | Role::ServerRelay)
    }

    /// Whether this peer rewinds and replays on corrections
    pub fn replays(self) -> bool {
        matches!(self, Role::Owner | Role::Observer)
    }

    /// Whether this peer's state is the source of truth
    pub fn is_authoritative(self) -> bool {
        self.is_server()
    }
}

/// Ownership questions answered by the host
pub trait RoleProvider {
    /// Whether the local peer controls the entity
    fn is_local_authority(&self) -> bool;

    /// Whether the local peer is the server
    fn is_server(&self) -> bool;

    /// Whether some client currently owns the entity
    fn is_owner_valid(&self) -> bool;

    /// The owning client, if any
    fn owner(&self) -> Option<PeerId>;

    /// The resolved role
    fn role(&self) -> Role {
        Role::resolve(
            self.is_server(),
            self.is_local_authority(),
            self.is_owner_valid(),
        )
    }
}

/// Plain ownership record, for hosts that track ownership as data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ownership {
    /// Local peer is the server
    pub server: bool,
    /// Local peer controls the entity
    pub local_authority: bool,
    /// Owning client
    pub owner: Option<PeerId>,
}

impl Ownership {
    /// Server view of an entity owned by `owner`
    pub fn server_for(owner: PeerId) -> Self {
        Self {
            server: true,
            local_authority: false,
            owner: Some(owner),
        }
    }

    /// Server view of an unowned entity
    pub fn server_owned() -> Self {
        Self {
            server: true,
            local_authority: true,
            owner: None,
        }
    }

    /// Client view of its own entity
    pub fn owned_by_me(me: PeerId) -> Self {
        Self {
            server: false,
            local_authority: true,
            owner: Some(me),
        }
    }

    /// Client view of an entity controlled elsewhere
    pub fn observed(owner: Option<PeerId>) -> Self {
        Self {
            server: false,
            local_authority: false,
            owner,
        }
    }
}

impl RoleProvider for Ownership {
    fn is_local_authority(&self) -> bool {
        self.local_authority
    }

    fn is_server(&self) -> bool {
        self.server
    }

    fn is_owner_valid(&self) -> bool {
        self.owner.is_some()
    }

    fn owner(&self) -> Option<PeerId> {
        self.owner
    }
}
