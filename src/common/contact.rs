//! Durable identity plus current network address of a peer.
use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;

use crate::common::Id;

#[derive(Debug, Clone, Copy, Eq)]
/// A peer's identity and the address it can be reached at.
///
/// A contact learned only from an address (a bootstrap entry for example)
/// has no [Id] until the peer answers.
pub struct Contact {
    id: Option<Id>,
    address: SocketAddr,
}

impl Contact {
    pub fn new(id: Id, address: SocketAddr) -> Contact {
        Contact {
            id: Some(id),
            address,
        }
    }

    /// Create a contact for a peer whose identity is not known yet.
    pub fn from_address(address: SocketAddr) -> Contact {
        Contact { id: None, address }
    }

    // === Getters ===

    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    // === Public Methods ===

    /// Returns a copy of this contact reachable at a different address.
    pub fn with_address(mut self, address: SocketAddr) -> Contact {
        self.address = address;
        self
    }
}

impl PartialEq for Contact {
    /// Identity wins when both sides know it, otherwise fall back to the address.
    fn eq(&self, other: &Self) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => self.address == other.address,
        }
    }
}

impl Display for Contact {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}", id.short()),
            None => write!(f, "{}", self.address),
        }
    }
}
