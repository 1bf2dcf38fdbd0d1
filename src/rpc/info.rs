use std::net::SocketAddr;

use crate::common::Id;

use super::Rpc;

/// Information and statistics about this node.
#[derive(Debug, Clone)]
pub struct Info {
    id: Id,
    local_addr: SocketAddr,
    routing_table_size: usize,
    pending_requests: usize,
    stored_values: usize,
    seen_broadcasts: usize,
}

impl Info {
    /// This Node's [Id]
    pub fn id(&self) -> &Id {
        &self.id
    }
    /// Local UDP socket address that this node is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
    /// Number of peers in the routing table.
    pub fn routing_table_size(&self) -> usize {
        self.routing_table_size
    }
    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.pending_requests
    }
    pub fn stored_values(&self) -> usize {
        self.stored_values
    }
    /// Number of broadcast message hashes currently remembered.
    pub fn seen_broadcasts(&self) -> usize {
        self.seen_broadcasts
    }
}

impl From<&Rpc> for Info {
    fn from(rpc: &Rpc) -> Self {
        Self {
            id: *rpc.id(),
            local_addr: rpc.local_addr(),
            routing_table_size: rpc.routing_table().size(),
            pending_requests: rpc.pending_requests().len(),
            stored_values: rpc.store().len(),
            seen_broadcasts: rpc.seen_broadcasts().len(),
        }
    }
}
