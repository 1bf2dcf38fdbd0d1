//! Request/response core: correlation, query dispatch and broadcast flooding.

mod application;
mod broadcast;
mod config;
mod handle_query;
mod handle_response;
mod info;
pub mod pending;
mod socket;
mod store;

use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, info};

use crate::common::packet::now_nanos;
use crate::common::{Command, Contact, Id, Packet, Payload, RoutingTable};
use crate::error::RequestError;

pub use application::{Application, DefaultApplication};
pub use broadcast::SeenBroadcasts;
pub use config::{Config, DEFAULT_REQUEST_TIMEOUT, MAX_SEEN_BROADCASTS};
pub use info::Info;
pub use pending::{PendingReply, PendingRequests, ReplyResult, ReplySlot};
pub use socket::{PacketSocket, MTU};
pub use store::ValueStore;

#[derive(Debug)]
/// Internal Rpc called in the Dht thread loop, useful to create your own actor setup.
pub struct Rpc {
    socket: PacketSocket,
    /// Own identity and listening address, the sender of every packet.
    contact: Contact,
    routing_table: RoutingTable,
    pending: PendingRequests,
    store: ValueStore,
    seen_broadcasts: SeenBroadcasts,
    application: Box<dyn Application>,
    /// Outgoing timestamps strictly increase.
    last_sent_at: i64,
}

impl Rpc {
    pub fn new(config: Config) -> Result<Self, std::io::Error> {
        let socket = PacketSocket::new(&config)?;

        let id = config.id.unwrap_or_else(Id::random);
        let contact = Contact::new(id, socket.local_addr());

        let mut rpc = Rpc {
            socket,
            contact,
            routing_table: RoutingTable::new(id),
            pending: PendingRequests::new(config.request_timeout),
            store: ValueStore::new(),
            seen_broadcasts: SeenBroadcasts::new(config.max_seen_broadcasts),
            application: config
                .application
                .unwrap_or_else(|| Box::new(DefaultApplication)),
            last_sent_at: 0,
        };

        info!(?id, address = ?rpc.local_addr(), "DHT node listening");

        for contact in config.contacts {
            rpc.add_contact(contact);
        }

        Ok(rpc)
    }

    // === Getters ===

    /// Returns the node's Id
    pub fn id(&self) -> &Id {
        self.routing_table.id()
    }

    /// Returns the address the server is listening to.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    /// This node as it introduces itself to peers.
    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    pub fn pending_requests(&self) -> &PendingRequests {
        &self.pending
    }

    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    pub fn seen_broadcasts(&self) -> &SeenBroadcasts {
        &self.seen_broadcasts
    }

    pub fn info(&self) -> Info {
        Info::from(self)
    }

    /// When traffic was last received from that peer, `None` if it isn't in the routing table.
    pub fn last_seen(&self, contact: &Contact) -> Option<Instant> {
        self.routing_table.get(contact).map(|entry| entry.last_seen())
    }

    // === Public Methods ===

    /// Expire overdue requests, then read and dispatch at most one incoming packet.
    pub fn tick(&mut self) {
        self.expire_pending(Instant::now());

        if let Some((packet, from)) = self.socket.recv_from() {
            self.handle_packet(packet, from);
        }
    }

    /// Add a known peer.
    ///
    /// A contact without an [Id] can't enter the routing table, so it is pinged
    /// instead, and its Pong introduces it like any other traffic.
    pub fn add_contact(&mut self, contact: Contact) {
        if contact.id().is_some() {
            self.routing_table.add_node(contact);
        } else {
            self.request(contact, Payload::Ping, ReplySlot::detached());
        }
    }

    /// Send a request to `to`, `slot` receives exactly one outcome.
    ///
    /// Returns the request's message hash if it was written to the socket.
    pub fn request(&mut self, to: Contact, payload: Payload, slot: ReplySlot) -> Option<Id> {
        let packet = self.packet(None, payload);
        let message_hash = *packet.message_hash();

        let bytes = match PacketSocket::encode(&packet) {
            Ok(bytes) => bytes,
            Err(error) => {
                debug!(?error, command = %packet.command(), "Could not encode request");
                slot.resolve(Err(error.into()));
                return None;
            }
        };

        if let Err(slot) = self.pending.insert(message_hash, to, slot) {
            debug!(?message_hash, "Request with the same message hash is already pending");
            slot.resolve(Err(RequestError::DuplicateRequest));
            return None;
        }

        debug!(peer = %to, "Sending {}", packet.command());

        if let Err(source) = self.socket.send_bytes(to.address(), &bytes) {
            debug!(?source, peer = %to, "Could not write request");

            if let Some(request) = self.pending.remove(&message_hash) {
                request.resolve(Err(RequestError::Write {
                    address: to.address(),
                    source,
                }));
            }
            return None;
        }

        Some(message_hash)
    }

    /// Originate a broadcast and flood it to every known peer.
    ///
    /// Returns its message hash.
    pub fn broadcast(&mut self, value: Bytes) -> Id {
        let packet = self.packet(None, Payload::Broadcast(value));
        let message_hash = *packet.message_hash();

        // Our own broadcast coming back must not be flooded again.
        self.seen_broadcasts.observe(message_hash);

        debug!(?message_hash, "Sending BROADCAST");
        self.flood(&packet);

        message_hash
    }

    /// Store a value locally, never overwriting an existing key.
    pub fn store_local(&mut self, key: Id, value: Bytes) -> bool {
        self.store.insert_new(key, value)
    }

    pub fn get_local(&self, key: &Id) -> Option<Bytes> {
        self.store.get(key).cloned()
    }

    // === Private Methods ===

    /// Build a packet sent by this node.
    fn packet(&mut self, response_to: Option<Id>, payload: Payload) -> Packet {
        let sent_at = now_nanos().max(self.last_sent_at + 1);
        self.last_sent_at = sent_at;

        Packet::with_timestamp(sent_at, self.contact, response_to, payload)
    }

    fn handle_packet(&mut self, packet: Packet, from: SocketAddr) {
        // Any traffic refreshes the sender, at the address it was actually seen from.
        // A relayed broadcast still names its origin as sender, but comes from the relay.
        if let Some(id) = packet.sender().id() {
            if packet.command() != Command::Broadcast {
                self.routing_table.add_node(Contact::new(*id, from));
            }
        }

        match packet.response_to().copied() {
            Some(response_to) => self.handle_response(from, response_to, packet),
            None => self.handle_query(from, packet),
        }
    }

    /// Answer a query, replies are never awaited.
    fn reply(&mut self, from: SocketAddr, query: &Packet, payload: Payload) {
        let packet = self.packet(Some(*query.message_hash()), payload);

        debug!(?from, "Sending {}", packet.command());

        match PacketSocket::encode(&packet) {
            Ok(bytes) => {
                if let Err(error) = self.socket.send_bytes(from, &bytes) {
                    debug!(?error, ?from, "Could not write reply");
                }
            }
            Err(error) => debug!(?error, command = %packet.command(), "Could not encode reply"),
        }
    }

    /// Send a broadcast packet, unchanged, to every peer in the routing table.
    fn flood(&self, packet: &Packet) {
        let bytes = match PacketSocket::encode(packet) {
            Ok(bytes) => bytes,
            Err(error) => {
                debug!(?error, "Could not encode broadcast");
                return;
            }
        };

        for contact in self.routing_table.contacts() {
            if let Err(error) = self.socket.send_bytes(contact.address(), &bytes) {
                debug!(?error, peer = %contact, "Could not relay broadcast");
            }
        }
    }

    fn expire_pending(&mut self, now: Instant) {
        for (message_hash, request) in self.pending.expire(now) {
            let peer = *request.to();

            debug!(?message_hash, %peer, "Request timed out");
            request.resolve(Err(RequestError::Timeout(peer.to_string())));

            self.disconnect(&peer);
        }
    }

    /// Forget an unresponsive peer and fail its other pending requests.
    fn disconnect(&mut self, peer: &Contact) {
        self.routing_table.remove_node(peer);

        for (_, request) in self.pending.cancel_to(peer) {
            request.resolve(Err(RequestError::Disconnected(peer.to_string())));
        }
    }
}
