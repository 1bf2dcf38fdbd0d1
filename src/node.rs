//! Handle to a remote peer, initiating every request verb.

use std::time::Instant;

use bytes::Bytes;

use crate::common::{Command, Contact, Id, Packet, Payload, StoreInstruction};
use crate::dht::{ActorMessage, Dht};
use crate::error::{DhtWasShutdown, RequestError};
use crate::rpc::{PendingReply, ReplyResult, ReplySlot};

#[derive(Debug, Clone)]
/// A remote peer, reached through a local [Dht] node.
pub struct Node {
    contact: Contact,
    dht: Dht,
}

#[derive(Debug, Clone, PartialEq)]
/// Answer to a [Node::fetch].
pub enum FetchResponse {
    /// The peer stores the value.
    Found(Bytes),
    /// The peer doesn't store the value, these are the closest peers it knows.
    Nodes(Vec<Contact>),
}

impl Node {
    pub(crate) fn new(contact: Contact, dht: Dht) -> Self {
        Self { contact, dht }
    }

    // === Getters ===

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    /// When traffic was last received from this peer.
    ///
    /// Returns `None` if the peer is not in the routing table, either because it
    /// was never heard from, or because it was disconnected after a timeout.
    pub fn last_seen(&self) -> Result<Option<Instant>, DhtWasShutdown> {
        let (sender, receiver) = flume::bounded::<Option<Instant>>(1);

        self.dht
            .0
            .send(ActorMessage::LastSeen(self.contact, sender))
            .map_err(|_| DhtWasShutdown)?;

        receiver.recv().map_err(|_| DhtWasShutdown)
    }

    // === Public Methods ===

    /// Send any request payload, and return the handle to its single outcome.
    pub fn send(&self, payload: Payload) -> PendingReply {
        let (slot, reply) = ReplySlot::new();

        // If the actor is gone, the slot is dropped with the message and the
        // reply resolves to [RequestError::Shutdown].
        let _ = self
            .dht
            .0
            .send(ActorMessage::Request(self.contact, payload, slot));

        reply
    }

    /// Liveness probe.
    pub fn ping(&self) -> Result<(), RequestError> {
        expect_pong(self.send(Payload::Ping).recv())
    }

    /// Ask for the value stored under `key`, or the peer's closest contacts to it.
    pub fn fetch(&self, key: Id) -> Result<FetchResponse, RequestError> {
        expect_fetch(self.send(Payload::Fetch(key)).recv())
    }

    /// Ask for the peer's closest contacts to `key`.
    pub fn fetch_nodes(&self, key: Id) -> Result<Vec<Contact>, RequestError> {
        expect_nodes(self.send(Payload::FetchNodes(key)).recv())
    }

    /// Ask the peer to store `value` under `key`.
    ///
    /// Returns `false` if the peer rejected it, because the key was already
    /// taken or its application refused the value.
    pub fn store(&self, key: Id, value: Bytes) -> Result<bool, RequestError> {
        expect_stored(
            self.send(Payload::Store(StoreInstruction { key, value }))
                .recv(),
        )
    }

    /// Send an application defined command.
    pub fn custom(&self, value: Bytes) -> Result<Bytes, RequestError> {
        expect_custom_answer(self.send(Payload::Custom(value)).recv())
    }
}

pub(crate) fn expect_pong(result: ReplyResult) -> Result<(), RequestError> {
    match result? {
        None => Ok(()),
        Some(packet) => Err(RequestError::UnexpectedResponse(packet.command())),
    }
}

pub(crate) fn expect_fetch(result: ReplyResult) -> Result<FetchResponse, RequestError> {
    match expect_packet(result)?.into_payload() {
        Payload::Found(value) => Ok(FetchResponse::Found(value)),
        Payload::FoundNodes(contacts) => Ok(FetchResponse::Nodes(contacts)),
        payload => Err(RequestError::UnexpectedResponse(payload.command())),
    }
}

pub(crate) fn expect_nodes(result: ReplyResult) -> Result<Vec<Contact>, RequestError> {
    match expect_packet(result)?.into_payload() {
        Payload::FoundNodes(contacts) => Ok(contacts),
        payload => Err(RequestError::UnexpectedResponse(payload.command())),
    }
}

pub(crate) fn expect_stored(result: ReplyResult) -> Result<bool, RequestError> {
    match expect_packet(result)?.into_payload() {
        Payload::Stored(accepted) => Ok(accepted),
        payload => Err(RequestError::UnexpectedResponse(payload.command())),
    }
}

pub(crate) fn expect_custom_answer(result: ReplyResult) -> Result<Bytes, RequestError> {
    match expect_packet(result)?.into_payload() {
        Payload::CustomAnswer(value) => Ok(value),
        payload => Err(RequestError::UnexpectedResponse(payload.command())),
    }
}

/// A bare acknowledgement is only expected for a Ping.
fn expect_packet(result: ReplyResult) -> Result<Packet, RequestError> {
    result?.ok_or(RequestError::UnexpectedResponse(Command::Pong))
}

#[cfg(test)]
mod test {
    use std::net::UdpSocket;
    use std::time::Duration;

    use crate::common::UNKNOWN_CUSTOM_ANSWER;
    use crate::dht::Testnet;
    use crate::rpc::Application;

    use super::*;

    #[test]
    fn ping() {
        let testnet = Testnet::new(2).unwrap();

        let b = testnet.nodes[0].node(testnet.contacts[1]);

        b.ping().unwrap();
        assert!(b.last_seen().unwrap().is_some());
    }

    #[test]
    fn store_then_fetch() {
        let testnet = Testnet::new(2).unwrap();
        let b = testnet.nodes[0].node(testnet.contacts[1]);

        let key = Id::hash(b"hello");
        let value = Bytes::from_static(b"world");

        assert!(b.store(key, value.clone()).unwrap());
        assert_eq!(b.fetch(key).unwrap(), FetchResponse::Found(value.clone()));

        assert!(!b.store(key, Bytes::from_static(b"other")).unwrap());
        assert_eq!(b.fetch(key).unwrap(), FetchResponse::Found(value));
    }

    #[test]
    fn fetch_missing_returns_closest() {
        let testnet = Testnet::new(4).unwrap();
        let b = testnet.nodes[0].node(testnet.contacts[1]);

        let key = Id::random();

        let FetchResponse::Nodes(nodes) = b.fetch(key).unwrap() else {
            panic!("expected nodes");
        };

        let expected = testnet.nodes[1].contacts().unwrap();

        assert_eq!(nodes.len(), expected.len());
        for contact in expected {
            assert!(nodes.contains(&contact));
        }

        assert_eq!(b.fetch_nodes(key).unwrap().len(), nodes.len());
    }

    #[derive(Debug)]
    struct Echo;

    impl Application for Echo {
        fn on_custom_command(&mut self, packet: &Packet) -> Option<Bytes> {
            match packet.payload() {
                Payload::Custom(value) => Some(value.clone()),
                _ => None,
            }
        }

        fn on_store(&mut self, packet: &Packet) -> bool {
            matches!(packet.payload(), Payload::Store(StoreInstruction { value, .. }) if !value.is_empty())
        }
    }

    #[test]
    fn custom_command() {
        let testnet = Testnet::with(3, |i| {
            let builder = Dht::builder();

            if i == 1 {
                builder.application(Echo)
            } else {
                builder
            }
        })
        .unwrap();

        let echo = testnet.nodes[0].node(testnet.contacts[1]);
        let default = testnet.nodes[0].node(testnet.contacts[2]);

        let value = Bytes::from_static(b"marco");

        assert_eq!(echo.custom(value.clone()).unwrap(), value);
        assert_eq!(
            default.custom(value).unwrap(),
            Bytes::from_static(UNKNOWN_CUSTOM_ANSWER)
        );
    }

    #[test]
    fn store_validation_hook() {
        let testnet = Testnet::with(2, |_| Dht::builder().application(Echo)).unwrap();
        let b = testnet.nodes[0].node(testnet.contacts[1]);

        let key = Id::hash(b"empty");

        assert!(!b.store(key, Bytes::new()).unwrap());
        assert!(matches!(b.fetch(key).unwrap(), FetchResponse::Nodes(_)));

        assert!(b.store(key, Bytes::from_static(b"not empty")).unwrap());
    }

    #[test]
    fn timeout() {
        let timeout = Duration::from_millis(100);

        let testnet = Testnet::with(1, |_| Dht::builder().request_timeout(timeout)).unwrap();
        let dht = &testnet.nodes[0];

        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let contact = Contact::new(Id::random(), silent.local_addr().unwrap());

        dht.add_contact(contact).unwrap();

        let node = dht.node(contact);

        assert!(matches!(node.ping(), Err(RequestError::Timeout(_))));

        let info = dht.info().unwrap();
        assert_eq!(info.pending_requests(), 0);
        assert_eq!(info.routing_table_size(), 0);
        assert!(node.last_seen().unwrap().is_none());
    }

    #[test]
    fn shutdown_resolves_pending() {
        let testnet = Testnet::with(1, |_| Dht::builder()).unwrap();
        let mut dht = testnet.nodes[0].clone();

        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let node = dht.node(Contact::new(Id::random(), silent.local_addr().unwrap()));

        let reply = node.send(Payload::Ping);

        dht.shutdown();

        assert!(matches!(reply.recv(), Err(RequestError::Shutdown)));
    }
}
