//! Request/response correlation against real UDP nodes and raw sockets.
//!
//! Run with: cargo test --test rpc

use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::Duration;

use dhtrpc::rpc::MTU;
use dhtrpc::{
    Bytes, Contact, Dht, FetchResponse, Id, Packet, Payload, RequestError, Testnet,
};

fn local_dht() -> Dht {
    Dht::builder()
        .bind_ip([127, 0, 0, 1].into())
        .request_timeout(Duration::from_millis(500))
        .build()
        .unwrap()
}

/// A hand driven peer, answering with whatever the test decides.
struct RawPeer {
    socket: UdpSocket,
    contact: Contact,
}

impl RawPeer {
    fn new() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let contact = Contact::new(Id::random(), socket.local_addr().unwrap());

        Self { socket, contact }
    }

    fn recv(&self) -> (Packet, SocketAddr) {
        let mut buf = [0u8; MTU];
        let (amt, from) = self.socket.recv_from(&mut buf).unwrap();

        (Packet::from_bytes(&buf[..amt]).unwrap(), from)
    }

    fn reply(&self, to: SocketAddr, query: &Packet, payload: Payload) {
        let packet = Packet::new(self.contact, Some(*query.message_hash()), payload);

        self.socket.send_to(&packet.to_bytes().unwrap(), to).unwrap();
    }
}

#[test]
fn ping_pong() {
    let testnet = Testnet::new(2).unwrap();

    testnet.nodes[0].node(testnet.contacts[1]).ping().unwrap();
    testnet.nodes[1].node(testnet.contacts[0]).ping().unwrap();
}

#[test]
fn store_fetch() {
    let testnet = Testnet::new(3).unwrap();

    let a = &testnet.nodes[0];
    let b = a.node(testnet.contacts[1]);

    let key = Id::hash(b"H");
    let value = Bytes::from_static(b"V");

    assert!(b.store(key, value.clone()).unwrap());
    assert_eq!(b.fetch(key).unwrap(), FetchResponse::Found(value.clone()));

    // Nobody else stored it.
    let c = a.node(testnet.contacts[2]);
    assert!(matches!(c.fetch(key).unwrap(), FetchResponse::Nodes(_)));

    // From another source, the first value still wins.
    let b_from_c = testnet.nodes[2].node(testnet.contacts[1]);
    assert!(!b_from_c.store(key, Bytes::from_static(b"V2")).unwrap());
    assert_eq!(testnet.nodes[1].get_local(key).unwrap(), Some(value));
}

#[test]
fn response_correlated_by_message_hash() {
    let dht = local_dht();
    let peer = RawPeer::new();

    let reply = dht.node(peer.contact).send(Payload::Fetch(Id::random()));

    let (query, from) = peer.recv();
    assert_eq!(query.command(), dhtrpc::Command::Fetch);
    assert!(!query.is_response());

    // Unknown correlation is dropped without resolving anything.
    let stray = Packet::new(peer.contact, None, Payload::Ping);
    peer.reply(from, &stray, Payload::Found(Bytes::from_static(b"stray")));

    thread::sleep(Duration::from_millis(50));
    assert!(reply.try_recv().is_none());

    peer.reply(from, &query, Payload::Found(Bytes::from_static(b"value")));

    let packet = reply.recv().unwrap().unwrap();
    assert_eq!(packet.response_to(), Some(query.message_hash()));
    assert_eq!(packet.payload(), &Payload::Found(Bytes::from_static(b"value")));

    assert_eq!(dht.info().unwrap().pending_requests(), 0);
}

#[test]
fn unexpected_response_command() {
    let dht = local_dht();
    let peer = RawPeer::new();
    let node = dht.node(peer.contact);

    let handle = thread::spawn(move || node.store(Id::random(), Bytes::from_static(b"v")));

    let (query, from) = peer.recv();
    peer.reply(from, &query, Payload::CustomAnswer(Bytes::from_static(b"?")));

    assert!(matches!(
        handle.join().unwrap(),
        Err(RequestError::UnexpectedResponse(dhtrpc::Command::CustomAnswer))
    ));
}

#[test]
fn timeout_exactly_once() {
    let dht = local_dht();
    let peer = RawPeer::new();

    dht.add_contact(peer.contact).unwrap();

    let reply = dht.node(peer.contact).send(Payload::Ping);

    let (query, from) = peer.recv();

    assert!(matches!(reply.recv(), Err(RequestError::Timeout(_))));

    // A late answer finds nothing to resolve.
    peer.reply(from, &query, Payload::Pong);
    thread::sleep(Duration::from_millis(50));

    let info = dht.info().unwrap();
    assert_eq!(info.pending_requests(), 0);

    // The late Pong is still traffic from an identified peer.
    assert_eq!(info.routing_table_size(), 1);
}

#[test]
fn write_error() {
    let dht = local_dht();

    let unreachable = Contact::new(Id::random(), "[::1]:6881".parse().unwrap());

    assert!(matches!(
        dht.node(unreachable).ping(),
        Err(RequestError::Write { .. })
    ));
    assert_eq!(dht.info().unwrap().pending_requests(), 0);
}

#[test]
fn encode_error() {
    let dht = local_dht();
    let peer = RawPeer::new();

    let result = dht
        .node(peer.contact)
        .store(Id::random(), Bytes::from(vec![0u8; MTU]));

    assert!(matches!(result, Err(RequestError::Encode(_))));
    assert_eq!(dht.info().unwrap().pending_requests(), 0);
}

#[test]
fn bootstrap_from_address() {
    let a = local_dht();
    let a_contact = a.contact().unwrap();

    let b = Dht::builder()
        .bind_ip([127, 0, 0, 1].into())
        .add_contact(Contact::from_address(a_contact.address()))
        .build()
        .unwrap();

    let start = std::time::Instant::now();
    while b.contacts().unwrap().is_empty() && start.elapsed() < Duration::from_secs(2) {
        thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(b.contacts().unwrap(), vec![a_contact]);
    // The ping introduced b to a as well.
    assert_eq!(a.contacts().unwrap().len(), 1);
}

#[test]
fn query_command_as_response_keeps_request_pending() {
    let dht = local_dht();
    let peer = RawPeer::new();

    let reply = dht.node(peer.contact).send(Payload::Fetch(Id::random()));

    let (query, from) = peer.recv();

    peer.reply(from, &query, Payload::Ping);

    thread::sleep(Duration::from_millis(50));
    assert!(reply.try_recv().is_none());
    assert_eq!(dht.info().unwrap().pending_requests(), 1);

    peer.reply(from, &query, Payload::Found(Bytes::from_static(b"value")));

    let packet = reply.recv().unwrap().unwrap();
    assert_eq!(packet.payload(), &Payload::Found(Bytes::from_static(b"value")));
    assert_eq!(dht.info().unwrap().pending_requests(), 0);
}

#[test]
fn response_command_without_response_to_is_dropped() {
    let dht = local_dht();
    let address = dht.local_addr().unwrap();
    let peer = RawPeer::new();

    peer.socket
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();

    let unsolicited = Packet::new(peer.contact, None, Payload::Pong);
    peer.socket
        .send_to(&unsolicited.to_bytes().unwrap(), address)
        .unwrap();

    let mut buf = [0u8; MTU];
    assert!(peer.socket.recv_from(&mut buf).is_err(), "no reply");

    // Still answering real queries.
    let ping = Packet::new(peer.contact, None, Payload::Ping);
    peer.socket
        .send_to(&ping.to_bytes().unwrap(), address)
        .unwrap();

    let (pong, _) = peer.recv();
    assert_eq!(pong.payload(), &Payload::Pong);
    assert_eq!(pong.response_to(), Some(ping.message_hash()));
}
