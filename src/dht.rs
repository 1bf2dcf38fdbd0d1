//! Dht node.

mod actor;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use flume::Sender;

use crate::common::{Contact, Id};
use crate::error::DhtWasShutdown;
use crate::node::Node;
use crate::rpc::{Application, Config, Info};

pub(crate) use actor::ActorMessage;
use actor::Actor;

#[derive(Debug, Clone)]
/// Dht node.
///
/// The node runs on its own thread until [Dht::shutdown] is called or every
/// clone of this handle, including the ones held by [Node]s, is dropped.
pub struct Dht(pub(crate) Sender<ActorMessage>);

#[derive(Debug, Default)]
/// Dht node builder
pub struct DhtBuilder(Config);

impl DhtBuilder {
    /// Set this node's [Id], random by default.
    pub fn id(mut self, id: Id) -> Self {
        self.0.id = Some(id);

        self
    }

    /// Set the ip address to bind to, `0.0.0.0` by default.
    pub fn bind_ip(mut self, bind_ip: IpAddr) -> Self {
        self.0.bind_ip = bind_ip;

        self
    }

    /// Set the port to listen on, an ephemeral port by default.
    pub fn port(mut self, port: u16) -> Self {
        self.0.port = Some(port);

        self
    }

    /// Set how long a request waits for its response.
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.0.request_timeout = request_timeout;

        self
    }

    /// Set how many broadcast message hashes to remember for deduplication.
    pub fn max_seen_broadcasts(mut self, max_seen_broadcasts: usize) -> Self {
        self.0.max_seen_broadcasts = max_seen_broadcasts;

        self
    }

    /// Set the peers known at startup, replacing any previously added.
    pub fn contacts(mut self, contacts: Vec<Contact>) -> Self {
        self.0.contacts = contacts;

        self
    }

    /// Add a peer known at startup.
    pub fn add_contact(mut self, contact: Contact) -> Self {
        self.0.contacts.push(contact);

        self
    }

    /// Set the hooks handling stores, custom commands and broadcasts.
    pub fn application(mut self, application: impl Application + 'static) -> Self {
        self.0.application = Some(Box::new(application));

        self
    }

    /// Create a Dht node.
    pub fn build(self) -> Result<Dht, std::io::Error> {
        Dht::new(self.0)
    }
}

impl Dht {
    /// Create a new Dht node.
    ///
    /// Could return an error if it failed to bind to the specified
    /// port or other io errors while binding the udp socket.
    pub fn new(config: Config) -> Result<Self, std::io::Error> {
        let (sender, receiver) = flume::unbounded();

        thread::Builder::new()
            .name("dhtrpc".to_string())
            .spawn(move || run(config, receiver))?;

        let (tx, rx) = flume::bounded(1);

        let _ = sender.send(ActorMessage::Check(tx));

        rx.recv().unwrap_or_else(|_| {
            Err(std::io::Error::other("dhtrpc actor thread exited unexpectedly"))
        })?;

        Ok(Dht(sender))
    }

    /// Returns a builder to edit settings before creating a Dht node.
    pub fn builder() -> DhtBuilder {
        DhtBuilder::default()
    }

    // === Getters ===

    /// Information and statistics about this [Dht] node.
    pub fn info(&self) -> Result<Info, DhtWasShutdown> {
        let (sender, receiver) = flume::bounded::<Info>(1);

        self.0
            .send(ActorMessage::Info(sender))
            .map_err(|_| DhtWasShutdown)?;

        receiver.recv().map_err(|_| DhtWasShutdown)
    }

    /// Local UDP socket address that this node is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, DhtWasShutdown> {
        Ok(self.info()?.local_addr())
    }

    /// This node's [Contact], reachable on `127.0.0.1` if it listens on all interfaces.
    pub fn contact(&self) -> Result<Contact, DhtWasShutdown> {
        let info = self.info()?;
        let mut address = info.local_addr();

        if address.ip().is_unspecified() {
            address.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }

        Ok(Contact::new(*info.id(), address))
    }

    /// Contacts currently in the routing table.
    pub fn contacts(&self) -> Result<Vec<Contact>, DhtWasShutdown> {
        let (sender, receiver) = flume::bounded::<Vec<Contact>>(1);

        self.0
            .send(ActorMessage::Contacts(sender))
            .map_err(|_| DhtWasShutdown)?;

        receiver.recv().map_err(|_| DhtWasShutdown)
    }

    // === Public Methods ===

    /// Add a peer, see [crate::rpc::Rpc::add_contact].
    pub fn add_contact(&self, contact: Contact) -> Result<(), DhtWasShutdown> {
        self.0
            .send(ActorMessage::AddContact(contact))
            .map_err(|_| DhtWasShutdown)
    }

    /// A handle to send requests to `contact`.
    pub fn node(&self, contact: Contact) -> Node {
        Node::new(contact, self.clone())
    }

    /// Flood `value` to every known peer, each of which relays it once.
    ///
    /// Returns the broadcast's message hash.
    pub fn broadcast(&self, value: Bytes) -> Result<Id, DhtWasShutdown> {
        let (sender, receiver) = flume::bounded::<Id>(1);

        self.0
            .send(ActorMessage::Broadcast(value, sender))
            .map_err(|_| DhtWasShutdown)?;

        receiver.recv().map_err(|_| DhtWasShutdown)
    }

    /// Store a value in this node's own store.
    ///
    /// Returns `false` if the key is already taken, values are never overwritten.
    pub fn store_local(&self, key: Id, value: Bytes) -> Result<bool, DhtWasShutdown> {
        let (sender, receiver) = flume::bounded::<bool>(1);

        self.0
            .send(ActorMessage::StoreLocal(key, value, sender))
            .map_err(|_| DhtWasShutdown)?;

        receiver.recv().map_err(|_| DhtWasShutdown)
    }

    /// Read a value from this node's own store.
    pub fn get_local(&self, key: Id) -> Result<Option<Bytes>, DhtWasShutdown> {
        let (sender, receiver) = flume::bounded::<Option<Bytes>>(1);

        self.0
            .send(ActorMessage::GetLocal(key, sender))
            .map_err(|_| DhtWasShutdown)?;

        receiver.recv().map_err(|_| DhtWasShutdown)
    }

    /// Shutdown the actor thread loop.
    ///
    /// Requests still pending resolve with [crate::RequestError::Shutdown].
    pub fn shutdown(&mut self) {
        let (sender, receiver) = flume::bounded::<()>(1);

        let _ = self.0.send(ActorMessage::Shutdown(sender));
        let _ = receiver.recv();
    }
}

fn run(config: Config, receiver: flume::Receiver<ActorMessage>) {
    match Actor::new(config, receiver.clone()) {
        Ok(mut actor) => while actor.tick().is_ok() {},
        Err(err) => {
            if let Ok(ActorMessage::Check(sender)) = receiver.recv() {
                let _ = sender.send(Err(err));
            }
        }
    }
}

/// Create a testnet of Dht nodes on `127.0.0.1` that all know each other.
#[derive(Debug)]
pub struct Testnet {
    pub nodes: Vec<Dht>,
    pub contacts: Vec<Contact>,
}

impl Testnet {
    pub fn new(count: usize) -> Result<Testnet, std::io::Error> {
        Testnet::with(count, |_| Dht::builder())
    }

    /// Create a testnet, configuring each node's builder, by index, with `builder`.
    ///
    /// The bind ip is always overridden to `127.0.0.1`.
    pub fn with(
        count: usize,
        mut builder: impl FnMut(usize) -> DhtBuilder,
    ) -> Result<Testnet, std::io::Error> {
        let mut nodes: Vec<Dht> = vec![];
        let mut contacts: Vec<Contact> = vec![];

        for i in 0..count {
            let node = builder(i)
                .bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
                .build()?;

            let contact = node.contact().map_err(std::io::Error::other)?;

            nodes.push(node);
            contacts.push(contact);
        }

        for node in &nodes {
            for contact in &contacts {
                node.add_contact(*contact).map_err(std::io::Error::other)?;
            }
        }

        Ok(Self { nodes, contacts })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shutdown() {
        let mut dht = Dht::builder()
            .bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .build()
            .unwrap();

        let clone = dht.clone();

        dht.shutdown();

        assert!(matches!(clone.info(), Err(DhtWasShutdown)));
    }

    #[test]
    fn bind_twice() {
        let a = Dht::builder()
            .bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .build()
            .unwrap();
        let port = a.local_addr().unwrap().port();

        let result = Dht::builder()
            .bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .port(port)
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn testnet_knows_everyone() {
        let testnet = Testnet::new(5).unwrap();

        for (i, node) in testnet.nodes.iter().enumerate() {
            let contacts = node.contacts().unwrap();

            assert_eq!(contacts.len(), 4);
            assert!(!contacts.contains(&testnet.contacts[i]), "never itself");
        }
    }

    #[test]
    fn local_store_is_write_once() {
        let dht = Dht::builder()
            .bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .build()
            .unwrap();
        let key = Id::hash(b"key");

        assert!(dht.store_local(key, Bytes::from_static(b"v1")).unwrap());
        assert!(!dht.store_local(key, Bytes::from_static(b"v2")).unwrap());
        assert_eq!(dht.get_local(key).unwrap(), Some(Bytes::from_static(b"v1")));

        let info = dht.info().unwrap();
        assert_eq!(info.stored_values(), 1);
    }
}
