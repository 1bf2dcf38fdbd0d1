use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::common::{Contact, Id};

use super::application::Application;

/// Default request timeout before abandoning a pending request and disconnecting the peer.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Default number of broadcast message hashes remembered for deduplication.
pub const MAX_SEEN_BROADCASTS: usize = 10_000;

#[derive(Debug)]
/// Dht Configurations
pub struct Config {
    /// This node's identity.
    ///
    /// Defaults to None, where a random [Id] is used.
    pub id: Option<Id>,
    /// Ip address to bind the UDP socket to.
    ///
    /// Defaults to `0.0.0.0`
    pub bind_ip: IpAddr,
    /// Explicit port to listen on.
    ///
    /// Defaults to None, where the OS picks a free port.
    pub port: Option<u16>,
    /// How long a request waits for its response.
    ///
    /// A request that times out disconnects the peer it was sent to.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT]
    pub request_timeout: Duration,
    /// How many broadcast message hashes to remember.
    ///
    /// A broadcast that comes back after its hash was evicted is handled again,
    /// so this should comfortably exceed the number of broadcasts circulating
    /// within one flood round.
    ///
    /// Defaults to [MAX_SEEN_BROADCASTS]
    pub max_seen_broadcasts: usize,
    /// Peers known at startup.
    ///
    /// Contacts with an [Id] go straight to the routing table,
    /// address-only contacts are pinged instead.
    pub contacts: Vec<Contact>,
    /// Hooks called for store validation, custom commands and broadcasts.
    ///
    /// Defaults to None, where [super::DefaultApplication] is used.
    pub application: Option<Box<dyn Application>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: None,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_seen_broadcasts: MAX_SEEN_BROADCASTS,
            contacts: vec![],
            application: None,
        }
    }
}
