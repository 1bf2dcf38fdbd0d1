//! Serialize and deserialize packets exchanged between peers.

mod internal;

use std::convert::TryFrom;
use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tracing::warn;

use crate::common::{Contact, Id, ID_SIZE};
use crate::Error;

/// Sentinel answer to a [Command::Custom] request the application didn't handle.
pub const UNKNOWN_CUSTOM_ANSWER: &[u8] = b"Unknown";

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Verb carried in every packet header.
pub enum Command {
    Noop = 0,
    Ping = 1,
    Pong = 2,
    Store = 3,
    Stored = 4,
    Fetch = 5,
    FetchNodes = 6,
    Found = 7,
    FoundNodes = 8,
    Broadcast = 9,
    Custom = 10,
    CustomAnswer = 11,
}

impl Command {
    /// Returns `true` if this command may only be sent as a query.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Command::Ping
                | Command::Store
                | Command::Fetch
                | Command::FetchNodes
                | Command::Broadcast
                | Command::Custom
        )
    }

    /// Returns `true` if this command may only be sent as a reply.
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Command::Pong
                | Command::Stored
                | Command::Found
                | Command::FoundNodes
                | Command::CustomAnswer
        )
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Error> {
        Ok(match code {
            0 => Command::Noop,
            1 => Command::Ping,
            2 => Command::Pong,
            3 => Command::Store,
            4 => Command::Stored,
            5 => Command::Fetch,
            6 => Command::FetchNodes,
            7 => Command::Found,
            8 => Command::FoundNodes,
            9 => Command::Broadcast,
            10 => Command::Custom,
            11 => Command::CustomAnswer,
            _ => return Err(Error::UnknownCommand(code)),
        })
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Noop => "NOOP",
            Command::Ping => "PING",
            Command::Pong => "PONG",
            Command::Store => "STORE",
            Command::Stored => "STORED",
            Command::Fetch => "FETCH",
            Command::FetchNodes => "FETCH_NODES",
            Command::Found => "FOUND",
            Command::FoundNodes => "FOUND_NODES",
            Command::Broadcast => "BROADCAST",
            Command::Custom => "CUSTOM",
            Command::CustomAnswer => "CUSTOM_ANSWER",
        };

        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Key and value pushed by a [Command::Store] request.
pub struct StoreInstruction {
    pub key: Id,
    pub value: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
/// Command specific payload, one variant per [Command].
pub enum Payload {
    Noop,
    Ping,
    Pong,
    Store(StoreInstruction),
    /// Whether the value was accepted.
    Stored(bool),
    Fetch(Id),
    FetchNodes(Id),
    Found(Bytes),
    FoundNodes(Vec<Contact>),
    Broadcast(Bytes),
    Custom(Bytes),
    CustomAnswer(Bytes),
}

impl Payload {
    pub fn command(&self) -> Command {
        match self {
            Payload::Noop => Command::Noop,
            Payload::Ping => Command::Ping,
            Payload::Pong => Command::Pong,
            Payload::Store(_) => Command::Store,
            Payload::Stored(_) => Command::Stored,
            Payload::Fetch(_) => Command::Fetch,
            Payload::FetchNodes(_) => Command::FetchNodes,
            Payload::Found(_) => Command::Found,
            Payload::FoundNodes(_) => Command::FoundNodes,
            Payload::Broadcast(_) => Command::Broadcast,
            Payload::Custom(_) => Command::Custom,
            Payload::CustomAnswer(_) => Command::CustomAnswer,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PacketHeader {
    /// Unix time in nanoseconds.
    pub sent_at: i64,
    pub command: Command,
    pub sender: Contact,
    /// Message hash of the query this packet answers, `None` for queries.
    pub response_to: Option<Id>,
    pub message_hash: Id,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    header: PacketHeader,
    payload: Payload,
}

impl Packet {
    /// Create a packet stamped with the current time.
    pub fn new(sender: Contact, response_to: Option<Id>, payload: Payload) -> Packet {
        Packet::with_timestamp(now_nanos(), sender, response_to, payload)
    }

    /// Create a packet with an explicit `sent_at`, and derive its message hash.
    pub fn with_timestamp(
        sent_at: i64,
        sender: Contact,
        response_to: Option<Id>,
        payload: Payload,
    ) -> Packet {
        let mut packet = Packet {
            header: PacketHeader {
                sent_at,
                command: payload.command(),
                sender,
                response_to,
                message_hash: Id([0; ID_SIZE]),
            },
            payload,
        };

        packet.header.message_hash = match packet.compute_hash() {
            Ok(hash) => hash,
            Err(error) => {
                warn!(?error, "Could not encode packet content for hashing");
                Id::random()
            }
        };

        packet
    }

    // === Getters ===

    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn command(&self) -> Command {
        self.header.command
    }

    pub fn sender(&self) -> &Contact {
        &self.header.sender
    }

    pub fn sent_at(&self) -> i64 {
        self.header.sent_at
    }

    pub fn message_hash(&self) -> &Id {
        &self.header.message_hash
    }

    pub fn response_to(&self) -> Option<&Id> {
        self.header.response_to.as_ref()
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Returns `true` if this packet answers a previous query.
    pub fn is_response(&self) -> bool {
        self.header.response_to.is_some()
    }

    // === Public Methods ===

    /// Hash of the canonical encoding of everything but the message hash itself.
    pub fn compute_hash(&self) -> Result<Id, serde_bencode::Error> {
        let bytes = self.to_wire(false).to_bytes()?;

        Ok(Id::hash(&bytes))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        self.to_wire(true).to_bytes()
    }

    /// Decode a packet, rejecting it if its message hash doesn't match its content.
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Packet, Error> {
        let wire = internal::WirePacket::from_bytes(bytes.as_ref())?;
        let packet = Packet::from_wire(wire)?;

        if packet.compute_hash()? != packet.header.message_hash {
            return Err(Error::MessageHashMismatch);
        }

        Ok(packet)
    }

    // === Private Methods ===

    fn to_wire(&self, with_hash: bool) -> internal::WirePacket {
        let mut arguments = internal::WireArguments::default();

        match &self.payload {
            Payload::Noop | Payload::Ping | Payload::Pong => {}
            Payload::Store(StoreInstruction { key, value }) => {
                arguments.key = Some(key.to_vec());
                arguments.value = Some(value.to_vec());
            }
            Payload::Stored(accepted) => {
                arguments.accepted = Some(i64::from(*accepted));
            }
            Payload::Fetch(key) | Payload::FetchNodes(key) => {
                arguments.key = Some(key.to_vec());
            }
            Payload::Found(value)
            | Payload::Broadcast(value)
            | Payload::Custom(value)
            | Payload::CustomAnswer(value) => {
                arguments.value = Some(value.to_vec());
            }
            Payload::FoundNodes(contacts) => {
                arguments.nodes = Some(contacts.iter().map(contact_to_wire).collect());
            }
        }

        internal::WirePacket {
            sent_at: self.header.sent_at,
            command: self.header.command as u8,
            sender: contact_to_wire(&self.header.sender),
            response_to: self
                .header
                .response_to
                .map(|id| id.to_vec())
                .unwrap_or_default(),
            message_hash: with_hash.then(|| self.header.message_hash.to_vec()),
            arguments,
        }
    }

    fn from_wire(wire: internal::WirePacket) -> Result<Packet, Error> {
        let command = Command::try_from(wire.command)?;
        let arguments = wire.arguments;

        let key = || -> Result<Id, Error> {
            Id::from_bytes(arguments.key.as_ref().ok_or(Error::MissingArgument("k"))?)
        };
        let value = || -> Result<Bytes, Error> {
            arguments
                .value
                .clone()
                .map(Bytes::from)
                .ok_or(Error::MissingArgument("v"))
        };

        let payload = match command {
            Command::Noop => Payload::Noop,
            Command::Ping => Payload::Ping,
            Command::Pong => Payload::Pong,
            Command::Store => Payload::Store(StoreInstruction {
                key: key()?,
                value: value()?,
            }),
            Command::Stored => Payload::Stored(
                arguments
                    .accepted
                    .ok_or(Error::MissingArgument("ok"))?
                    > 0,
            ),
            Command::Fetch => Payload::Fetch(key()?),
            Command::FetchNodes => Payload::FetchNodes(key()?),
            Command::Found => Payload::Found(value()?),
            Command::FoundNodes => Payload::FoundNodes(
                arguments
                    .nodes
                    .clone()
                    .ok_or(Error::MissingArgument("n"))?
                    .into_iter()
                    .map(contact_from_wire)
                    .collect::<Result<Vec<_>, Error>>()?,
            ),
            Command::Broadcast => Payload::Broadcast(value()?),
            Command::Custom => Payload::Custom(value()?),
            Command::CustomAnswer => Payload::CustomAnswer(value()?),
        };

        Ok(Packet {
            header: PacketHeader {
                sent_at: wire.sent_at,
                command,
                sender: contact_from_wire(wire.sender)?,
                response_to: if wire.response_to.is_empty() {
                    None
                } else {
                    Some(Id::from_bytes(wire.response_to)?)
                },
                message_hash: Id::from_bytes(
                    wire.message_hash.ok_or(Error::MissingArgument("h"))?,
                )?,
            },
            payload,
        })
    }
}

fn contact_to_wire(contact: &Contact) -> internal::WireContact {
    internal::WireContact {
        id: contact.id().map(|id| id.to_vec()),
        address: contact.address().to_string(),
    }
}

fn contact_from_wire(wire: internal::WireContact) -> Result<Contact, Error> {
    let address: SocketAddr = wire
        .address
        .parse()
        .map_err(|_| Error::InvalidAddress(wire.address.clone()))?;

    Ok(match wire.id {
        Some(id) => Contact::new(Id::from_bytes(id)?, address),
        None => Contact::from_address(address),
    })
}

/// Unix time in nanoseconds.
pub(crate) fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos() as i64)
        .unwrap_or_default()
}
