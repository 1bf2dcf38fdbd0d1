//! Main Crate Error

use std::net::SocketAddr;

use crate::common::Command;

#[derive(thiserror::Error, Debug)]
/// Dhtrpc crate error enum, mostly returned while decoding packets.
pub enum Error {
    #[error("Failed to parse packet bytes: {0}")]
    BencodeError(#[from] serde_bencode::Error),

    /// Id bytes are not exactly [ID_SIZE](crate::ID_SIZE) long.
    #[error("Invalid Id size, expected 20, got {0}")]
    InvalidIdSize(usize),

    /// Id string is not 40 hex characters.
    #[error("Invalid Id encoding: {0}")]
    InvalidIdEncoding(String),

    /// The command code doesn't map to any known [Command].
    #[error("Unknown command: {0}")]
    UnknownCommand(u8),

    /// The packet's command requires an argument that is missing.
    #[error("{0} is required for this command")]
    MissingArgument(&'static str),

    /// A contact address couldn't be parsed as `ip:port`.
    #[error("Invalid contact address: {0}")]
    InvalidAddress(String),

    /// The `h` field doesn't match the hash of the packet content.
    #[error("Message hash doesn't match the packet content")]
    MessageHashMismatch,

    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
/// Errors encoding an outgoing packet.
pub enum EncodeError {
    #[error("Failed to encode packet: {0}")]
    BencodeError(#[from] serde_bencode::Error),

    /// Encoded packet doesn't fit in a single datagram.
    #[error("Packet of {0} bytes exceeds the maximum datagram size")]
    TooLarge(usize),
}

#[derive(thiserror::Error, Debug)]
/// The single outcome delivered to a caller waiting on a failed request.
pub enum RequestError {
    /// The request couldn't be serialized, nothing was sent.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The socket refused to write the request.
    #[error("Failed to write request to {address}: {source}")]
    Write {
        address: SocketAddr,
        source: std::io::Error,
    },

    /// No response arrived before the request timeout.
    #[error("{0} Timeout")]
    Timeout(String),

    /// Another request to the same peer timed out, and the peer was dropped.
    #[error("{0} Disconnected")]
    Disconnected(String),

    /// A request with the same message hash is already waiting for a response.
    #[error("Request with the same message hash is already pending")]
    DuplicateRequest,

    /// The peer answered with a command that doesn't answer this request.
    #[error("Unexpected response command: {0:?}")]
    UnexpectedResponse(Command),

    /// The node's actor thread stopped before resolving this request.
    #[error("Dht actor was shutdown")]
    Shutdown,
}

#[derive(thiserror::Error, Debug, Clone, Copy)]
#[error("The Dht was shutdown")]
/// Calling a [crate::Dht] method after its actor thread exited.
pub struct DhtWasShutdown;
