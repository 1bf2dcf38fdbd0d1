#![doc = include_str!("../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

mod common;
mod dht;
mod error;
mod node;

#[cfg(feature = "async")]
pub mod async_dht;
pub mod rpc;

pub use crate::common::{
    Command, Contact, Id, Packet, PacketHeader, Payload, RoutingEntry, RoutingTable,
    StoreInstruction, ID_SIZE, MAX_BUCKET_SIZE_K, UNKNOWN_CUSTOM_ANSWER,
};
pub use bytes::Bytes;
pub use dht::{Dht, DhtBuilder, Testnet};
pub use node::{FetchResponse, Node};

pub use error::{DhtWasShutdown, EncodeError, Error, RequestError};
