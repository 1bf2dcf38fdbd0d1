//! Miscellaneous common structs used throughout the library.

mod contact;
mod id;
pub mod packet;
mod routing_table;

pub use contact::*;
pub use id::*;
pub use packet::{Command, Packet, PacketHeader, Payload, StoreInstruction, UNKNOWN_CUSTOM_ANSWER};
pub use routing_table::*;
