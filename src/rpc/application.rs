//! Application hooks invoked by incoming queries.

use bytes::Bytes;

use crate::common::Packet;

/// Application logic plugged into the query handlers.
///
/// Every hook runs on the actor thread, while the node is not reading its
/// socket, thus it needs to be very fast and lightweight.
pub trait Application: std::fmt::Debug + Send {
    /// Validate an incoming [crate::common::Payload::Store].
    ///
    /// Only called for keys that are not stored yet. Returning `false` rejects
    /// the value, and the requester receives `Stored(false)`.
    fn on_store(&mut self, _packet: &Packet) -> bool {
        true
    }

    /// Answer an incoming [crate::common::Payload::Custom].
    ///
    /// Returning `None` answers with [crate::common::UNKNOWN_CUSTOM_ANSWER].
    fn on_custom_command(&mut self, _packet: &Packet) -> Option<Bytes> {
        None
    }

    /// Called once per broadcast message hash, after it was relayed to known peers.
    fn on_broadcast(&mut self, _packet: &Packet) {}
}

#[derive(Debug, Default)]
/// Accepts every store, answers no custom command and ignores broadcasts.
pub struct DefaultApplication;

impl Application for DefaultApplication {}
