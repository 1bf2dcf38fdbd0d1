//! Registry correlating sent requests with the callers waiting for their response.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use flume::{Receiver, Sender, TryRecvError};

use crate::common::{Contact, Id, Packet};
use crate::error::RequestError;

use super::socket::compare_socket_addr;

/// Outcome of a request: the response packet, `None` for a bare
/// acknowledgement (a Pong), or the error that ended it.
pub type ReplyResult = Result<Option<Packet>, RequestError>;

#[derive(Debug)]
/// Sending half of a request's result, consumed by the one value it delivers.
pub struct ReplySlot(Sender<ReplyResult>);

impl ReplySlot {
    /// Create a slot and the [PendingReply] observing it.
    pub fn new() -> (ReplySlot, PendingReply) {
        let (sender, receiver) = flume::bounded(1);

        (ReplySlot(sender), PendingReply(receiver))
    }

    /// A slot nobody waits on, for requests sent only for their side effects.
    pub(crate) fn detached() -> ReplySlot {
        ReplySlot::new().0
    }

    pub fn resolve(self, result: ReplyResult) {
        // The caller may have given up waiting, that's fine.
        let _ = self.0.send(result);
    }
}

#[derive(Debug)]
/// Receiving half of a request's result.
pub struct PendingReply(Receiver<ReplyResult>);

impl PendingReply {
    /// Block until the request is resolved.
    pub fn recv(self) -> ReplyResult {
        self.0.recv().unwrap_or(Err(RequestError::Shutdown))
    }

    /// Returns `None` while the request is still pending.
    pub fn try_recv(&self) -> Option<ReplyResult> {
        match self.0.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(RequestError::Shutdown)),
        }
    }

    #[cfg(feature = "async")]
    /// Async version of [Self::recv].
    pub async fn recv_async(self) -> ReplyResult {
        self.0
            .recv_async()
            .await
            .unwrap_or(Err(RequestError::Shutdown))
    }
}

#[derive(Debug)]
pub struct PendingRequest {
    to: Contact,
    deadline: Instant,
    slot: ReplySlot,
}

impl PendingRequest {
    /// The peer this request was sent to.
    pub fn to(&self) -> &Contact {
        &self.to
    }

    pub fn resolve(self, result: ReplyResult) {
        self.slot.resolve(result)
    }
}

#[derive(Debug)]
/// Pending requests keyed by the message hash of the request packet.
pub struct PendingRequests {
    request_timeout: Duration,
    requests: HashMap<Id, PendingRequest>,
}

impl PendingRequests {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            requests: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn contains(&self, message_hash: &Id) -> bool {
        self.requests.contains_key(message_hash)
    }

    /// Register a request, its deadline starts now.
    ///
    /// Gives the slot back if that message hash is already pending.
    pub fn insert(&mut self, message_hash: Id, to: Contact, slot: ReplySlot) -> Result<(), ReplySlot> {
        if self.requests.contains_key(&message_hash) {
            return Err(slot);
        }

        self.requests.insert(
            message_hash,
            PendingRequest {
                to,
                deadline: Instant::now() + self.request_timeout,
                slot,
            },
        );

        Ok(())
    }

    /// Take the request answered by a response from `from`.
    ///
    /// A response from another address than the request was sent to leaves the
    /// request pending.
    pub fn take(&mut self, message_hash: &Id, from: &SocketAddr) -> Option<PendingRequest> {
        match self.requests.get(message_hash) {
            Some(request) if compare_socket_addr(&request.to.address(), from) => {
                self.requests.remove(message_hash)
            }
            _ => None,
        }
    }

    pub fn remove(&mut self, message_hash: &Id) -> Option<PendingRequest> {
        self.requests.remove(message_hash)
    }

    /// Remove and return every request whose deadline passed at `now`.
    pub fn expire(&mut self, now: Instant) -> Vec<(Id, PendingRequest)> {
        let expired: Vec<Id> = self
            .requests
            .iter()
            .filter(|(_, request)| request.deadline <= now)
            .map(|(message_hash, _)| *message_hash)
            .collect();

        self.remove_all(expired)
    }

    /// Remove and return every request sent to `contact`.
    pub fn cancel_to(&mut self, contact: &Contact) -> Vec<(Id, PendingRequest)> {
        let cancelled: Vec<Id> = self
            .requests
            .iter()
            .filter(|(_, request)| request.to == *contact)
            .map(|(message_hash, _)| *message_hash)
            .collect();

        self.remove_all(cancelled)
    }

    fn remove_all(&mut self, message_hashes: Vec<Id>) -> Vec<(Id, PendingRequest)> {
        message_hashes
            .into_iter()
            .filter_map(|message_hash| {
                self.requests
                    .remove(&message_hash)
                    .map(|request| (message_hash, request))
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn contact(port: u16) -> Contact {
        Contact::new(Id::random(), SocketAddr::from(([127, 0, 0, 1], port)))
    }

    #[test]
    fn take_matching_response() {
        let mut pending = PendingRequests::new(Duration::from_secs(5));
        let to = contact(1000);
        let message_hash = Id::random();

        let (slot, reply) = ReplySlot::new();
        pending.insert(message_hash, to, slot).unwrap();

        assert!(pending.take(&message_hash, &"127.0.0.1:1001".parse().unwrap()).is_none());
        assert!(pending.contains(&message_hash), "wrong address keeps it pending");

        let request = pending.take(&message_hash, &to.address()).unwrap();
        assert!(pending.is_empty());

        request.resolve(Ok(None));
        assert!(matches!(reply.recv(), Ok(None)));
    }

    #[test]
    fn take_unknown() {
        let mut pending = PendingRequests::new(Duration::from_secs(5));

        assert!(pending.take(&Id::random(), &"127.0.0.1:1".parse().unwrap()).is_none());
    }

    #[test]
    fn reject_duplicate_hash() {
        let mut pending = PendingRequests::new(Duration::from_secs(5));
        let message_hash = Id::random();

        pending.insert(message_hash, contact(1), ReplySlot::detached()).unwrap();

        let (slot, _reply) = ReplySlot::new();
        assert!(pending.insert(message_hash, contact(2), slot).is_err());
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.remove(&message_hash).unwrap().to().address().port(), 1);
    }

    #[test]
    fn expire_after_deadline() {
        let timeout = Duration::from_millis(100);
        let mut pending = PendingRequests::new(timeout);
        let message_hash = Id::random();

        pending.insert(message_hash, contact(1), ReplySlot::detached()).unwrap();

        assert!(pending.expire(Instant::now()).is_empty());

        let expired = pending.expire(Instant::now() + timeout);

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, message_hash);
        assert!(!pending.contains(&message_hash));
        assert!(pending.expire(Instant::now() + timeout).is_empty());
    }

    #[test]
    fn cancel_only_that_peer() {
        let mut pending = PendingRequests::new(Duration::from_secs(5));

        let peer = contact(1);
        let other = contact(2);

        pending.insert(Id::random(), peer, ReplySlot::detached()).unwrap();
        pending.insert(Id::random(), peer, ReplySlot::detached()).unwrap();
        pending.insert(Id::random(), other, ReplySlot::detached()).unwrap();

        let cancelled = pending.cancel_to(&peer);

        assert_eq!(cancelled.len(), 2);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn dropped_slot_is_shutdown() {
        let (slot, reply) = ReplySlot::new();

        assert!(reply.try_recv().is_none());

        drop(slot);

        assert!(matches!(reply.recv(), Err(RequestError::Shutdown)));
    }
}
