//! AsyncNode, the async version of [Node].

use bytes::Bytes;

use crate::common::{Contact, Id, Payload, StoreInstruction};
use crate::error::RequestError;
use crate::node::{
    expect_custom_answer, expect_fetch, expect_nodes, expect_pong, expect_stored, FetchResponse,
    Node,
};
use crate::rpc::PendingReply;

impl Node {
    /// Return an async version of this peer handle.
    pub fn as_async(self) -> AsyncNode {
        AsyncNode(self)
    }
}

#[derive(Debug, Clone)]
/// Async version of [Node].
pub struct AsyncNode(Node);

impl AsyncNode {
    pub fn contact(&self) -> &Contact {
        self.0.contact()
    }

    /// Send any request payload, await [PendingReply::recv_async] for its outcome.
    pub fn send(&self, payload: Payload) -> PendingReply {
        self.0.send(payload)
    }

    pub async fn ping(&self) -> Result<(), RequestError> {
        expect_pong(self.send(Payload::Ping).recv_async().await)
    }

    pub async fn fetch(&self, key: Id) -> Result<FetchResponse, RequestError> {
        expect_fetch(self.send(Payload::Fetch(key)).recv_async().await)
    }

    pub async fn fetch_nodes(&self, key: Id) -> Result<Vec<Contact>, RequestError> {
        expect_nodes(self.send(Payload::FetchNodes(key)).recv_async().await)
    }

    pub async fn store(&self, key: Id, value: Bytes) -> Result<bool, RequestError> {
        expect_stored(
            self.send(Payload::Store(StoreInstruction { key, value }))
                .recv_async()
                .await,
        )
    }

    pub async fn custom(&self, value: Bytes) -> Result<Bytes, RequestError> {
        expect_custom_answer(self.send(Payload::Custom(value)).recv_async().await)
    }
}
