use std::net::SocketAddr;

use bytes::Bytes;
use tracing::{debug, error};

use crate::common::{Id, Packet, Payload, StoreInstruction, UNKNOWN_CUSTOM_ANSWER};

use super::Rpc;

impl Rpc {
    pub(super) fn handle_query(&mut self, from: SocketAddr, packet: Packet) {
        let command = packet.command();

        debug!(?from, "Received {}", command);

        match packet.payload() {
            Payload::Ping => self.reply(from, &packet, Payload::Pong),
            Payload::Fetch(key) => match self.store.get(key).cloned() {
                Some(value) => self.reply(from, &packet, Payload::Found(value)),
                None => self.reply_closest(from, &packet, key),
            },
            Payload::FetchNodes(key) => self.reply_closest(from, &packet, key),
            Payload::Store(StoreInstruction { key, value }) => {
                // Existing keys are rejected before the application gets to see them.
                let accepted = !self.store.contains(key)
                    && self.application.on_store(&packet)
                    && self.store.insert_new(*key, value.clone());

                self.reply(from, &packet, Payload::Stored(accepted));
            }
            Payload::Custom(_) => {
                let answer = self
                    .application
                    .on_custom_command(&packet)
                    .unwrap_or_else(|| Bytes::from_static(UNKNOWN_CUSTOM_ANSWER));

                self.reply(from, &packet, Payload::CustomAnswer(answer));
            }
            Payload::Broadcast(_) => {
                if !self.seen_broadcasts.observe(*packet.message_hash()) {
                    debug!(message_hash = ?packet.message_hash(), "Dropping seen BROADCAST");
                    return;
                }

                self.flood(&packet);
                self.application.on_broadcast(&packet);
            }
            Payload::Noop => {}
            Payload::Pong
            | Payload::Stored(_)
            | Payload::Found(_)
            | Payload::FoundNodes(_)
            | Payload::CustomAnswer(_) => {
                error!(?from, %command, "Received a response command without response_to");
            }
        }
    }

    fn reply_closest(&mut self, from: SocketAddr, query: &Packet, key: &Id) {
        let closest = self.routing_table.find_node(key);

        self.reply(from, query, Payload::FoundNodes(closest));
    }
}
