use std::net::SocketAddr;

use tracing::{debug, error};

use crate::common::{Id, Packet, Payload};

use super::Rpc;

impl Rpc {
    pub(super) fn handle_response(&mut self, from: SocketAddr, response_to: Id, packet: Packet) {
        let command = packet.command();

        if command.is_query() {
            error!(?from, %command, "Received a query command as a response");
            return;
        }

        let Some(request) = self.pending.take(&response_to, &from) else {
            debug!(?from, ?response_to, %command, "Dropping response to unknown request");
            return;
        };

        debug!(?from, "Received {}", command);

        // A Pong carries nothing but the acknowledgement itself.
        if matches!(packet.payload(), Payload::Pong) {
            request.resolve(Ok(None));
        } else {
            request.resolve(Ok(Some(packet)));
        }
    }
}
