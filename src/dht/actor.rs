use std::time::Instant;

use bytes::Bytes;
use flume::{Receiver, RecvError, Sender, TryRecvError};
use tracing::debug;

use crate::common::{Contact, Id, Payload};
use crate::rpc::{Config, Info, ReplySlot, Rpc};

#[derive(Debug)]
/// Owner of the [Rpc], serving [crate::Dht] handles from its own thread.
pub(crate) struct Actor {
    rpc: Rpc,
    receiver: Receiver<ActorMessage>,
}

impl Actor {
    pub fn new(config: Config, receiver: Receiver<ActorMessage>) -> std::io::Result<Self> {
        let rpc = Rpc::new(config)?;

        Ok(Self { rpc, receiver })
    }

    /// Serve every queued handle message, then tick the [Rpc] once.
    ///
    /// Returns an error once every handle was dropped, or on explicit shutdown.
    pub fn tick(&mut self) -> Result<(), RecvError> {
        loop {
            match self.receiver.try_recv() {
                Ok(ActorMessage::Shutdown(sender)) => {
                    debug!("dhtrpc::Dht's actor thread was shutdown.");
                    let _ = sender.send(());
                    return Err(RecvError::Disconnected);
                }
                Ok(actor_message) => self.handle(actor_message),
                Err(TryRecvError::Disconnected) => {
                    debug!("dhtrpc::Dht's actor thread was shutdown after Drop.");
                    return Err(RecvError::Disconnected);
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        self.rpc.tick();

        Ok(())
    }

    fn handle(&mut self, actor_message: ActorMessage) {
        match actor_message {
            ActorMessage::Check(sender) => {
                let _ = sender.send(Ok(()));
            }
            ActorMessage::Info(sender) => {
                let _ = sender.send(self.rpc.info());
            }
            ActorMessage::Request(to, payload, slot) => {
                self.rpc.request(to, payload, slot);
            }
            ActorMessage::AddContact(contact) => self.rpc.add_contact(contact),
            ActorMessage::Contacts(sender) => {
                let _ = sender.send(self.rpc.routing_table().contacts());
            }
            ActorMessage::LastSeen(contact, sender) => {
                let _ = sender.send(self.rpc.last_seen(&contact));
            }
            ActorMessage::Broadcast(value, sender) => {
                let _ = sender.send(self.rpc.broadcast(value));
            }
            ActorMessage::StoreLocal(key, value, sender) => {
                let _ = sender.send(self.rpc.store_local(key, value));
            }
            ActorMessage::GetLocal(key, sender) => {
                let _ = sender.send(self.rpc.get_local(&key));
            }
            ActorMessage::Shutdown(sender) => {
                let _ = sender.send(());
            }
        }
    }
}

#[derive(Debug)]
pub(crate) enum ActorMessage {
    Check(Sender<Result<(), std::io::Error>>),
    Info(Sender<Info>),
    Request(Contact, Payload, ReplySlot),
    AddContact(Contact),
    Contacts(Sender<Vec<Contact>>),
    LastSeen(Contact, Sender<Option<Instant>>),
    Broadcast(Bytes, Sender<Id>),
    StoreLocal(Id, Bytes, Sender<bool>),
    GetLocal(Id, Sender<Option<Bytes>>),
    Shutdown(Sender<()>),
}
