//! Relay channel capability.
//!
//! The relay is an abstract pub/sub transport pairing two sessions through
//! a shared room id. Sessions hold a [`RelayHandle`]; any transport plugs
//! in behind the [`Relay`] trait by pumping its socket into the handle's
//! channels. The crate ships an in-memory implementation used by tests and
//! the demo binary.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ClientMessage, ServerMessage};

/// Errors surfaced by the relay channel.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("relay channel disconnected")]
    Disconnected,
}

/// One session's end of a relay connection.
///
/// Sends are fire-and-forget: no acknowledgement or retry exists at this
/// layer, and a lost message shows up as the companion waiting forever
/// (timeout policy belongs to the UI, not here).
pub struct RelayHandle {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    inbound: mpsc::UnboundedReceiver<ServerMessage>,
}

impl RelayHandle {
    /// Assemble a handle from raw channel ends. Transports (and tests)
    /// use this to hand a connected pair of pipes to a session.
    pub fn from_parts(
        outbound: mpsc::UnboundedSender<ClientMessage>,
        inbound: mpsc::UnboundedReceiver<ServerMessage>,
    ) -> Self {
        Self { outbound, inbound }
    }

    /// Emit a message toward the relay server.
    pub fn emit(&self, message: ClientMessage) -> Result<(), RelayError> {
        self.outbound
            .send(message)
            .map_err(|_| RelayError::Disconnected)
    }

    /// Next inbound message, or `None` once the transport is gone.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.inbound.recv().await
    }

    /// Non-blocking variant of [`Self::recv`].
    pub fn try_recv(&mut self) -> Option<ServerMessage> {
        self.inbound.try_recv().ok()
    }
}

/// Factory for relay connections.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn connect(&self) -> Result<RelayHandle, RelayError>;
}

type RoomMembers = Vec<(Uuid, mpsc::UnboundedSender<ServerMessage>)>;

/// In-process relay server: a room registry routing envelopes between the
/// members of a room. Dropping a handle tears down its membership, so no
/// stale callback can reach a disposed session.
#[derive(Clone, Default)]
pub struct InMemoryRelay {
    rooms: Arc<Mutex<HashMap<String, RoomMembers>>>,
}

impl InMemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of members currently joined to `room_id`.
    pub async fn room_size(&self, room_id: &str) -> usize {
        self.rooms
            .lock()
            .await
            .get(room_id)
            .map_or(0, Vec::len)
    }

    async fn route(
        rooms: &Mutex<HashMap<String, RoomMembers>>,
        client_id: Uuid,
        reply: &mpsc::UnboundedSender<ServerMessage>,
        message: ClientMessage,
    ) {
        match message {
            ClientMessage::Join { room_id } => {
                let room_id =
                    room_id.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
                let mut rooms = rooms.lock().await;
                let members = rooms.entry(room_id.clone()).or_default();
                if !members.iter().any(|(id, _)| *id == client_id) {
                    members.push((client_id, reply.clone()));
                }
                debug!(%client_id, room_id, "client joined room");
                let _ = reply.send(ServerMessage::Joined { room_id });
            }
            ClientMessage::Message(envelope) => {
                let rooms = rooms.lock().await;
                match rooms.get(&envelope.room_id) {
                    Some(members) => {
                        for (id, sender) in members {
                            if *id != client_id {
                                let _ = sender.send(ServerMessage::Message(envelope.clone()));
                            }
                        }
                    }
                    None => {
                        warn!(room_id = envelope.room_id, "message for unknown room dropped");
                    }
                }
            }
            ClientMessage::Leave { room_id } => {
                let mut rooms = rooms.lock().await;
                if let Some(members) = rooms.get_mut(&room_id) {
                    members.retain(|(id, _)| *id != client_id);
                    if members.is_empty() {
                        rooms.remove(&room_id);
                    }
                }
                debug!(%client_id, room_id, "client left room");
            }
        }
    }

    async fn disconnect(rooms: &Mutex<HashMap<String, RoomMembers>>, client_id: Uuid) {
        let mut rooms = rooms.lock().await;
        rooms.retain(|_, members| {
            members.retain(|(id, _)| *id != client_id);
            !members.is_empty()
        });
    }
}

#[async_trait]
impl Relay for InMemoryRelay {
    async fn connect(&self) -> Result<RelayHandle, RelayError> {
        let client_id = Uuid::new_v4();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let rooms = Arc::clone(&self.rooms);

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                Self::route(&rooms, client_id, &inbound_tx, message).await;
            }
            // Handle dropped: deregister this client everywhere.
            Self::disconnect(&rooms, client_id).await;
            debug!(%client_id, "relay client disconnected");
        });

        Ok(RelayHandle::from_parts(outbound_tx, inbound_rx))
    }
}
