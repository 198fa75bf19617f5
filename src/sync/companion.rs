//! Mobile-side session: joins the room named in its launch link, requests
//! configuration, runs the delegated capture flow, and reports success.

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::router::{InMemoryHistory, Navigator, RouterEvent};

use super::{
    ClientMessage, Envelope, MobileConfig, PairingLink, Relay, RelayError, ServerMessage,
    SyncEvent,
};

/// The companion role of the pairing protocol.
///
/// Until config arrives the companion has nothing to render but a loading
/// indicator; config presence is the sole gate ([`Self::is_ready`]). A
/// relay outage at this point simply leaves the companion waiting; retry
/// and timeout policy live with the UI, not here.
pub struct CompanionSession {
    handle: super::RelayHandle,
    room_id: String,
    config: Option<MobileConfig>,
    config_requested: bool,
}

impl CompanionSession {
    /// Connect, join the room from the launch link, and request config.
    /// The request goes out exactly once per session start, not once per
    /// render.
    pub async fn start(relay: &dyn Relay, link: &PairingLink) -> Result<Self, RelayError> {
        let handle = relay.connect().await?;
        handle.emit(ClientMessage::Join {
            room_id: Some(link.room_id.clone()),
        })?;
        let mut session = Self {
            handle,
            room_id: link.room_id.clone(),
            config: None,
            config_requested: false,
        };
        session.request_config()?;
        Ok(session)
    }

    fn request_config(&mut self) -> Result<(), RelayError> {
        if self.config_requested {
            return Ok(());
        }
        self.config_requested = true;
        debug!(room_id = self.room_id, "requesting config");
        self.handle
            .emit(ClientMessage::Message(Envelope::get_config(&self.room_id)))
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Whether configuration has arrived and rendering can start.
    pub fn is_ready(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> Option<&MobileConfig> {
        self.config.as_ref()
    }

    /// Apply one inbound relay message. Re-adopting an identical config is
    /// harmless; the adopted value simply replaces itself.
    pub fn handle_message(&mut self, message: ServerMessage) -> Result<()> {
        match message {
            ServerMessage::Joined { room_id } => {
                debug!(room_id, "joined room");
                Ok(())
            }
            ServerMessage::Message(envelope) => match envelope.event {
                SyncEvent::Config => {
                    let payload = envelope
                        .payload
                        .context("config envelope carried no payload")?;
                    let config: MobileConfig = serde_json::from_value(payload)
                        .context("Failed to parse mobile config")?;
                    info!(
                        steps = config.steps.len(),
                        document_type = %config.document_type,
                        "config adopted"
                    );
                    self.config = Some(config);
                    Ok(())
                }
                SyncEvent::GetConfig | SyncEvent::ClientSuccess => {
                    // Only the initiator consumes these.
                    debug!(event = ?envelope.event, "ignoring envelope on companion side");
                    Ok(())
                }
            },
        }
    }

    /// Block until configuration arrives.
    pub async fn await_config(&mut self) -> Result<MobileConfig> {
        loop {
            if let Some(config) = &self.config {
                return Ok(config.clone());
            }
            let Some(message) = self.handle.recv().await else {
                bail!("relay channel closed before config arrived");
            };
            self.handle_message(message)?;
        }
    }

    /// Signal completion of the delegated capture flow to the initiator.
    pub fn send_client_success(&self) -> Result<(), RelayError> {
        self.handle
            .emit(ClientMessage::Message(Envelope::client_success(
                &self.room_id,
            )))
    }

    /// Forward the navigator's terminal event to the initiator. After this
    /// the companion's own ClientSuccess screen is purely local; it is not
    /// re-synced.
    pub fn handle_router_event(&self, event: &RouterEvent) -> Result<(), RelayError> {
        if matches!(event, RouterEvent::ClientSuccess) {
            self.send_client_success()?;
        }
        Ok(())
    }

    /// Build the companion navigator from adopted config: the capture flow
    /// compiled with the mobile flag, starting at the handed-over step.
    pub fn build_navigator(
        &self,
        events: mpsc::UnboundedSender<RouterEvent>,
    ) -> Option<Navigator> {
        let config = self.config.as_ref()?;
        Some(Navigator::new(
            config.steps.clone(),
            config.document_type.clone(),
            true,
            config.step.unwrap_or(0),
            Box::new(InMemoryHistory::new()),
            events,
        ))
    }
}
