//! Desktop-side session: starts the pairing, hands configuration to the
//! companion, and advances its own navigation as the companion progresses.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::router::{FlowObserver, Navigator};
use crate::steps::{DocumentType, FlowMode, Step};

use super::{
    ClientMessage, Envelope, MobileConfig, PairingLink, Relay, RelayError, ServerMessage,
    SyncEvent,
};

/// Session-level cues for the desktop UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiatorEvent {
    /// A room id is available; the linking UI can render the pairing link.
    RoomAssigned { room_id: String },
    /// The companion asked for configuration, i.e. it has joined.
    MobileConnected,
    /// The companion finished its delegated capture flow.
    ClientSucceeded,
}

/// The initiator role of the pairing protocol.
///
/// Owns the relay channel handle for its lifetime; dropping the session
/// drops the handle, which deregisters it from every room.
pub struct InitiatorSession {
    handle: super::RelayHandle,
    room_id: Option<String>,
    token: String,
    steps: Vec<Step>,
    document_type: DocumentType,
    /// Capture index the desktop was on when it detoured into the
    /// cross-device flow; handed to the companion as its starting step.
    /// Shared with the navigator's flow observer.
    mobile_initial_step: Arc<Mutex<Option<usize>>>,
    mobile_connected: bool,
    client_success: bool,
    events: mpsc::UnboundedSender<InitiatorEvent>,
}

impl InitiatorSession {
    /// Connect to the relay and join: with `resume_room` when re-entering a
    /// known session, otherwise asking the server to assign a room.
    pub async fn start(
        relay: &dyn Relay,
        resume_room: Option<String>,
        token: impl Into<String>,
        steps: Vec<Step>,
        document_type: DocumentType,
        events: mpsc::UnboundedSender<InitiatorEvent>,
    ) -> Result<Self, RelayError> {
        let handle = relay.connect().await?;
        handle.emit(ClientMessage::Join {
            room_id: resume_room.clone(),
        })?;
        Ok(Self {
            handle,
            room_id: resume_room,
            token: token.into(),
            steps,
            document_type,
            mobile_initial_step: Arc::new(Mutex::new(None)),
            mobile_connected: false,
            client_success: false,
            events,
        })
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn is_mobile_connected(&self) -> bool {
        self.mobile_connected
    }

    pub fn is_client_success(&self) -> bool {
        self.client_success
    }

    /// Pairing link for the active room; `None` until a room is assigned
    /// (the linking UI shows a spinner in the meantime).
    pub fn pairing_link(&self) -> Option<PairingLink> {
        self.room_id.as_ref().map(PairingLink::new)
    }

    /// Observer to install on the desktop navigator. Records the capture
    /// position being left behind whenever the flow switches to the
    /// cross-device screens.
    pub fn flow_observer(&self) -> FlowObserver {
        let cell = Arc::clone(&self.mobile_initial_step);
        Box::new(move |new_flow, _new_index, _previous_flow, previous_index| {
            if new_flow == FlowMode::CrossDevice {
                if let Ok(mut step) = cell.lock() {
                    *step = Some(previous_index);
                }
            }
        })
    }

    /// Configuration payload handed to the companion.
    pub fn mobile_config(&self) -> MobileConfig {
        let step = self.mobile_initial_step.lock().map_or(None, |cell| *cell);
        MobileConfig {
            token: self.token.clone(),
            steps: self.steps.clone(),
            document_type: self.document_type.clone(),
            step,
        }
    }

    /// Push configuration into `room_id`.
    pub fn send_config(&self, room_id: &str) -> Result<()> {
        let payload = serde_json::to_value(self.mobile_config())
            .context("Failed to serialize mobile config")?;
        self.handle
            .emit(ClientMessage::Message(Envelope {
                event: SyncEvent::Config,
                room_id: room_id.to_string(),
                payload: Some(payload),
            }))
            .context("Failed to emit config")?;
        debug!(room_id, "config pushed to companion");
        Ok(())
    }

    /// Next inbound relay message, or `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.handle.recv().await
    }

    /// Apply one inbound relay message, advancing `navigator` on the
    /// protocol's behalf where the message calls for it.
    pub fn handle_message(
        &mut self,
        message: ServerMessage,
        navigator: &mut Navigator,
    ) -> Result<()> {
        match message {
            ServerMessage::Joined { room_id } => {
                if self.room_id.is_none() {
                    info!(room_id, "relay assigned room");
                    self.room_id = Some(room_id.clone());
                    let _ = self.events.send(InitiatorEvent::RoomAssigned { room_id });
                }
                Ok(())
            }
            ServerMessage::Message(envelope) => match envelope.event {
                SyncEvent::GetConfig => self.on_get_config(&envelope.room_id, navigator),
                SyncEvent::ClientSuccess => {
                    self.on_client_success(navigator);
                    Ok(())
                }
                SyncEvent::Config => {
                    // The initiator produces config, it never consumes one.
                    debug!("ignoring config envelope on initiator side");
                    Ok(())
                }
            },
        }
    }

    /// The companion asked for configuration: treat it as "companion has
    /// joined and needs handoff". A request from a different room than the
    /// active one means the active one is stale; leave it first so it
    /// receives no further pushes.
    fn on_get_config(&mut self, requested_room: &str, navigator: &mut Navigator) -> Result<()> {
        if let Some(active) = &self.room_id {
            if active != requested_room {
                warn!(
                    active_room = active,
                    requested_room, "leaving stale room before config handoff"
                );
                self.handle
                    .emit(ClientMessage::Leave {
                        room_id: active.clone(),
                    })
                    .context("Failed to emit leave for stale room")?;
            }
        }
        self.mobile_connected = true;
        let _ = self.events.send(InitiatorEvent::MobileConnected);
        self.send_config(requested_room)?;
        navigator.advance();
        Ok(())
    }

    /// Duplicate success signals re-enter `advance`, which clamps at the
    /// terminal index, so they cannot corrupt position.
    fn on_client_success(&mut self, navigator: &mut Navigator) {
        info!("companion reported success");
        self.client_success = true;
        let _ = self.events.send(InitiatorEvent::ClientSucceeded);
        navigator.advance();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{InMemoryHistory, RouterEvent};
    use crate::steps::StepKind;
    use crate::sync::RelayHandle;

    struct Harness {
        session: InitiatorSession,
        navigator: Navigator,
        outbound: mpsc::UnboundedReceiver<ClientMessage>,
        session_events: mpsc::UnboundedReceiver<InitiatorEvent>,
        // Held so the session's inbound channel stays open for the test.
        _inbound: mpsc::UnboundedSender<ServerMessage>,
        _router_events: mpsc::UnboundedReceiver<RouterEvent>,
    }

    fn standard_steps() -> Vec<Step> {
        vec![
            Step::new(StepKind::Welcome),
            Step::new(StepKind::Document),
            Step::new(StepKind::Face),
            Step::new(StepKind::Complete),
        ]
    }

    /// Build a session over raw channel ends so emitted client messages
    /// can be inspected directly.
    fn harness(resume_room: Option<String>) -> Harness {
        let (outbound_tx, mut outbound) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let handle = RelayHandle::from_parts(outbound_tx, inbound_rx);

        let (event_tx, session_events) = mpsc::unbounded_channel();
        let mut session = InitiatorSession {
            handle,
            room_id: resume_room.clone(),
            token: "tok".to_string(),
            steps: standard_steps(),
            document_type: DocumentType::Passport,
            mobile_initial_step: Arc::new(Mutex::new(None)),
            mobile_connected: false,
            client_success: false,
            events: event_tx,
        };
        session
            .handle
            .emit(ClientMessage::Join {
                room_id: resume_room,
            })
            .unwrap();
        // Swallow the join we just emitted so tests start clean.
        let join = outbound.try_recv().unwrap();
        assert!(matches!(join, ClientMessage::Join { .. }));

        let (router_tx, router_events) = mpsc::unbounded_channel();
        let mut navigator = Navigator::new(
            standard_steps(),
            DocumentType::Passport,
            false,
            0,
            Box::new(InMemoryHistory::new()),
            router_tx,
        );
        navigator.set_flow_observer(session.flow_observer());

        Harness {
            session,
            navigator,
            outbound,
            session_events,
            _inbound: inbound_tx,
            _router_events: router_events,
        }
    }

    #[tokio::test]
    async fn test_joined_adopts_server_assigned_room() {
        let mut h = harness(None);
        h.session
            .handle_message(
                ServerMessage::Joined {
                    room_id: "abc".to_string(),
                },
                &mut h.navigator,
            )
            .unwrap();

        assert_eq!(h.session.room_id(), Some("abc"));
        assert_eq!(
            h.session_events.try_recv().unwrap(),
            InitiatorEvent::RoomAssigned {
                room_id: "abc".to_string()
            }
        );

        h.session.send_config("abc").unwrap();
        let message = h.outbound.try_recv().unwrap();
        let ClientMessage::Message(envelope) = message else {
            panic!("expected message envelope, got {message:?}");
        };
        assert_eq!(envelope.event, SyncEvent::Config);
        assert_eq!(envelope.room_id, "abc");
        assert!(envelope.payload.is_some());
    }

    #[tokio::test]
    async fn test_resumed_room_id_is_not_overwritten() {
        let mut h = harness(Some("known".to_string()));
        h.session
            .handle_message(
                ServerMessage::Joined {
                    room_id: "known".to_string(),
                },
                &mut h.navigator,
            )
            .unwrap();
        assert_eq!(h.session.room_id(), Some("known"));
        assert!(h.session_events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_get_config_pushes_config_and_advances() {
        let mut h = harness(Some("abc".to_string()));
        let start_index = h.navigator.index();

        h.session
            .handle_message(
                ServerMessage::Message(Envelope::get_config("abc")),
                &mut h.navigator,
            )
            .unwrap();

        assert!(h.session.is_mobile_connected());
        assert_eq!(
            h.session_events.try_recv().unwrap(),
            InitiatorEvent::MobileConnected
        );
        let ClientMessage::Message(envelope) = h.outbound.try_recv().unwrap() else {
            panic!("expected config push");
        };
        assert_eq!(envelope.event, SyncEvent::Config);
        assert_eq!(envelope.room_id, "abc");
        assert_eq!(h.navigator.index(), start_index + 1);
    }

    #[tokio::test]
    async fn test_get_config_for_different_room_leaves_stale_room_first() {
        let mut h = harness(Some("stale".to_string()));
        h.session
            .handle_message(
                ServerMessage::Message(Envelope::get_config("fresh")),
                &mut h.navigator,
            )
            .unwrap();

        let first = h.outbound.try_recv().unwrap();
        assert_eq!(
            first,
            ClientMessage::Leave {
                room_id: "stale".to_string()
            }
        );
        let ClientMessage::Message(envelope) = h.outbound.try_recv().unwrap() else {
            panic!("expected config push after leave");
        };
        assert_eq!(envelope.room_id, "fresh");
    }

    #[tokio::test]
    async fn test_client_success_records_and_advances() {
        let mut h = harness(Some("abc".to_string()));
        let start_index = h.navigator.index();

        h.session
            .handle_message(
                ServerMessage::Message(Envelope::client_success("abc")),
                &mut h.navigator,
            )
            .unwrap();

        assert!(h.session.is_client_success());
        assert_eq!(
            h.session_events.try_recv().unwrap(),
            InitiatorEvent::ClientSucceeded
        );
        assert_eq!(h.navigator.index(), start_index + 1);
    }

    #[tokio::test]
    async fn test_flow_observer_captures_resume_step() {
        let mut h = harness(Some("abc".to_string()));
        h.navigator.advance();
        h.navigator.advance();
        h.navigator.switch_flow(FlowMode::CrossDevice, 0);

        let config = h.session.mobile_config();
        assert_eq!(config.step, Some(2));
        assert_eq!(config.token, "tok");
    }
}
