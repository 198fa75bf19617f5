//! Cross-device session synchronization.
//!
//! Two roles share one message vocabulary over a room-scoped relay
//! channel: the **initiator** (desktop) supplies configuration, the
//! **companion** (mobile) performs the delegated capture steps and reports
//! completion back. Delivery is fire-and-forget; the protocol neither
//! reorders nor deduplicates, and both sides apply duplicates idempotently.

pub mod companion;
pub mod initiator;
pub mod link;
pub mod relay;

use serde::{Deserialize, Serialize};

use crate::steps::{DocumentType, Step};

pub use companion::CompanionSession;
pub use initiator::{InitiatorEvent, InitiatorSession};
pub use link::{CopyConfirmation, LinkError, PairingLink, VERSION_TAG};
pub use relay::{InMemoryRelay, Relay, RelayError, RelayHandle};

/// Inner events carried inside a `message` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEvent {
    #[serde(rename = "get config")]
    GetConfig,
    #[serde(rename = "config")]
    Config,
    #[serde(rename = "client success")]
    ClientSuccess,
}

/// Room-scoped message envelope relayed between the paired sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub event: SyncEvent,
    pub room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Envelope {
    /// Companion's configuration request.
    pub fn get_config(room_id: impl Into<String>) -> Self {
        Self {
            event: SyncEvent::GetConfig,
            room_id: room_id.into(),
            payload: None,
        }
    }

    /// Companion's completion signal.
    pub fn client_success(room_id: impl Into<String>) -> Self {
        Self {
            event: SyncEvent::ClientSuccess,
            room_id: room_id.into(),
            payload: None,
        }
    }
}

/// Messages a session emits toward the relay server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Join a room; `None` asks the server to assign one.
    Join { room_id: Option<String> },
    /// Room-scoped envelope forwarded to the other member.
    Message(Envelope),
    /// Leave a room; stale rooms must not receive further pushes.
    Leave { room_id: String },
}

/// Messages the relay server delivers to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Join acknowledgement carrying the (possibly server-assigned) room id.
    Joined { room_id: String },
    Message(Envelope),
}

/// Configuration handed from the initiator to the companion. `step` is the
/// capture index the desktop was on when it detoured into the cross-device
/// flow, so the companion resumes there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileConfig {
    pub token: String,
    pub steps: Vec<Step>,
    pub document_type: DocumentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
}
