//! Pairing link construction and parsing, plus the link-copy confirmation
//! timer used by the linking screen.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

/// Version tag prefixed to every pairing link id. Both roles must carry the
/// same tag or must not interoperate; bump it only on breaking protocol
/// changes between initiator and companion.
pub const VERSION_TAG: &str = "0A";

/// How long the "link copied" confirmation stays visible before reverting.
const COPY_REVERT_AFTER: Duration = Duration::from_secs(5);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LinkError {
    #[error("pairing link id '{0}' is too short to contain a room id")]
    TooShort(String),

    #[error("pairing link version '{0}' does not interoperate with this client (expected '{VERSION_TAG}')")]
    VersionMismatch(String),
}

/// A pairing link identifying the room a companion should join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingLink {
    pub room_id: String,
}

impl PairingLink {
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
        }
    }

    /// The versioned identifier embedded in URLs and SMS payloads.
    pub fn link_id(&self) -> String {
        format!("{VERSION_TAG}{}", self.room_id)
    }

    /// Full URL for the companion to open.
    ///
    /// A mobile base of `/` means the companion runs the same bundle at the
    /// same origin, in which case the id travels as a query parameter.
    pub fn url(&self, mobile_base: &str, origin: &str) -> String {
        if mobile_base == "/" {
            format!("{origin}?link_id={}", self.link_id())
        } else {
            format!("{}/{}", mobile_base.trim_end_matches('/'), self.link_id())
        }
    }

    /// Parse a versioned link id, checking the version tag.
    pub fn parse_link_id(link_id: &str) -> Result<Self, LinkError> {
        if link_id.len() <= VERSION_TAG.len() {
            return Err(LinkError::TooShort(link_id.to_string()));
        }
        let (tag, room_id) = link_id.split_at(VERSION_TAG.len());
        if tag != VERSION_TAG {
            return Err(LinkError::VersionMismatch(tag.to_string()));
        }
        Ok(Self::new(room_id))
    }

    /// Parse the link id out of a companion launch path like `/0Aabc123`.
    pub fn from_path(path: &str) -> Result<Self, LinkError> {
        Self::parse_link_id(path.trim_start_matches('/'))
    }
}

/// Transient "link copied" confirmation that auto-reverts after five
/// seconds. Re-triggering aborts the pending revert before starting a new
/// one, and dropping the confirmation aborts it too, so a stale revert can
/// never fire after the screen is gone.
#[derive(Default)]
pub struct CopyConfirmation {
    copied: Arc<AtomicBool>,
    revert: Option<JoinHandle<()>>,
}

impl CopyConfirmation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_copied(&self) -> bool {
        self.copied.load(Ordering::SeqCst)
    }

    /// Mark the link as copied and schedule the revert.
    pub fn trigger(&mut self) {
        if let Some(pending) = self.revert.take() {
            pending.abort();
        }
        self.copied.store(true, Ordering::SeqCst);
        let copied = Arc::clone(&self.copied);
        self.revert = Some(tokio::spawn(async move {
            tokio::time::sleep(COPY_REVERT_AFTER).await;
            copied.store(false, Ordering::SeqCst);
        }));
    }
}

impl Drop for CopyConfirmation {
    fn drop(&mut self) {
        if let Some(pending) = self.revert.take() {
            pending.abort();
        }
    }
}
