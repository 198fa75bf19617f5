//! Navigation state machine and history capability.
//!
//! The [`Navigator`] walks the compiled screen plan for the active flow and
//! persists every position into a [`NavigationHistory`] so external
//! back/forward navigation restores exact positions.

pub mod history;
pub mod navigator;

use serde::{Deserialize, Serialize};

use crate::steps::{FlowMode, PlanEntry};

pub use history::{InMemoryHistory, NavigationHistory};
pub use navigator::{FlowObserver, Navigator};

/// Position within the plan of one flow. This is the payload persisted
/// into history entries; restoring an entry reproduces it exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationPosition {
    pub flow: FlowMode,
    #[serde(rename = "step")]
    pub index: usize,
}

impl NavigationPosition {
    pub fn new(flow: FlowMode, index: usize) -> Self {
        Self { flow, index }
    }
}

/// Events emitted by the navigator toward the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum RouterEvent {
    /// Position changed; carries the entry to render when the plan has one
    /// at that index.
    StepChanged {
        position: NavigationPosition,
        entry: Option<PlanEntry>,
    },
    /// The desktop flow traversed its final screen.
    Completed,
    /// The companion flow traversed its final screen.
    ClientSuccess,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_serializes_like_a_history_state() {
        let position = NavigationPosition::new(FlowMode::CaptureSteps, 2);
        let json = serde_json::to_value(&position).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"flow": "captureSteps", "step": 2})
        );
        let restored: NavigationPosition = serde_json::from_value(json).unwrap();
        assert_eq!(restored, position);
    }
}
