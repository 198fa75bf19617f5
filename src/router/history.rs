//! Navigable history capability.
//!
//! In a browser embedding this is backed by the session history; here the
//! capability is an explicit trait owned by the navigator for its lifetime,
//! with an in-memory implementation used by tests and the demo binary.

use super::NavigationPosition;

/// Linear back/forward history of navigation positions.
///
/// `push` behaves like a browser pushState: it drops any forward entries
/// beyond the cursor before appending.
pub trait NavigationHistory: Send {
    /// Append a new entry at the cursor and move the cursor onto it.
    fn push(&mut self, position: NavigationPosition);

    /// Move the cursor back one entry and return the restored position,
    /// or `None` when already at the oldest entry.
    fn back(&mut self) -> Option<NavigationPosition>;

    /// Move the cursor forward one entry and return the restored position,
    /// or `None` when already at the newest entry.
    fn forward(&mut self) -> Option<NavigationPosition>;

    /// Position at the cursor, if any entry has been recorded.
    fn current(&self) -> Option<NavigationPosition>;
}

/// In-memory history stack.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    entries: Vec<NavigationPosition>,
    cursor: usize,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl NavigationHistory for InMemoryHistory {
    fn push(&mut self, position: NavigationPosition) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(position);
        self.cursor = self.entries.len() - 1;
    }

    fn back(&mut self) -> Option<NavigationPosition> {
        if self.entries.is_empty() || self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor])
    }

    fn forward(&mut self) -> Option<NavigationPosition> {
        if self.entries.is_empty() || self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.entries[self.cursor])
    }

    fn current(&self) -> Option<NavigationPosition> {
        self.entries.get(self.cursor).copied()
    }
}
