//! High-water mark of consumed event ids.

use crate::types::EventId;

/// The highest event id this consumer has taken responsibility for.
///
/// Starts at 0 and only ever moves forward.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(EventId);

impl Cursor {
    /// A cursor at 0.
    #[must_use]
    pub fn new() -> Self {
        Self(0)
    }

    /// A cursor resuming from a known id.
    #[must_use]
    pub fn starting_at(id: EventId) -> Self {
        Self(id)
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> EventId {
        self.0
    }

    /// Whether `id` has not been consumed yet.
    #[must_use]
    pub fn is_new(&self, id: EventId) -> bool {
        id > self.0
    }

    /// Move to `id` if it is strictly ahead. Returns whether the cursor moved.
    pub fn advance(&mut self, id: EventId) -> bool {
        if self.is_new(id) {
            self.0 = id;
            true
        } else {
            false
        }
    }
}
