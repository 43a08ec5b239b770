//! Entity identifier sources.

use shared::EntityId;

/// Hands out identifiers for brainrots, powerups and bullets.
pub trait IdSource: Send {
    fn next_id(&mut self) -> EntityId;
}

/// Monotonic counter starting at 1. Ids are never reused within a process.
#[derive(Debug, Default)]
pub struct SequentialIds {
    last: EntityId,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self) -> EntityId {
        self.last += 1;
        self.last
    }
}
