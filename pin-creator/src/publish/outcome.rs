use std::time::Duration;

use crate::api::{BoardRef, CreatedPin};
use crate::schedule::ScheduleEntry;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Every entry was already created.
    NothingToDo,
    /// One entry was published and marked created.
    Published {
        /// The entry as it was before publishing.
        entry: ScheduleEntry,
        /// The board it was published to.
        board: BoardRef,
        /// The pin the API created.
        pin: CreatedPin,
        /// Time from board resolution to pin creation.
        elapsed: Duration,
    },
}

impl PublishOutcome {
    /// Returns true if a pin was published.
    #[must_use]
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }

    /// Returns the created pin, if any.
    #[must_use]
    pub fn pin(&self) -> Option<&CreatedPin> {
        match self {
            Self::Published { pin, .. } => Some(pin),
            Self::NothingToDo => None,
        }
    }
}
