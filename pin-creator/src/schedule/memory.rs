//! In-memory schedule for tests and dry runs.

use parking_lot::Mutex;

use super::{PersistenceError, ScheduleEntry, ScheduleError, ScheduleStore};

#[derive(Debug, Default)]
struct State {
    entries: Vec<ScheduleEntry>,
    writes: usize,
    reject_writes: Option<String>,
}

/// Schedule held in memory, with write counting and injectable write failure.
#[derive(Debug, Default)]
pub struct MemoryScheduleStore {
    state: Mutex<State>,
}

impl MemoryScheduleStore {
    /// Creates a store over `entries`, which must be in increasing index order.
    #[must_use]
    pub fn new(entries: Vec<ScheduleEntry>) -> Self {
        Self {
            state: Mutex::new(State {
                entries,
                ..State::default()
            }),
        }
    }

    /// Makes every subsequent write fail with `reason`.
    pub fn reject_writes(&self, reason: impl Into<String>) {
        self.state.lock().reject_writes = Some(reason.into());
    }

    /// Number of writes that actually changed an entry.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }

    /// Snapshot of all entries.
    #[must_use]
    pub fn entries(&self) -> Vec<ScheduleEntry> {
        self.state.lock().entries.clone()
    }

    /// Snapshot of one entry.
    #[must_use]
    pub fn entry(&self, index: u64) -> Option<ScheduleEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .find(|entry| entry.index == index)
            .cloned()
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn next(&self) -> Result<Option<ScheduleEntry>, ScheduleError> {
        Ok(self
            .state
            .lock()
            .entries
            .iter()
            .find(|entry| !entry.created)
            .cloned())
    }

    fn mark_created(&self, index: u64) -> Result<(), PersistenceError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let entry = state
            .entries
            .iter_mut()
            .find(|entry| entry.index == index)
            .ok_or(PersistenceError::UnknownIndex(index))?;
        if entry.created {
            return Ok(());
        }
        if let Some(reason) = &state.reject_writes {
            return Err(PersistenceError::WriteRejected(reason.clone()));
        }

        entry.created = true;
        state.writes += 1;
        Ok(())
    }
}
