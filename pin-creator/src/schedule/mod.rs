//! The persisted publishing queue.
//!
//! A schedule is an ordered list of [`ScheduleEntry`] rows, each with a
//! `created` flag that only ever goes from `false` to `true`. The next entry to
//! publish is the pending one with the smallest index.

mod csv_store;
mod entry;
mod memory;

use std::path::PathBuf;
use thiserror::Error;

pub use csv_store::{parse_schedule, CsvScheduleStore, ParsedSchedule};
pub use entry::ScheduleEntry;
pub use memory::MemoryScheduleStore;

/// Errors raised while reading a schedule.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A row or the header is malformed.
    #[error("line {line}: {message}")]
    Validation {
        /// 1-based line number in the file; the header is line 1.
        line: u64,
        /// What is wrong with it.
        message: String,
    },

    /// The schedule could not be read at all.
    #[error(transparent)]
    Read(#[from] PersistenceError),
}

impl ScheduleError {
    pub(crate) fn validation(line: u64, message: impl Into<String>) -> Self {
        Self::Validation {
            line,
            message: message.into(),
        }
    }
}

/// Errors raised while accessing or durably updating a schedule.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem failure.
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The rewritten schedule could not be encoded.
    #[error("cannot encode schedule: {0}")]
    Encode(String),

    /// The file no longer parses, so it cannot be safely rewritten.
    #[error("schedule is invalid: {0}")]
    Invalid(String),

    /// No entry carries the requested index.
    #[error("no schedule entry with index {0}")]
    UnknownIndex(u64),

    /// The store refused the write.
    #[error("write rejected: {0}")]
    WriteRejected(String),
}

/// Durable queue of entries to publish.
#[cfg_attr(test, mockall::automock)]
pub trait ScheduleStore: Send + Sync {
    /// Returns the pending entry with the smallest index, or `None` when every
    /// entry has been created.
    fn next(&self) -> Result<Option<ScheduleEntry>, ScheduleError>;

    /// Flags the entry as created and persists the change. A no-op when it is
    /// already flagged.
    fn mark_created(&self, index: u64) -> Result<(), PersistenceError>;
}
