//! The publish run.
//!
//! [`PublishOrchestrator::run`] takes the next pending entry from the
//! schedule, resolves its board, submits the pin and flags the entry as
//! created. At most one entry is published per run.

mod orchestrator;
mod outcome;

pub use orchestrator::PublishOrchestrator;
pub use outcome::PublishOutcome;
