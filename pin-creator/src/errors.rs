//! Error types for pin-creator.
//!
//! Every failure surfaced by the orchestrator is a [`PinCreatorError`]. Errors
//! raised below the orchestrator are wrapped with the [`Stage`] they happened
//! in, and [`PinCreatorError::kind`] looks through that wrapper so callers can
//! still tell a slow service from a rejecting one.

use std::fmt;
use thiserror::Error;

use crate::api::ApiError;
use crate::schedule::{PersistenceError, ScheduleError};

/// Coarse classification of a failure, stable across stage wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed queue entry or request input.
    Validation,
    /// Network or 5xx failure that outlived the retry budget.
    TransientApi,
    /// The API rejected the request.
    PermanentApi,
    /// A deadline expired or the run was cancelled.
    Timeout,
    /// The schedule could not be written.
    Persistence,
    /// Bad configuration or missing credentials.
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::TransientApi => write!(f, "transient_api"),
            Self::PermanentApi => write!(f, "permanent_api"),
            Self::Timeout => write!(f, "timeout"),
            Self::Persistence => write!(f, "persistence"),
            Self::Config => write!(f, "config"),
        }
    }
}

/// The step of a publish run in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Loading the next pending entry.
    ReadingSchedule,
    /// Mapping the board name to an id.
    ResolvingBoard,
    /// Submitting the pin.
    CreatingPin,
    /// Flagging the entry as created.
    MarkingComplete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadingSchedule => write!(f, "reading schedule"),
            Self::ResolvingBoard => write!(f, "resolving board"),
            Self::CreatingPin => write!(f, "creating pin"),
            Self::MarkingComplete => write!(f, "marking complete"),
        }
    }
}

/// The main error type for pin-creator operations.
#[derive(Debug, Error)]
pub enum PinCreatorError {
    /// A queue entry or request failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transient API failures persisted until the retry budget ran out.
    #[error("transient API error after {attempts} attempt(s): {last}")]
    TransientApi {
        /// Attempts made before giving up.
        attempts: u32,
        /// The last failure observed.
        last: String,
    },

    /// The API rejected a request in a way retrying cannot fix.
    #[error("permanent API error: {0}")]
    PermanentApi(#[source] ApiError),

    /// A deadline expired or the run was cancelled.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The schedule could not be persisted.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The pin went out but its entry could not be flagged as created.
    #[error("pin {pin_id} is published but entry {index} is still pending, flag it manually before the next run: {source}")]
    Unrecorded {
        /// Id of the published pin.
        pin_id: String,
        /// Schedule index left pending.
        index: u64,
        /// Why the flag could not be written.
        #[source]
        source: PersistenceError,
    },

    /// Configuration or credential problem.
    #[error("configuration error: {0}")]
    Config(String),

    /// A failure annotated with the stage it happened in.
    #[error("{stage}: {source}")]
    Stage {
        /// Where the failure happened.
        stage: Stage,
        /// The underlying failure.
        #[source]
        source: Box<PinCreatorError>,
    },
}

impl PinCreatorError {
    /// Wraps this error with the stage it occurred in.
    #[must_use]
    pub fn in_stage(self, stage: Stage) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Returns the classification of the innermost failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::TransientApi { .. } => ErrorKind::TransientApi,
            Self::PermanentApi(_) => ErrorKind::PermanentApi,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Persistence(_) | Self::Unrecorded { .. } => ErrorKind::Persistence,
            Self::Config(_) => ErrorKind::Config,
            Self::Stage { source, .. } => source.kind(),
        }
    }

    /// Returns the outermost stage annotation, if any.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Returns true if the failure was a timeout or cancellation.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Short operator-facing description of what went wrong.
    #[must_use]
    pub fn summary(&self) -> String {
        match (self.stage(), self.kind()) {
            (Some(Stage::ResolvingBoard), ErrorKind::Timeout) => "timeout resolving board".into(),
            (Some(Stage::ResolvingBoard), _) => "failed to resolve board".into(),
            (Some(Stage::CreatingPin), ErrorKind::Timeout) => "timeout creating pin".into(),
            (Some(Stage::CreatingPin), _) => "failed to create pin".into(),
            (Some(Stage::MarkingComplete), _) => {
                "pin published but marking complete failed".into()
            }
            (Some(Stage::ReadingSchedule), _) => "failed to read schedule".into(),
            (None, kind) => format!("{kind} failure"),
        }
    }
}

impl From<ScheduleError> for PinCreatorError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Validation { .. } => Self::Validation(err.to_string()),
            ScheduleError::Read(e) => Self::Persistence(e),
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, PinCreatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_sees_through_stage() {
        let err = PinCreatorError::Timeout("board never appeared".into())
            .in_stage(Stage::ResolvingBoard);

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.stage(), Some(Stage::ResolvingBoard));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_summary_per_stage() {
        let timeout = PinCreatorError::Timeout("slow".into()).in_stage(Stage::ResolvingBoard);
        assert_eq!(timeout.summary(), "timeout resolving board");

        let rejected = PinCreatorError::PermanentApi(ApiError::Status {
            status: 409,
            code: Some(58),
            message: "conflict".into(),
        })
        .in_stage(Stage::ResolvingBoard);
        assert_eq!(rejected.summary(), "failed to resolve board");

        let pin_timeout = PinCreatorError::Timeout("slow".into()).in_stage(Stage::CreatingPin);
        assert_eq!(pin_timeout.summary(), "timeout creating pin");

        let pin_failed = PinCreatorError::PermanentApi(ApiError::Transport("reset".into()))
            .in_stage(Stage::CreatingPin);
        assert_eq!(pin_failed.summary(), "failed to create pin");
    }

    #[test]
    fn test_persistence_summary_warns_about_publish() {
        let err = PinCreatorError::from(PersistenceError::UnknownIndex(4))
            .in_stage(Stage::MarkingComplete);

        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.summary().contains("pin published"));
    }

    #[test]
    fn test_unrecorded_names_pin_and_entry() {
        let err = PinCreatorError::Unrecorded {
            pin_id: "pin-3".into(),
            index: 4,
            source: PersistenceError::WriteRejected("read-only filesystem".into()),
        }
        .in_stage(Stage::MarkingComplete);

        assert_eq!(err.kind(), ErrorKind::Persistence);
        let message = err.to_string();
        assert!(message.starts_with("marking complete: pin pin-3 is published but entry 4 is still pending"));
        assert!(message.contains("read-only filesystem"));
    }

    #[test]
    fn test_display_includes_stage() {
        let err = PinCreatorError::Validation("missing board".into())
            .in_stage(Stage::ReadingSchedule);
        assert_eq!(
            err.to_string(),
            "reading schedule: validation error: missing board"
        );
    }

    #[test]
    fn test_schedule_error_conversion() {
        let err: PinCreatorError = ScheduleError::Validation {
            line: 3,
            message: "bad created flag".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
