//! Pinterest API capability and its HTTP implementation.
//!
//! The orchestrator only talks to [`PinterestApi`]; [`PinterestClient`] is the
//! reqwest-backed implementation and `crate::testing::FakePinterestApi` is the
//! in-memory double.

mod client;
mod wire;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::cancellation::{Interrupted, RunContext};
use crate::schedule::ScheduleEntry;

pub use client::{content_type_for, PinterestClient, DEFAULT_BASE_URL};
pub use wire::{Pin, PinImage, PinMedia, PinOwner};

/// Errors returned by API calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The run was cancelled while the request was in flight.
    #[error("request cancelled: {0}")]
    Cancelled(String),

    /// The service answered with an unexpected status.
    #[error("unexpected status {status}{}: {message}", code_suffix(.code))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Application error code from the response body.
        code: Option<i64>,
        /// Message from the response body.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The request could not be built from its inputs.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

fn code_suffix(code: &Option<i64>) -> String {
    code.map(|c| format!(" (code {c})")).unwrap_or_default()
}

impl ApiError {
    /// Returns the HTTP status, if the service answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Network trouble, timeouts, throttling and server errors.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Cancelled(_) | Self::Decode(_) | Self::InvalidRequest(_) => false,
        }
    }

    /// Returns true when the request may have been applied even though no
    /// success reached us: the connection failed, the call ran out of time or
    /// the server errored.
    #[must_use]
    pub fn is_outcome_unknown(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::Cancelled(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Decode(_) | Self::InvalidRequest(_) => false,
        }
    }

    /// Returns true for 404 responses.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns true if the call ran out of time or was cancelled.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout | Self::Cancelled(_))
    }
}

impl From<Interrupted> for ApiError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::DeadlineExceeded => Self::Timeout,
            Interrupted::Cancelled(reason) => Self::Cancelled(reason),
        }
    }
}

/// A board as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRef {
    /// Board id.
    pub id: String,
    /// Board name.
    pub name: String,
}

impl BoardRef {
    /// Creates a board reference.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Board visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Privacy {
    /// Visible to everyone.
    #[default]
    Public,
    /// Visible to the owner and collaborators.
    Protected,
    /// Visible to the owner only.
    Secret,
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "PUBLIC"),
            Self::Protected => write!(f, "PROTECTED"),
            Self::Secret => write!(f, "SECRET"),
        }
    }
}

/// Request body for creating a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBoard {
    /// Board name.
    pub name: String,
    /// Board description.
    pub description: String,
    /// Board visibility.
    pub privacy: Privacy,
}

/// Everything needed to submit one pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinRequest {
    /// Destination board.
    pub board_id: String,
    /// Local path of the image to upload.
    pub image_path: String,
    /// Destination link.
    pub link: String,
    /// Pin title.
    pub title: String,
    /// Pin description.
    pub description: String,
    /// Alt text for the image.
    pub alt_text: String,
}

impl PinRequest {
    /// Builds the request for a schedule entry; the description doubles as
    /// alt text.
    #[must_use]
    pub fn from_entry(entry: &ScheduleEntry, board_id: impl Into<String>) -> Self {
        Self {
            board_id: board_id.into(),
            image_path: entry.image_path.clone(),
            link: entry.link.clone(),
            title: entry.title.clone(),
            description: entry.description.clone(),
            alt_text: entry.description.clone(),
        }
    }
}

/// The identifying part of a freshly created pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPin {
    /// Pin id.
    pub id: String,
    /// Board the pin landed on.
    pub board_id: String,
    /// Pin title as stored by the service.
    pub title: Option<String>,
}

/// The subset of the Pinterest API the publisher needs.
#[async_trait]
pub trait PinterestApi: Send + Sync {
    /// Lists every board of the authenticated user.
    async fn list_boards(&self, ctx: &RunContext) -> Result<Vec<BoardRef>, ApiError>;

    /// Creates a board.
    async fn create_board(&self, ctx: &RunContext, board: &NewBoard) -> Result<(), ApiError>;

    /// Creates a pin.
    async fn create_pin(&self, ctx: &RunContext, pin: &PinRequest) -> Result<CreatedPin, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::Transport("reset".into()).is_transient());
        assert!(ApiError::Timeout.is_transient());
        assert!(ApiError::Status { status: 503, code: None, message: String::new() }.is_transient());
        assert!(ApiError::Status { status: 429, code: Some(8), message: String::new() }.is_transient());
        assert!(!ApiError::Status { status: 409, code: Some(58), message: String::new() }.is_transient());
        assert!(!ApiError::InvalidRequest("no image".into()).is_transient());
    }

    #[test]
    fn test_outcome_unknown_classification() {
        assert!(ApiError::Transport("reset".into()).is_outcome_unknown());
        assert!(ApiError::Cancelled("ctrl-c".into()).is_outcome_unknown());
        assert!(ApiError::Status { status: 502, code: None, message: String::new() }.is_outcome_unknown());
        assert!(!ApiError::Status { status: 429, code: Some(8), message: String::new() }.is_outcome_unknown());
        assert!(!ApiError::Status { status: 404, code: None, message: String::new() }.is_outcome_unknown());
    }

    #[test]
    fn test_status_display_includes_code() {
        let err = ApiError::Status {
            status: 401,
            code: Some(2),
            message: "Authentication failed.".into(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected status 401 (code 2): Authentication failed."
        );

        let bare = ApiError::Status {
            status: 502,
            code: None,
            message: "Bad Gateway".into(),
        };
        assert_eq!(bare.to_string(), "unexpected status 502: Bad Gateway");
    }

    #[test]
    fn test_interrupted_conversion() {
        assert_eq!(ApiError::from(Interrupted::DeadlineExceeded), ApiError::Timeout);
        assert!(ApiError::from(Interrupted::Cancelled("ctrl-c".into())).is_timeout());
    }

    #[test]
    fn test_privacy_serializes_upper_case() {
        let board = NewBoard {
            name: "Travel".into(),
            description: "Created by pin-creator".into(),
            privacy: Privacy::Public,
        };
        let json = serde_json::to_value(&board).expect("serialize");
        assert_eq!(json["privacy"], "PUBLIC");
    }

    #[test]
    fn test_pin_request_uses_description_as_alt_text() {
        let entry = ScheduleEntry {
            index: 3,
            board_name: "Travel".into(),
            image_path: "img/lisbon.png".into(),
            link: "https://example.com/lisbon".into(),
            title: "Lisbon".into(),
            description: "Tram 28 at dusk".into(),
            created: false,
        };

        let request = PinRequest::from_entry(&entry, "b-1");

        assert_eq!(request.board_id, "b-1");
        assert_eq!(request.alt_text, "Tram 28 at dusk");
        assert_eq!(request.image_path, "img/lisbon.png");
    }
}
