//! JSON bodies exchanged with the Pinterest v5 API.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{BoardRef, CreatedPin};

/// One page of `GET boards`.
#[derive(Debug, Deserialize)]
pub(crate) struct ListBoardsPage {
    #[serde(default)]
    pub items: Vec<BoardItem>,
    #[serde(default)]
    pub bookmark: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BoardItem {
    pub id: String,
    pub name: String,
}

impl From<BoardItem> for BoardRef {
    fn from(item: BoardItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatePinBody<'a> {
    pub link: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub alt_text: &'a str,
    pub board_id: &'a str,
    pub media_source: MediaSource,
}

#[derive(Debug, Serialize)]
pub(crate) struct MediaSource {
    pub source_type: &'static str,
    pub content_type: &'static str,
    pub data: String,
}

/// Error payload returned with non-success statuses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Owner of the board a pin belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinOwner {
    /// Owner's username.
    pub username: String,
}

/// One rendition of a pin image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Image URL.
    pub url: String,
}

/// Media attached to a pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMedia {
    /// Media type, e.g. `image`.
    pub media_type: String,
    /// Renditions keyed by size label such as `1200x` or `150x150`.
    #[serde(default)]
    pub images: HashMap<String, PinImage>,
}

/// A pin as returned by `POST pins`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Pin {
    pub id: String,
    pub board_id: String,
    #[serde(default)]
    pub board_owner: Option<PinOwner>,
    #[serde(default)]
    pub board_section_id: Option<String>,
    #[serde(default)]
    pub parent_pin_id: Option<String>,
    /// Creation time, zone-less as the API reports it.
    #[serde(with = "pin_timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub creative_type: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub dominant_color: Option<String>,
    #[serde(default)]
    pub has_been_promoted: bool,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub is_standard: bool,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub media: Option<PinMedia>,
    /// Opaque; only populated for business accounts.
    #[serde(default)]
    pub pin_metrics: Option<serde_json::Value>,
    #[serde(default)]
    pub product_tags: Vec<serde_json::Value>,
}

impl From<Pin> for CreatedPin {
    fn from(pin: Pin) -> Self {
        Self {
            id: pin.id,
            board_id: pin.board_id,
            title: pin.title,
        }
    }
}

/// Pinterest timestamps carry no zone: `2024-06-30T04:54:04`.
mod pin_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
