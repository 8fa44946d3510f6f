use serde::{Deserialize, Serialize};

/// One row of the schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Stable position of the entry, strictly increasing in storage order.
    pub index: u64,
    /// Name of the destination board.
    pub board_name: String,
    /// Local path of the image.
    pub image_path: String,
    /// Destination link of the pin.
    pub link: String,
    /// Pin title.
    pub title: String,
    /// Pin description, also used as alt text.
    pub description: String,
    /// Whether the pin has been published.
    pub created: bool,
}

impl ScheduleEntry {
    /// Creates a pending entry with empty text fields.
    #[must_use]
    pub fn pending(index: u64, board_name: impl Into<String>, image_path: impl Into<String>) -> Self {
        Self {
            index,
            board_name: board_name.into(),
            image_path: image_path.into(),
            link: String::new(),
            title: String::new(),
            description: String::new(),
            created: false,
        }
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the link.
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    /// Marks the entry as already created.
    #[must_use]
    pub fn already_created(mut self) -> Self {
        self.created = true;
        self
    }
}
