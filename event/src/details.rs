//! Event details value object.

use crate::error::DetailsError;
use gala_chain::Timestamp;
use serde::{Deserialize, Serialize};

/// Where, when, and what
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    /// Start time in nanoseconds
    pub date: Timestamp,
    /// Venue or meeting link
    pub location: String,
    /// Display title
    pub title: String,
    /// Free-form description
    pub description: String,
    /// Optional cover image
    #[serde(default)]
    pub image_url: String,
}

impl EventDetails {
    /// Details without an image
    #[must_use]
    pub fn new(
        date: Timestamp,
        location: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            date,
            location: location.into(),
            title: title.into(),
            description: description.into(),
            image_url: String::new(),
        }
    }

    /// Set the image
    #[must_use]
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = image_url.into();
        self
    }

    /// Check the details against the current block time
    ///
    /// # Errors
    ///
    /// Returns the first failing rule: date, then location, title, description.
    pub fn assert_valid(&self, now: Timestamp) -> Result<(), DetailsError> {
        if self.date <= now {
            return Err(DetailsError::DateNotUpcoming);
        }
        if self.location.is_empty() {
            return Err(DetailsError::MissingLocation);
        }
        if self.title.is_empty() {
            return Err(DetailsError::MissingTitle);
        }
        if self.description.is_empty() {
            return Err(DetailsError::MissingDescription);
        }
        Ok(())
    }
}
