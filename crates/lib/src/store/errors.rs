//! Persistence error types for the Fabler store boundary.
//!
//! This module defines structured error types for store operations,
//! providing better error context and type safety compared to string-based errors.

use thiserror::Error;

use crate::story::StoryId;

/// Errors that can occur during store operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Field additions/changes require a major version bump
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// Story not found by id.
    #[error("Story not found: {story}")]
    StoryNotFound {
        /// The id of the story that was not found
        story: StoryId,
    },

    /// A story with this id is already stored.
    #[error("Story already exists: {story}")]
    StoryAlreadyExists {
        /// The id of the story that collided
        story: StoryId,
    },

    /// Serialization failed.
    #[error("Serialization failed")]
    SerializationFailed {
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// Deserialization failed.
    #[error("Deserialization failed")]
    DeserializationFailed {
        /// The underlying deserialization error
        #[source]
        source: serde_json::Error,
    },

    /// File I/O error.
    #[error("File I/O error")]
    FileIo {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Check if this error indicates a story was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::StoryNotFound { .. })
    }

    /// Check if this error indicates a story id collision.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::StoryAlreadyExists { .. })
    }

    /// Check if this error is related to I/O operations.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            StoreError::FileIo { .. }
                | StoreError::SerializationFailed { .. }
                | StoreError::DeserializationFailed { .. }
        )
    }

    /// Get the story id if this error is about a specific story.
    pub fn story_id(&self) -> Option<&StoryId> {
        match self {
            StoreError::StoryNotFound { story } | StoreError::StoryAlreadyExists { story } => {
                Some(story)
            }
            _ => None,
        }
    }
}

// Conversion from StoreError to the main Error type
impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
