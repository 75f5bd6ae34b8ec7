//!
//! Fabler: a collaborative engine for branching stories.
//! This library provides the card tree model, the editing pipeline and the
//! synchronization machinery for building Fabler services.
//!
//! ## Core Concepts
//!
//! Fabler is built around several key concepts:
//!
//! * **Deltas (`delta::Delta`)**: Whole-document text changes expressed as retain, insert and delete runs with optional formatting attributes. Deltas compose, so a burst of keystrokes collapses into one change.
//! * **Cards (`card::Card`)**: The unit of story structure. Each card holds formatted content plus its place in the tree: parent, ordered children and sibling links.
//! * **Stories (`story::Story`)**: The aggregate. A story owns a card tree rooted at a synthetic root card and the header carrying title, membership and counters.
//! * **Tiers (`access::Tier`)**: Cascading permission levels (viewer, editor, author, owner). Every mutating operation names the tier it requires.
//! * **Sessions (`session::EditSession`)**: Per-card edit accumulators. Keystroke deltas compose locally and flush on a timer as a single content edit.
//! * **Engine (`sync::StoryEngine`)**: The single writer for a story. Commands arrive on a channel, mutate the tree, persist, then fan out as events to subscribers.
//! * **Stores (`store::Store`)**: A pluggable persistence layer that receives minimal change sets after each accepted command.

pub mod access;
pub mod card;
pub mod clock;
pub mod constants;
pub mod content;
pub mod delta;
pub mod session;
pub mod store;
pub mod story;
pub mod sync;

pub use access::{Tier, evaluate, tier_of};
pub use card::{Card, CardId, UserId};
pub use clock::{Clock, FixedClock, SystemClock};
pub use content::{Content, Span};
pub use delta::{Attributes, Delta, Op};
pub use session::{EditSession, SessionHandle, SessionSignal, SessionState};
pub use store::{ChangeSet, InMemory, Store};
pub use story::{Story, StoryHeader, StoryId, StorySnapshot, SubtreeShape};
pub use sync::{
    ContentEdit, ContentOutcome, EngineHandle, EngineOptions, EventHook, RejectReason, StoryEngine,
    StoryEvent, StructuralCommand, StructuralKind,
};

/// Result type used throughout the Fabler library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Fabler library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured delta errors from the delta module
    #[error(transparent)]
    Delta(delta::DeltaError),

    /// Structured story and tree-model errors from the story module
    #[error(transparent)]
    Story(story::StoryError),

    /// Structured edit session errors from the session module
    #[error(transparent)]
    Session(session::SessionError),

    /// Structured engine and protocol errors from the sync module
    #[error(transparent)]
    Sync(sync::SyncError),

    /// Structured persistence errors from the store module
    #[error(transparent)]
    Store(store::StoreError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Delta(_) => "delta",
            Error::Story(_) => "story",
            Error::Session(_) => "session",
            Error::Sync(_) => "sync",
            Error::Store(_) => "store",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Story(story_err) => story_err.is_not_found(),
            Error::Store(store_err) => store_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates permission was denied.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Error::Story(story_err) => story_err.is_permission_denied(),
            _ => false,
        }
    }

    /// Check if this error indicates a conflict: a content edit that raced a
    /// newer change, or a resource that already exists.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Delta(delta_err) => delta_err.is_length_mismatch(),
            Error::Story(story_err) => story_err.is_conflict(),
            Error::Store(store_err) => store_err.is_already_exists(),
            _ => false,
        }
    }

    /// Check if this error reports a story that failed invariant validation.
    pub fn is_integrity_error(&self) -> bool {
        match self {
            Error::Story(story_err) => story_err.is_integrity_violation(),
            _ => false,
        }
    }

    /// Check if this error means the engine for a story is no longer running.
    pub fn is_engine_stopped(&self) -> bool {
        match self {
            Error::Sync(sync_err) => sync_err.is_engine_stopped(),
            _ => false,
        }
    }

    /// Check if this error came from an edit session.
    pub fn is_session_error(&self) -> bool {
        matches!(self, Error::Session(_))
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Store(store_err) => store_err.is_io_error(),
            _ => false,
        }
    }
}
