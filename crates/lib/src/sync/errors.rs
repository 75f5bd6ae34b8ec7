//! Error types for talking to a story engine.
//!
//! Domain rejections (permission, staleness, structure) travel as
//! [`crate::story::StoryError`] or as protocol outcomes; the variants here
//! only cover the channel itself going away.

use thiserror::Error;

/// Errors that can occur when a handle talks to its engine.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SyncError {
    /// The engine's command channel is closed; the engine has stopped.
    #[error("engine is not running: failed to send {operation} command")]
    CommandSend { operation: &'static str },

    /// The engine dropped the reply channel without answering.
    #[error("engine stopped before answering {operation} command")]
    ReplyDropped { operation: &'static str },
}

impl SyncError {
    /// Check if this error means the engine is no longer running.
    pub fn is_engine_stopped(&self) -> bool {
        matches!(
            self,
            SyncError::CommandSend { .. } | SyncError::ReplyDropped { .. }
        )
    }
}

impl From<SyncError> for crate::Error {
    fn from(err: SyncError) -> Self {
        crate::Error::Sync(err)
    }
}
