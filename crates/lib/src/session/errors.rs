//! Error types for edit sessions.

use thiserror::Error;

/// Errors that can occur while recording into an edit session.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session is closed and accepts no further changes.
    #[error("edit session is closed")]
    Closed,

    /// A recorded delta does not span the session's tracked content.
    ///
    /// `expected` is the length the session currently tracks, `found` is
    /// the base length of the offending delta.
    #[error("invalid delta: session tracks {expected} chars, delta spans {found}")]
    InvalidDelta { expected: usize, found: usize },

    /// The session's driver task is gone, usually because the session was
    /// closed or its engine shut down.
    #[error("edit session driver is not running")]
    Disconnected,
}

impl SessionError {
    /// Check if this error means the session no longer accepts changes.
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionError::Closed | SessionError::Disconnected)
    }

    /// Check if this error reports a delta built against the wrong length.
    pub fn is_invalid_delta(&self) -> bool {
        matches!(self, SessionError::InvalidDelta { .. })
    }
}

impl From<SessionError> for crate::Error {
    fn from(err: SessionError) -> Self {
        crate::Error::Session(err)
    }
}
