//! Error types for story and tree-model operations.
//!
//! Every variant here is a rejected command, raised before any mutation:
//! a failed operation leaves the story exactly as it was. Permission and
//! staleness failures are ordinary outcomes for a collaborative document
//! and are classified, not panicked on.

use thiserror::Error;

use crate::access::Tier;
use crate::card::{CardId, UserId};
use crate::delta::DeltaError;

/// Structured error types for story operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoryError {
    /// The requestor's effective tier is below what the operation needs.
    #[error("user '{user}' lacks {required} access")]
    PermissionDenied { user: UserId, required: Tier },

    /// A referenced card id is absent, usually a sign of stale client state.
    #[error("card {card} does not exist")]
    NotFound { card: CardId },

    /// A sibling index outside the parent's accepted range.
    #[error("invalid sibling position {index}: the parent accepts 0..={max}")]
    InvalidPosition { index: usize, max: usize },

    /// Moving a card underneath itself or one of its descendants.
    #[error("cannot move card {card} under card {new_parent}: the destination is inside the moved subtree")]
    CycleDetected { card: CardId, new_parent: CardId },

    /// The root card anchors the tree and cannot be removed.
    #[error("the root card cannot be deleted")]
    RootDeletionForbidden,

    /// Ownership is assigned at creation; it cannot be granted, revoked or
    /// handed to another user through membership edits.
    #[error("ownership is fixed at creation and cannot be granted or revoked")]
    OwnerImmutable,

    /// A loaded or mutated story failed invariant validation.
    #[error("story integrity violated: {reason}")]
    IntegrityViolation { reason: String },

    /// A content delta failed its length precondition.
    #[error(transparent)]
    Delta(#[from] DeltaError),
}

impl StoryError {
    /// Check if this error is a permission rejection.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StoryError::PermissionDenied { .. })
    }

    /// Check if this error reports a missing card.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoryError::NotFound { .. })
    }

    /// Check if this error is a structural guard rejection.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            StoryError::InvalidPosition { .. }
                | StoryError::CycleDetected { .. }
                | StoryError::RootDeletionForbidden
        )
    }

    /// Check if this error means a content edit raced a newer change.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoryError::Delta(DeltaError::LengthMismatch { .. }))
    }

    /// Check if this error reports a failed invariant validation.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, StoryError::IntegrityViolation { .. })
    }
}

impl From<StoryError> for crate::Error {
    fn from(err: StoryError) -> Self {
        crate::Error::Story(err)
    }
}
