//! Wire types for the story synchronization protocol.
//!
//! Inbound, clients speak in commands: [`StructuralCommand`] reshapes the
//! tree and [`ContentEdit`] rewrites one card's text. Outbound, the engine
//! answers submitters directly and publishes a [`StoryEvent`] to every
//! subscriber after each command commits. All types serialize to JSON so
//! the protocol can cross a process boundary unchanged.

use serde::{Deserialize, Serialize};

use crate::card::{CardId, UserId};
use crate::content::Content;
use crate::delta::Delta;
use crate::story::SubtreeShape;

/// A tree mutation requested by one user.
///
/// Structural commands are coarse grained on purpose: each maps to exactly
/// one story operation and either fully applies or is rejected with the
/// story untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuralCommand {
    /// Insert a new card under `parent` at sibling position `index`.
    Insert {
        parent: CardId,
        index: usize,
        content: Content,
        requestor: UserId,
    },
    /// Delete a card and its whole subtree.
    Delete { card: CardId, requestor: UserId },
    /// Move a card (with its subtree) under `new_parent` at `new_index`.
    Move {
        card: CardId,
        new_parent: CardId,
        new_index: usize,
        requestor: UserId,
    },
}

impl StructuralCommand {
    /// The user asking for this mutation.
    pub fn requestor(&self) -> &UserId {
        match self {
            StructuralCommand::Insert { requestor, .. }
            | StructuralCommand::Delete { requestor, .. }
            | StructuralCommand::Move { requestor, .. } => requestor,
        }
    }

    /// The operation kind, as events will report it.
    pub fn kind(&self) -> StructuralKind {
        match self {
            StructuralCommand::Insert { .. } => StructuralKind::Insert,
            StructuralCommand::Delete { .. } => StructuralKind::Delete,
            StructuralCommand::Move { .. } => StructuralKind::Move,
        }
    }
}

/// Which structural operation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralKind {
    Insert,
    Delete,
    Move,
}

impl std::fmt::Display for StructuralKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructuralKind::Insert => write!(f, "insert"),
            StructuralKind::Delete => write!(f, "delete"),
            StructuralKind::Move => write!(f, "move"),
        }
    }
}

/// One flushed batch of changes to one card's content.
///
/// The delta spans the whole document and was built against the card as it
/// stood at `expected_version`; the engine refuses the edit if the card has
/// moved on since.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEdit {
    /// The card being rewritten.
    pub card: CardId,
    /// The composed whole-document change.
    pub delta: Delta,
    /// Card version the delta was built against.
    pub expected_version: u64,
    /// The user whose edits these are.
    pub requestor: UserId,
}

/// Why a content edit was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// The edit was built against an older version of the card.
    StaleVersion { expected: u64, found: u64 },
    /// The delta does not span the card's current content.
    LengthMismatch { expected: usize, found: usize },
    /// The requestor's tier does not allow editing.
    PermissionDenied { user: UserId },
    /// The card no longer exists.
    NotFound { card: CardId },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::StaleVersion { expected, found } => {
                write!(f, "edit built against version {expected}, card is at {found}")
            }
            RejectReason::LengthMismatch { expected, found } => {
                write!(f, "delta spans {expected} chars, content has {found}")
            }
            RejectReason::PermissionDenied { user } => {
                write!(f, "user '{user}' lacks editor access")
            }
            RejectReason::NotFound { card } => write!(f, "card {card} does not exist"),
        }
    }
}

/// The engine's direct answer to a submitted content edit.
///
/// A rejection is an ordinary outcome, not an error: the submitter is
/// expected to discard its stale delta and refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ContentOutcome {
    /// The edit was applied; the card now carries this version.
    Applied { version: u64 },
    /// The edit was refused and the card is unchanged.
    Rejected { reason: RejectReason },
}

impl ContentOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ContentOutcome::Applied { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ContentOutcome::Rejected { .. })
    }
}

/// A change notification published to subscribers after a command commits.
///
/// Events are published in commit order, after the store write. Structural
/// events carry the affected parent's completed shape, so observers never
/// see a half-linked tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoryEvent {
    /// The tree changed shape under `subtree.card`.
    ///
    /// For an insert or a move this is the new parent's subtree; for a
    /// delete it is the former parent's subtree after removal.
    Structural {
        kind: StructuralKind,
        subtree: SubtreeShape,
    },
    /// A content edit was applied to `card`.
    ContentApplied { card: CardId, version: u64 },
    /// A content edit was refused.
    ContentRejected { card: CardId, reason: RejectReason },
}
