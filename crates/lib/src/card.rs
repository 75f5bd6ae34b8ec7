//! Card entity and the identifier types shared across the crate.
//!
//! A card is one passage of a story: a block of styled text with a position
//! in the story tree. Cards are plain data records; the tree invariants that
//! relate them (parent/child depth, sibling links, index numbering) are
//! enforced by [`Story`](crate::story::Story), which owns the card arena.

use serde::{Deserialize, Serialize};

use crate::content::Content;

/// Identifies a card within one story.
///
/// Allocated monotonically from the story header's card counter, so ids are
/// unique per story and never reused, even after deletion.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CardId(u64);

impl CardId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CardId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<CardId> for u64 {
    fn from(id: CardId) -> Self {
        id.0
    }
}

impl PartialEq<u64> for CardId {
    fn eq(&self, other: &u64) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a user.
///
/// Fabler treats identity as resolved: every inbound operation carries one
/// of these, produced by whatever authentication layer sits in front of the
/// engine. The engine only compares them against story membership lists.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new user id from any string-like input.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&UserId> for UserId {
    fn from(id: &UserId) -> Self {
        id.clone()
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for UserId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl PartialEq<str> for UserId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for UserId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<String> for UserId {
    fn eq(&self, other: &String) -> bool {
        &self.0 == other
    }
}

/// One passage in a story tree.
///
/// Relations are held by id only (arena style): `parent` is `None` exactly
/// for the root, `children` is ordered by sibling position, and
/// `above`/`below` form the doubly linked sibling chain with `None` at the
/// ends. `version` counts accepted content edits and backs the staleness
/// check on flushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    /// The user who created this card.
    pub author: UserId,
    /// Distance from the root; the root itself is 0.
    pub depth: u32,
    /// Position within the parent's `children`.
    pub index: usize,
    pub parent: Option<CardId>,
    pub children: Vec<CardId>,
    pub above: Option<CardId>,
    pub below: Option<CardId>,
    pub content: Content,
    /// Monotonic content version, bumped once per accepted edit.
    pub version: u64,
}

impl Card {
    /// A freshly created, unlinked card. The story links it into the tree.
    pub fn new(id: CardId, author: UserId, depth: u32, content: Content) -> Self {
        Self {
            id,
            author,
            depth,
            index: 0,
            parent: None,
            children: Vec::new(),
            above: None,
            below: None,
            content,
            version: 0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
