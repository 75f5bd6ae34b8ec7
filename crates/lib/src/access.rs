//! Permission tiers and the cascading access check.
//!
//! Every story carries an owner plus three ordered membership lists
//! (authors, editors, viewers). A user's effective tier is the highest one
//! that matches, found by walking owner, authors, editors, viewers in that
//! order and stopping at the first hit. Membership upkeep guarantees a user
//! appears in at most one list, so the walk order is also the tier order.
//!
//! Evaluation is pure: no side effects, no errors. A user without access is
//! an ordinary `false`, and callers turn that into
//! [`PermissionDenied`](crate::story::StoryError::PermissionDenied) at the
//! mutation boundary.

use serde::{Deserialize, Serialize};

use crate::card::UserId;
use crate::story::StoryHeader;

/// Access tiers, weakest to strongest.
///
/// The derived ordering follows declaration order, so
/// `Viewer < Editor < Author < Owner` and a simple `>=` answers "does this
/// tier suffice".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// May read the story.
    Viewer,
    /// May edit card text.
    Editor,
    /// May also create, move and delete cards and retitle the story.
    Author,
    /// Full control, including membership and story deletion. Exactly one.
    Owner,
}

impl Tier {
    /// True when this tier satisfies `required`.
    pub fn allows(&self, required: Tier) -> bool {
        *self >= required
    }

    /// Check if this tier allows modifying card text.
    pub fn can_edit(&self) -> bool {
        self.allows(Tier::Editor)
    }

    /// Check if this tier allows structural changes.
    pub fn can_author(&self) -> bool {
        self.allows(Tier::Author)
    }

    /// Check if this tier allows membership and lifecycle operations.
    pub fn can_own(&self) -> bool {
        self.allows(Tier::Owner)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tier::Viewer => "viewer",
            Tier::Editor => "editor",
            Tier::Author => "author",
            Tier::Owner => "owner",
        };
        write!(f, "{name}")
    }
}

/// The effective tier of `user` for the story described by `header`.
///
/// First match wins: the owner reference is checked before any list, and
/// each list before the ones below it. Returns `None` for strangers.
pub fn tier_of(user: &UserId, header: &StoryHeader) -> Option<Tier> {
    if header.owner == *user {
        Some(Tier::Owner)
    } else if header.authors.contains(user) {
        Some(Tier::Author)
    } else if header.editors.contains(user) {
        Some(Tier::Editor)
    } else if header.viewers.contains(user) {
        Some(Tier::Viewer)
    } else {
        None
    }
}

/// Does `user` hold at least `required` on this story?
pub fn evaluate(required: Tier, user: &UserId, header: &StoryHeader) -> bool {
    tier_of(user, header).is_some_and(|tier| tier.allows(required))
}
