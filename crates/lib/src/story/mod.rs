//! The story aggregate and its tree model.
//!
//! A [`Story`] is the single authority over one story's card set. Cards live
//! in an arena (`HashMap<CardId, Card>`) and relate to each other by id
//! only: `parent`/`children` give the branching structure, `above`/`below`
//! give the sibling reading order as a doubly linked chain. All mutation
//! goes through the operations here, which validate fully before touching
//! anything, so a returned error always means an unchanged story.
//!
//! # Invariants
//!
//! - Exactly one card has no parent: the root named by the header.
//! - Each parent's `children` order agrees with the sibling chain, with
//!   `None` links at both ends and no cycles.
//! - `depth` is the parent's depth plus one; the root sits at zero.
//! - `index` equals the card's position in its parent's `children`.
//!
//! [`Story::integrity_check`] validates all of these and is re-run whenever
//! a snapshot is loaded from a store.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::access::{self, Tier};
use crate::card::{Card, CardId, UserId};
use crate::clock::Clock;
use crate::content::Content;
use crate::delta::Delta;

pub mod errors;

pub use errors::StoryError;

/// Identifies a story.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(String);

impl StoryId {
    /// Creates a story id from any string-like input.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Creates a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for StoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&StoryId> for StoryId {
    fn from(id: &StoryId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for StoryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl PartialEq<str> for StoryId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StoryId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Story metadata: identity, membership and counters.
///
/// The three membership lists are ordered by grant time and hold each user
/// at most once; the owner never appears in any of them. `card_counter` is
/// the next card id to allocate and only ever grows, so card ids are never
/// reused within a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryHeader {
    pub id: StoryId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub owner: UserId,
    #[serde(default)]
    pub authors: Vec<UserId>,
    #[serde(default)]
    pub editors: Vec<UserId>,
    #[serde(default)]
    pub viewers: Vec<UserId>,
    pub card_counter: u64,
    pub root: CardId,
    pub created_at: String,
    pub updated_at: String,
}

impl StoryHeader {
    /// The effective tier of `user` on this story, if any.
    pub fn tier_of(&self, user: &UserId) -> Option<Tier> {
        access::tier_of(user, self)
    }
}

/// A full copy of one story: header plus every card, sorted by id.
///
/// This is the unit of persistence and of atomic reads: observers get a
/// snapshot taken between mutations, never a half-applied state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorySnapshot {
    pub header: StoryHeader,
    pub cards: Vec<Card>,
}

impl StorySnapshot {
    /// Look up a card in the snapshot.
    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }
}

/// A nested copy of a card and all its descendants, in child order.
///
/// Structural events carry one of these so observers see a completed
/// subtree, never a partially linked one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtreeShape {
    pub card: Card,
    pub children: Vec<SubtreeShape>,
}

impl SubtreeShape {
    /// Number of cards in this subtree, the root included.
    pub fn card_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.card_count()).sum::<usize>()
    }
}

/// One story's header and card arena.
#[derive(Debug, Clone)]
pub struct Story {
    header: StoryHeader,
    cards: HashMap<CardId, Card>,
}

impl Story {
    /// Create a story with its lone, empty root card.
    ///
    /// The creating user becomes the owner. Card id 0 is the root; the
    /// counter starts at 1.
    pub fn create(
        id: StoryId,
        title: impl Into<String>,
        description: impl Into<String>,
        owner: UserId,
        clock: &dyn Clock,
    ) -> Self {
        let now = clock.now_rfc3339();
        let root = CardId::new(0);
        let mut cards = HashMap::new();
        cards.insert(root, Card::new(root, owner.clone(), 0, Content::new()));
        Self {
            header: StoryHeader {
                id,
                title: title.into(),
                description: description.into(),
                owner,
                authors: Vec::new(),
                editors: Vec::new(),
                viewers: Vec::new(),
                card_counter: 1,
                root,
                created_at: now.clone(),
                updated_at: now,
            },
            cards,
        }
    }

    /// Rebuild a story from a snapshot, validating the tree invariants.
    pub fn from_snapshot(snapshot: StorySnapshot) -> Result<Self, StoryError> {
        let StorySnapshot { header, cards } = snapshot;
        let cards = cards.into_iter().map(|c| (c.id, c)).collect();
        let story = Self { header, cards };
        story.integrity_check()?;
        Ok(story)
    }

    /// A full, detached copy of the current state.
    pub fn snapshot(&self) -> StorySnapshot {
        let mut cards: Vec<Card> = self.cards.values().cloned().collect();
        cards.sort_by_key(|c| c.id);
        StorySnapshot {
            header: self.header.clone(),
            cards,
        }
    }

    pub fn header(&self) -> &StoryHeader {
        &self.header
    }

    pub fn id(&self) -> &StoryId {
        &self.header.id
    }

    pub fn root(&self) -> CardId {
        self.header.root
    }

    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.get(&id)
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    /// The effective tier of `user` on this story, if any.
    pub fn tier_of(&self, user: &UserId) -> Option<Tier> {
        self.header.tier_of(user)
    }

    /// Stamp the header with a new modification time.
    pub fn touch(&mut self, now: String) {
        self.header.updated_at = now;
    }

    /// The ordered child ids of a card.
    pub fn children_of(&self, id: CardId) -> Result<&[CardId], StoryError> {
        Ok(&self.card_ref(id)?.children)
    }

    /// Ids of a card and all its descendants, breadth first.
    pub fn subtree_ids(&self, id: CardId) -> Result<Vec<CardId>, StoryError> {
        self.card_ref(id)?;
        let mut ids = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            ids.push(current);
            queue.extend(self.card_ref(current)?.children.iter().copied());
        }
        Ok(ids)
    }

    /// A nested snapshot of a card and all its descendants.
    pub fn subtree_shape(&self, id: CardId) -> Result<SubtreeShape, StoryError> {
        let card = self.card_ref(id)?.clone();
        let mut children = Vec::with_capacity(card.children.len());
        for child in &card.children {
            children.push(self.subtree_shape(*child)?);
        }
        Ok(SubtreeShape { card, children })
    }

    /// All cards, depth first in reading order (each card before its
    /// children, siblings left to right).
    pub fn outline(&self) -> Vec<&Card> {
        let mut rows = Vec::with_capacity(self.cards.len());
        let mut stack = vec![self.header.root];
        while let Some(id) = stack.pop() {
            if let Some(card) = self.cards.get(&id) {
                rows.push(card);
                stack.extend(card.children.iter().rev().copied());
            }
        }
        rows
    }

    /// Insert a new card under `parent` at sibling position `index`.
    ///
    /// Requires Author. Position 0 means first child; a position equal to
    /// the current child count appends. Returns the id allocated for the
    /// new card; the requestor is recorded as its author.
    pub fn insert_card(
        &mut self,
        parent: CardId,
        index: usize,
        content: Content,
        requestor: &UserId,
    ) -> Result<CardId, StoryError> {
        self.require(requestor, Tier::Author)?;
        let parent_card = self.card_ref(parent)?;
        let max = parent_card.children.len();
        if index > max {
            return Err(StoryError::InvalidPosition { index, max });
        }
        let depth = parent_card.depth + 1;

        let id = CardId::new(self.header.card_counter);
        self.header.card_counter += 1;
        self.cards
            .insert(id, Card::new(id, requestor.clone(), depth, content));
        self.attach(id, parent, index)?;
        Ok(id)
    }

    /// Delete a card and its whole subtree.
    ///
    /// Requires Author. The root cannot be deleted. Removal is atomic: ids
    /// are collected before anything is unlinked, so no partial subtree is
    /// ever observable. Returns the removed ids in breadth-first order.
    pub fn delete_card(
        &mut self,
        card: CardId,
        requestor: &UserId,
    ) -> Result<Vec<CardId>, StoryError> {
        self.require(requestor, Tier::Author)?;
        let target = self.card_ref(card)?;
        if target.is_root() {
            return Err(StoryError::RootDeletionForbidden);
        }

        let removed = self.subtree_ids(card)?;
        self.detach(card)?;
        for id in &removed {
            self.cards.remove(id);
        }
        Ok(removed)
    }

    /// Move a card (with its subtree) under `new_parent` at `new_index`.
    ///
    /// Requires Author. Rejected with [`StoryError::CycleDetected`] when the
    /// destination is the card itself or any of its descendants, which also
    /// covers any attempt to move the root. The position is validated
    /// against the destination's child count as it will be at reattach
    /// time, so moving within the same parent may use one slot less.
    /// Depths of the whole moved subtree are recomputed breadth first.
    pub fn move_card(
        &mut self,
        card: CardId,
        new_parent: CardId,
        new_index: usize,
        requestor: &UserId,
    ) -> Result<(), StoryError> {
        self.require(requestor, Tier::Author)?;
        let moved = self.card_ref(card)?;
        let old_parent = moved.parent;
        self.card_ref(new_parent)?;

        // Walk the destination's ancestor chain; meeting the moved card
        // means the destination sits inside the moved subtree. Every chain
        // ends at the root, so moving the root always lands here too.
        let mut cursor = Some(new_parent);
        while let Some(current) = cursor {
            if current == card {
                return Err(StoryError::CycleDetected { card, new_parent });
            }
            cursor = self.card_ref(current)?.parent;
        }
        let Some(old_parent) = old_parent else {
            return Err(StoryError::CycleDetected { card, new_parent });
        };

        let sibling_count = self.card_ref(new_parent)?.children.len();
        let max = if old_parent == new_parent {
            sibling_count - 1
        } else {
            sibling_count
        };
        if new_index > max {
            return Err(StoryError::InvalidPosition {
                index: new_index,
                max,
            });
        }

        self.detach(card)?;
        self.attach(card, new_parent, new_index)?;
        let depth = self.card_ref(new_parent)?.depth + 1;
        self.recompute_depths(card, depth)
    }

    /// Apply a whole-document content delta to one card.
    ///
    /// The delta's base length must equal the card's current content
    /// length; anything else means it was built against a stale snapshot
    /// and is rejected without touching the card. On success the card's
    /// version is bumped and returned.
    pub fn apply_edit(&mut self, card: CardId, delta: &Delta) -> Result<u64, StoryError> {
        let target = self.card_ref(card)?;
        let next = target.content.apply(delta)?;
        let target = self.card_mut(card)?;
        target.content = next;
        target.version += 1;
        Ok(target.version)
    }

    /// Retitle the story. Requires Author.
    pub fn rename(&mut self, title: impl Into<String>, requestor: &UserId) -> Result<(), StoryError> {
        self.require(requestor, Tier::Author)?;
        self.header.title = title.into();
        Ok(())
    }

    /// Replace the story description. Requires Author.
    pub fn set_description(
        &mut self,
        description: impl Into<String>,
        requestor: &UserId,
    ) -> Result<(), StoryError> {
        self.require(requestor, Tier::Author)?;
        self.header.description = description.into();
        Ok(())
    }

    /// Grant `user` a membership tier. Owner only.
    ///
    /// The user is first removed from any list they were in, so membership
    /// stays single-listed; granting is also how an existing member is
    /// promoted or demoted. The owner's standing cannot be changed and the
    /// Owner tier cannot be granted.
    pub fn grant(&mut self, user: UserId, tier: Tier, requestor: &UserId) -> Result<(), StoryError> {
        self.require(requestor, Tier::Owner)?;
        if tier == Tier::Owner || user == self.header.owner {
            return Err(StoryError::OwnerImmutable);
        }
        self.remove_membership(&user);
        match tier {
            Tier::Author => self.header.authors.push(user),
            Tier::Editor => self.header.editors.push(user),
            _ => self.header.viewers.push(user),
        }
        Ok(())
    }

    /// Remove `user` from all membership lists. Owner only.
    ///
    /// Revoking a user who holds nothing is a no-op; revoking the owner is
    /// rejected.
    pub fn revoke(&mut self, user: &UserId, requestor: &UserId) -> Result<(), StoryError> {
        self.require(requestor, Tier::Owner)?;
        if *user == self.header.owner {
            return Err(StoryError::OwnerImmutable);
        }
        self.remove_membership(user);
        Ok(())
    }

    /// Validate every tree invariant, reporting the first violation.
    pub fn integrity_check(&self) -> Result<(), StoryError> {
        let violation = |reason: String| StoryError::IntegrityViolation { reason };

        let root = self.header.root;
        let Some(root_card) = self.cards.get(&root) else {
            return Err(violation(format!("root card {root} is missing")));
        };
        if root_card.parent.is_some() {
            return Err(violation(format!("root card {root} has a parent")));
        }
        if root_card.depth != 0 {
            return Err(violation(format!(
                "root card {root} has depth {}",
                root_card.depth
            )));
        }

        for card in self.cards.values() {
            if card.parent.is_none() && card.id != root {
                return Err(violation(format!(
                    "card {} has no parent but is not the root",
                    card.id
                )));
            }
            if card.id.get() >= self.header.card_counter {
                return Err(violation(format!(
                    "card {} is beyond the allocation counter {}",
                    card.id, self.header.card_counter
                )));
            }

            for (position, child_id) in card.children.iter().enumerate() {
                let Some(child) = self.cards.get(child_id) else {
                    return Err(violation(format!(
                        "card {} lists missing child {child_id}",
                        card.id
                    )));
                };
                if child.parent != Some(card.id) {
                    return Err(violation(format!(
                        "card {child_id} does not point back at parent {}",
                        card.id
                    )));
                }
                if child.index != position {
                    return Err(violation(format!(
                        "card {child_id} has index {} but sits at position {position}",
                        child.index
                    )));
                }
                if child.depth != card.depth + 1 {
                    return Err(violation(format!(
                        "card {child_id} has depth {} under a parent at depth {}",
                        child.depth, card.depth
                    )));
                }
                let expected_above = position.checked_sub(1).map(|i| card.children[i]);
                if child.above != expected_above {
                    return Err(violation(format!(
                        "card {child_id} has a broken 'above' link"
                    )));
                }
                let expected_below = card.children.get(position + 1).copied();
                if child.below != expected_below {
                    return Err(violation(format!(
                        "card {child_id} has a broken 'below' link"
                    )));
                }
            }
        }

        // Reachability doubles as the cycle check: a consistent parent
        // relation that reaches every card from the root has no cycles.
        let reachable = self.subtree_ids(root)?;
        if reachable.len() != self.cards.len() {
            return Err(violation(format!(
                "{} of {} cards are unreachable from the root",
                self.cards.len() - reachable.len(),
                self.cards.len()
            )));
        }
        Ok(())
    }

    fn card_ref(&self, id: CardId) -> Result<&Card, StoryError> {
        self.cards.get(&id).ok_or(StoryError::NotFound { card: id })
    }

    fn card_mut(&mut self, id: CardId) -> Result<&mut Card, StoryError> {
        self.cards
            .get_mut(&id)
            .ok_or(StoryError::NotFound { card: id })
    }

    fn require(&self, user: &UserId, required: Tier) -> Result<(), StoryError> {
        if access::evaluate(required, user, &self.header) {
            Ok(())
        } else {
            Err(StoryError::PermissionDenied {
                user: user.clone(),
                required,
            })
        }
    }

    /// Drop `user` from every membership list, keeping membership
    /// single-listed.
    fn remove_membership(&mut self, user: &UserId) {
        self.header.authors.retain(|u| u != user);
        self.header.editors.retain(|u| u != user);
        self.header.viewers.retain(|u| u != user);
    }

    /// Unlink a card from its parent's child list and the sibling chain.
    /// The card and its subtree stay in the arena.
    fn detach(&mut self, card: CardId) -> Result<(), StoryError> {
        let target = self.card_ref(card)?;
        let Some(parent) = target.parent else {
            return Ok(());
        };
        let above = target.above;
        let below = target.below;

        if let Some(above) = above {
            self.card_mut(above)?.below = below;
        }
        if let Some(below) = below {
            self.card_mut(below)?.above = above;
        }
        self.card_mut(parent)?.children.retain(|c| *c != card);
        self.renumber_children(parent)?;

        let target = self.card_mut(card)?;
        target.parent = None;
        target.above = None;
        target.below = None;
        Ok(())
    }

    /// Splice a detached card into `parent`'s children at `index` and stitch
    /// the sibling chain around it. The slot must already be validated.
    fn attach(&mut self, card: CardId, parent: CardId, index: usize) -> Result<(), StoryError> {
        let parent_card = self.card_ref(parent)?;
        let above = index
            .checked_sub(1)
            .and_then(|i| parent_card.children.get(i))
            .copied();
        let below = parent_card.children.get(index).copied();

        if let Some(above) = above {
            self.card_mut(above)?.below = Some(card);
        }
        if let Some(below) = below {
            self.card_mut(below)?.above = Some(card);
        }
        self.card_mut(parent)?.children.insert(index, card);

        let target = self.card_mut(card)?;
        target.parent = Some(parent);
        target.above = above;
        target.below = below;
        self.renumber_children(parent)
    }

    fn renumber_children(&mut self, parent: CardId) -> Result<(), StoryError> {
        let children = self.card_ref(parent)?.children.clone();
        for (position, id) in children.into_iter().enumerate() {
            self.card_mut(id)?.index = position;
        }
        Ok(())
    }

    /// Reset `card`'s depth and walk its subtree breadth first, keeping
    /// every descendant one deeper than its parent.
    fn recompute_depths(&mut self, card: CardId, depth: u32) -> Result<(), StoryError> {
        let mut queue = VecDeque::from([(card, depth)]);
        while let Some((id, depth)) = queue.pop_front() {
            let current = self.card_mut(id)?;
            current.depth = depth;
            let children = current.children.clone();
            queue.extend(children.into_iter().map(|c| (c, depth + 1)));
        }
        Ok(())
    }
}
