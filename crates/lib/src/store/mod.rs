//! Persistence boundary for stories.
//!
//! A [`Store`] holds full story snapshots and absorbs the minimal
//! [`ChangeSet`] the engine produces for each accepted command. The engine
//! treats the store as authoritative: a failed write is fatal for the
//! command that caused it and is reported to the submitter unmodified.
//!
//! [`InMemory`] is the bundled implementation: a `HashMap` per story behind
//! a read-write lock, with whole-state JSON persistence for development and
//! the command line shell.

pub mod errors;

pub use errors::StoreError;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Result;
use crate::card::{Card, CardId};
use crate::story::{Story, StoryHeader, StoryId, StorySnapshot};

/// The minimal write set produced by one accepted command.
///
/// `header` replaces the stored header when present; `upserts` replace or
/// add the named cards; `removals` delete cards. Removals are applied
/// before upserts, so a card named in both ends up stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Replacement header, when the command touched it.
    #[serde(default)]
    pub header: Option<StoryHeader>,
    /// Cards to add or replace wholesale.
    #[serde(default)]
    pub upserts: Vec<Card>,
    /// Ids of cards to delete.
    #[serde(default)]
    pub removals: Vec<CardId>,
}

impl ChangeSet {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when applying this change set would write nothing.
    pub fn is_empty(&self) -> bool {
        self.header.is_none() && self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// A pluggable persistence layer for stories.
///
/// Implementations must be safe to share across threads; the engine calls
/// them from its own task, always between mutating the in-memory tree and
/// publishing events for the change. Every accepted command becomes exactly
/// one `apply_changes` call.
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Persist a brand new story. Fails if the id is already taken.
    fn create_story(&self, snapshot: &StorySnapshot) -> Result<()>;

    /// Load a full snapshot of one story.
    ///
    /// The snapshot is validated against the tree invariants before it is
    /// returned, so corrupted storage surfaces here instead of producing an
    /// inconsistent story later.
    fn load_story(&self, story: &StoryId) -> Result<StorySnapshot>;

    /// Apply one change set to a stored story.
    fn apply_changes(&self, story: &StoryId, changes: &ChangeSet) -> Result<()>;

    /// Remove a story and all its cards.
    fn delete_story(&self, story: &StoryId) -> Result<()>;

    /// Ids of all stored stories, sorted.
    fn list_stories(&self) -> Result<Vec<StoryId>>;

    /// Whether a story is stored.
    fn contains(&self, story: &StoryId) -> Result<bool>;
}

/// One stored story: its header plus the card arena keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredStory {
    header: StoryHeader,
    cards: HashMap<CardId, Card>,
}

impl StoredStory {
    fn from_snapshot(snapshot: &StorySnapshot) -> Self {
        Self {
            header: snapshot.header.clone(),
            cards: snapshot.cards.iter().map(|c| (c.id, c.clone())).collect(),
        }
    }

    fn to_snapshot(&self) -> StorySnapshot {
        let mut cards: Vec<Card> = self.cards.values().cloned().collect();
        cards.sort_by_key(|c| c.id);
        StorySnapshot {
            header: self.header.clone(),
            cards,
        }
    }
}

/// A simple in-memory store implementation using a `HashMap` for storage.
///
/// This store is suitable for testing, development, or scenarios where
/// data persistence is not strictly required or is handled externally
/// (e.g., by saving/loading the entire state to/from a file).
///
/// It provides basic persistence capabilities via `save_to_file` and
/// `load_from_file`, serializing all stories to JSON.
#[derive(Debug)]
pub struct InMemory {
    /// Stories keyed by id, behind a read-write lock for concurrent access
    stories: RwLock<HashMap<StoryId, StoredStory>>,
}

/// Serializable version of InMemory for persistence
#[derive(Serialize, Deserialize)]
struct SerializableStore {
    #[serde(default)]
    stories: HashMap<StoryId, StoredStory>,
}

impl Serialize for InMemory {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let stories = self.stories.read().unwrap().clone();
        SerializableStore { stories }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InMemory {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let serializable = SerializableStore::deserialize(deserializer)?;
        Ok(InMemory {
            stories: RwLock::new(serializable.stories),
        })
    }
}

impl Default for InMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemory {
    /// Creates a new, empty `InMemory` store.
    pub fn new() -> Self {
        Self {
            stories: RwLock::new(HashMap::new()),
        }
    }

    /// Saves the entire store state (all stories) to a specified file as JSON.
    ///
    /// # Arguments
    /// * `path` - The path to the file where the state should be saved.
    ///
    /// # Returns
    /// A `Result` indicating success or an I/O or serialization error.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::SerializationFailed { source: e })?;
        fs::write(path, json).map_err(|e| StoreError::FileIo { source: e })?;
        Ok(())
    }

    /// Loads the store state from a specified JSON file.
    ///
    /// If the file does not exist, a new, empty `InMemory` store is returned.
    ///
    /// # Arguments
    /// * `path` - The path to the file from which to load the state.
    ///
    /// # Returns
    /// A `Result` containing the loaded `InMemory` store or an I/O or
    /// deserialization error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            return Ok(Self::new());
        }

        let json = fs::read_to_string(path).map_err(|e| StoreError::FileIo { source: e })?;
        let store: Self = serde_json::from_str(&json)
            .map_err(|e| StoreError::DeserializationFailed { source: e })?;

        Ok(store)
    }
}

impl Store for InMemory {
    fn create_story(&self, snapshot: &StorySnapshot) -> Result<()> {
        let mut stories = self.stories.write().unwrap();
        let id = snapshot.header.id.clone();
        if stories.contains_key(&id) {
            return Err(StoreError::StoryAlreadyExists { story: id }.into());
        }
        stories.insert(id, StoredStory::from_snapshot(snapshot));
        Ok(())
    }

    fn load_story(&self, story: &StoryId) -> Result<StorySnapshot> {
        let snapshot = {
            let stories = self.stories.read().unwrap();
            let stored = stories.get(story).ok_or_else(|| StoreError::StoryNotFound {
                story: story.clone(),
            })?;
            stored.to_snapshot()
        };
        // Reject corrupted state at the boundary rather than wherever the
        // broken link would first be followed.
        let validated = Story::from_snapshot(snapshot)?;
        Ok(validated.snapshot())
    }

    fn apply_changes(&self, story: &StoryId, changes: &ChangeSet) -> Result<()> {
        let mut stories = self.stories.write().unwrap();
        let stored = stories
            .get_mut(story)
            .ok_or_else(|| StoreError::StoryNotFound {
                story: story.clone(),
            })?;

        for id in &changes.removals {
            stored.cards.remove(id);
        }
        for card in &changes.upserts {
            stored.cards.insert(card.id, card.clone());
        }
        if let Some(header) = &changes.header {
            stored.header = header.clone();
        }
        Ok(())
    }

    fn delete_story(&self, story: &StoryId) -> Result<()> {
        let mut stories = self.stories.write().unwrap();
        stories
            .remove(story)
            .ok_or_else(|| StoreError::StoryNotFound {
                story: story.clone(),
            })?;
        Ok(())
    }

    fn list_stories(&self) -> Result<Vec<StoryId>> {
        let stories = self.stories.read().unwrap();
        let mut ids: Vec<StoryId> = stories.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn contains(&self, story: &StoryId) -> Result<bool> {
        let stories = self.stories.read().unwrap();
        Ok(stories.contains_key(story))
    }
}
