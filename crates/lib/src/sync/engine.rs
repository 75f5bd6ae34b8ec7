//! The story engine: a single-writer actor per live story.
//!
//! Every mutation to one story flows through one [`StoryEngine`] task.
//! Structural commands, flushed content edits and reads arrive on a
//! command channel and are handled strictly in arrival order: apply to the
//! in-memory tree, persist the minimal change set, then publish an event.
//! An event is therefore only ever observed for state the store already
//! holds, and two commands can never interleave halfway.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, info, info_span};

use crate::access::{Tier, evaluate};
use crate::card::{Card, CardId, UserId};
use crate::clock::Clock;
use crate::constants::{
    DEFAULT_FLUSH_INTERVAL, ENGINE_CHANNEL_CAPACITY, SESSION_CHANNEL_CAPACITY,
    SESSION_SIGNAL_CAPACITY, SUBSCRIBER_CHANNEL_CAPACITY,
};
use crate::delta::DeltaError;
use crate::Result;
use crate::session::{EditSession, SessionHandle, SessionSignal, driver};
use crate::store::{ChangeSet, Store};
use crate::story::{Story, StoryError, StoryHeader, StoryId, StorySnapshot};

use super::errors::SyncError;
use super::hooks::{ChannelHook, EventHookCollection};
use super::protocol::{ContentEdit, ContentOutcome, RejectReason, StoryEvent, StructuralCommand};

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// How often open sessions flush accumulated edits.
    pub flush_interval: Duration,
    /// Buffer size of the engine command channel.
    pub command_capacity: usize,
    /// Buffer size of each session's command channel.
    pub session_capacity: usize,
    /// Buffer size of each session's signal channel.
    pub signal_capacity: usize,
    /// Buffer size of each subscriber's event channel.
    pub subscriber_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            command_capacity: ENGINE_CHANNEL_CAPACITY,
            session_capacity: SESSION_CHANNEL_CAPACITY,
            signal_capacity: SESSION_SIGNAL_CAPACITY,
            subscriber_capacity: SUBSCRIBER_CHANNEL_CAPACITY,
        }
    }
}

/// Commands that can be sent to a story engine
#[derive(Debug)]
pub(crate) enum EngineCommand {
    /// Apply one structural mutation
    Structural {
        command: StructuralCommand,
        reply: oneshot::Sender<Result<StoryEvent>>,
    },
    /// Apply one flushed content edit
    Content {
        edit: ContentEdit,
        reply: oneshot::Sender<Result<ContentOutcome>>,
    },
    /// Open an edit session on one card
    OpenSession {
        card: CardId,
        user: UserId,
        reply: oneshot::Sender<Result<(SessionHandle, mpsc::Receiver<SessionSignal>)>>,
    },
    /// Read a full snapshot
    Snapshot {
        reply: oneshot::Sender<StorySnapshot>,
    },
    /// Read the current header
    Header { reply: oneshot::Sender<StoryHeader> },
    /// Attach a new event subscriber
    Subscribe {
        reply: oneshot::Sender<mpsc::Receiver<StoryEvent>>,
    },
    /// Delete the story and stop the engine. Owner only
    DeleteStory {
        requestor: UserId,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Stop the engine
    Shutdown { reply: oneshot::Sender<()> },
}

/// Single-writer actor owning one story's live state.
pub struct StoryEngine {
    story: Story,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    hooks: EventHookCollection,
    options: EngineOptions,
    command_rx: mpsc::Receiver<EngineCommand>,
    /// Kept for handing to session drivers spawned on demand
    command_tx: mpsc::Sender<EngineCommand>,
}

impl StoryEngine {
    /// Create a brand new story, persist it, and start its engine.
    ///
    /// The creating user becomes the owner.
    pub fn create(
        store: Arc<dyn Store>,
        id: StoryId,
        title: impl Into<String>,
        description: impl Into<String>,
        owner: UserId,
        clock: Arc<dyn Clock>,
        options: EngineOptions,
    ) -> Result<EngineHandle> {
        let story = Story::create(id, title, description, owner, clock.as_ref());
        store.create_story(&story.snapshot())?;
        Ok(Self::start(story, store, clock, options))
    }

    /// Load a stored story and start its engine.
    pub fn load(
        store: Arc<dyn Store>,
        id: &StoryId,
        clock: Arc<dyn Clock>,
        options: EngineOptions,
    ) -> Result<EngineHandle> {
        let snapshot = store.load_story(id)?;
        let story = Story::from_snapshot(snapshot)?;
        Ok(Self::start(story, store, clock, options))
    }

    /// Start an engine over an already materialized story.
    ///
    /// Must be called from within a tokio runtime; the engine task is
    /// spawned onto it.
    pub fn start(
        story: Story,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        options: EngineOptions,
    ) -> EngineHandle {
        let (command_tx, command_rx) = mpsc::channel(options.command_capacity);
        let story_id = story.id().clone();

        let engine = Self {
            story,
            store,
            clock,
            hooks: EventHookCollection::new(),
            options,
            command_rx,
            command_tx: command_tx.clone(),
        };
        tokio::spawn(engine.run());

        EngineHandle {
            story: story_id,
            command_tx,
        }
    }

    /// Main event loop that serializes every command to this story
    async fn run(mut self) {
        let story_id = self.story.id().clone();
        async move {
            info!("Starting story engine");
            loop {
                let Some(command) = self.command_rx.recv().await else {
                    // All handles dropped
                    break;
                };
                match command {
                    EngineCommand::Shutdown { reply } => {
                        let _ = reply.send(());
                        break;
                    }
                    EngineCommand::DeleteStory { requestor, reply } => {
                        let result = self.delete_story(&requestor);
                        let deleted = result.is_ok();
                        let _ = reply.send(result);
                        if deleted {
                            break;
                        }
                    }
                    command => self.handle_command(command),
                }
            }
            info!("Story engine stopped");
        }
        .instrument(info_span!("story_engine", story = %story_id))
        .await
    }

    /// Handle a single command from a handle or a session driver
    fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Structural { command, reply } => {
                let _ = reply.send(self.apply_structural(command));
            }
            EngineCommand::Content { edit, reply } => {
                let _ = reply.send(self.apply_content(edit));
            }
            EngineCommand::OpenSession { card, user, reply } => {
                let _ = reply.send(self.open_session(card, user));
            }
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(self.story.snapshot());
            }
            EngineCommand::Header { reply } => {
                let _ = reply.send(self.story.header().clone());
            }
            EngineCommand::Subscribe { reply } => {
                let _ = reply.send(self.subscribe());
            }
            EngineCommand::DeleteStory { .. } | EngineCommand::Shutdown { .. } => {
                unreachable!("lifecycle commands are handled in run()")
            }
        }
    }

    /// Apply one structural command: mutate, persist, publish.
    ///
    /// The story itself owns the rejection rules (permission, position,
    /// cycles); a store failure after a successful mutation is fatal for
    /// the command and propagated to the submitter unmodified.
    fn apply_structural(&mut self, command: StructuralCommand) -> Result<StoryEvent> {
        let kind = command.kind();
        let (focus, upserts, removals) = match command {
            StructuralCommand::Insert {
                parent,
                index,
                content,
                requestor,
            } => {
                let id = self.story.insert_card(parent, index, content, &requestor)?;
                debug!("Inserted card {id} under {parent} at {index}");
                (parent, self.sibling_changes(parent, index)?, Vec::new())
            }
            StructuralCommand::Delete { card, requestor } => {
                // Capture the card's place first; delete_card owns the
                // rejection order and re-validates.
                let place = self.story.card(card).map(|c| (c.parent, c.index));
                let removed = self.story.delete_card(card, &requestor)?;
                debug!("Deleted card {card} and {} descendants", removed.len() - 1);
                let (parent, index) = match place {
                    Some((Some(parent), index)) => (parent, index),
                    _ => return Err(StoryError::NotFound { card }.into()),
                };
                (parent, self.sibling_changes(parent, index)?, removed)
            }
            StructuralCommand::Move {
                card,
                new_parent,
                new_index,
                requestor,
            } => {
                let place = self.story.card(card).map(|c| (c.parent, c.index));
                self.story
                    .move_card(card, new_parent, new_index, &requestor)?;
                debug!("Moved card {card} under {new_parent} at {new_index}");
                let (old_parent, old_index) = match place {
                    Some((Some(parent), index)) => (parent, index),
                    _ => return Err(StoryError::NotFound { card }.into()),
                };
                let mut upserts = self.sibling_changes(old_parent, old_index)?;
                upserts.extend(self.sibling_changes(new_parent, new_index)?);
                // The moved subtree was renumbered for depth along the way
                for id in self.story.subtree_ids(card)? {
                    upserts.push(self.card_copy(id)?);
                }
                (new_parent, upserts, Vec::new())
            }
        };

        self.story.touch(self.clock.now_rfc3339());
        let changes = ChangeSet {
            header: Some(self.story.header().clone()),
            upserts: dedup_by_id(upserts),
            removals,
        };
        self.store.apply_changes(self.story.id(), &changes)?;

        let event = StoryEvent::Structural {
            kind,
            subtree: self.story.subtree_shape(focus)?,
        };
        self.publish(&event);
        Ok(event)
    }

    /// Apply one flushed content edit.
    ///
    /// Refusals are ordinary outcomes, reported to the submitter and to
    /// subscribers; only store failures are errors. Checks run in a fixed
    /// order: permission, existence, staleness, then the delta's own
    /// length guard.
    fn apply_content(&mut self, edit: ContentEdit) -> Result<ContentOutcome> {
        let ContentEdit {
            card,
            delta,
            expected_version,
            requestor,
        } = edit;

        if let Some(reason) = self.refusal(card, expected_version, &requestor) {
            return self.reject_content(card, reason);
        }

        let version = match self.story.apply_edit(card, &delta) {
            Ok(version) => version,
            Err(StoryError::Delta(DeltaError::LengthMismatch { expected, found })) => {
                return self.reject_content(card, RejectReason::LengthMismatch { expected, found });
            }
            Err(other) => return Err(other.into()),
        };

        self.story.touch(self.clock.now_rfc3339());
        let changes = ChangeSet {
            header: Some(self.story.header().clone()),
            upserts: vec![self.card_copy(card)?],
            removals: Vec::new(),
        };
        self.store.apply_changes(self.story.id(), &changes)?;

        let event = StoryEvent::ContentApplied { card, version };
        self.publish(&event);
        Ok(ContentOutcome::Applied { version })
    }

    /// The first reason to refuse an edit, if any.
    fn refusal(
        &self,
        card: CardId,
        expected_version: u64,
        requestor: &UserId,
    ) -> Option<RejectReason> {
        if !evaluate(Tier::Editor, requestor, self.story.header()) {
            return Some(RejectReason::PermissionDenied {
                user: requestor.clone(),
            });
        }
        let Some(target) = self.story.card(card) else {
            return Some(RejectReason::NotFound { card });
        };
        if target.version != expected_version {
            return Some(RejectReason::StaleVersion {
                expected: expected_version,
                found: target.version,
            });
        }
        None
    }

    /// Report a refused edit to the submitter and to subscribers.
    fn reject_content(&mut self, card: CardId, reason: RejectReason) -> Result<ContentOutcome> {
        debug!("Content edit for card {card} refused: {reason}");
        let event = StoryEvent::ContentRejected {
            card,
            reason: reason.clone(),
        };
        self.publish(&event);
        Ok(ContentOutcome::Rejected { reason })
    }

    /// Open an edit session on one card for one user.
    ///
    /// Editing needs at least Editor tier. The session driver gets its own
    /// task and a handle back to this engine, so its flushes line up with
    /// every other mutation.
    fn open_session(
        &mut self,
        card: CardId,
        user: UserId,
    ) -> Result<(SessionHandle, mpsc::Receiver<SessionSignal>)> {
        if !evaluate(Tier::Editor, &user, self.story.header()) {
            return Err(StoryError::PermissionDenied {
                user,
                required: Tier::Editor,
            }
            .into());
        }
        let target = self
            .story
            .card(card)
            .ok_or(StoryError::NotFound { card })?;
        let session = EditSession::new(card, user, target.content.char_len(), target.version);

        let engine = EngineHandle {
            story: self.story.id().clone(),
            command_tx: self.command_tx.clone(),
        };
        Ok(driver::spawn(
            session,
            engine,
            self.options.flush_interval,
            self.options.session_capacity,
            self.options.signal_capacity,
        ))
    }

    /// Attach a new subscriber and hand back its event receiver.
    fn subscribe(&mut self) -> mpsc::Receiver<StoryEvent> {
        let (event_tx, event_rx) = mpsc::channel(self.options.subscriber_capacity);
        self.hooks.add_hook(Arc::new(ChannelHook::new(event_tx)));
        event_rx
    }

    /// Delete the story from the store. Owner only; on success the engine
    /// stops and every outstanding handle goes dead.
    fn delete_story(&mut self, requestor: &UserId) -> Result<()> {
        if !evaluate(Tier::Owner, requestor, self.story.header()) {
            return Err(StoryError::PermissionDenied {
                user: requestor.clone(),
                required: Tier::Owner,
            }
            .into());
        }
        self.store.delete_story(self.story.id())?;
        info!("Story deleted");
        Ok(())
    }

    /// Fan an event out to every subscriber. Hook failures are logged by
    /// the collection and cannot veto an already committed change.
    fn publish(&self, event: &StoryEvent) {
        let _ = self.hooks.execute_hooks(self.story.id(), event);
    }

    /// The stored copies that change when `parent`'s child list is edited
    /// at `slot`: the parent itself, the sibling whose below link moved,
    /// and every renumbered sibling after it.
    fn sibling_changes(&self, parent: CardId, slot: usize) -> Result<Vec<Card>> {
        let parent_card = self.card_copy(parent)?;
        let mut cards = Vec::with_capacity(2 + parent_card.children.len().saturating_sub(slot));
        for &child in parent_card.children.iter().skip(slot.saturating_sub(1)) {
            cards.push(self.card_copy(child)?);
        }
        cards.push(parent_card);
        Ok(cards)
    }

    fn card_copy(&self, id: CardId) -> Result<Card> {
        Ok(self
            .story
            .card(id)
            .ok_or(StoryError::NotFound { card: id })?
            .clone())
    }
}

/// Collapse duplicate upserts, keeping one copy per card id.
fn dedup_by_id(cards: Vec<Card>) -> Vec<Card> {
    let unique: BTreeMap<CardId, Card> = cards.into_iter().map(|c| (c.id, c)).collect();
    unique.into_values().collect()
}

/// Cloneable front end of a running story engine.
///
/// Every method is a round trip through the engine's command channel, so
/// results reflect the story after all commands submitted before them.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    story: StoryId,
    command_tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// The story this handle drives.
    pub fn story_id(&self) -> &StoryId {
        &self.story
    }

    /// Submit one structural command, returning the committed event.
    pub async fn submit(&self, command: StructuralCommand) -> Result<StoryEvent> {
        let (tx, rx) = oneshot::channel();
        self.send(
            EngineCommand::Structural { command, reply: tx },
            "structural",
        )
        .await?;
        rx.await.map_err(|_| SyncError::ReplyDropped {
            operation: "structural",
        })?
    }

    /// Submit one flushed content edit, returning the engine's outcome.
    pub async fn content_edit(&self, edit: ContentEdit) -> Result<ContentOutcome> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::Content { edit, reply: tx }, "content")
            .await?;
        rx.await.map_err(|_| SyncError::ReplyDropped {
            operation: "content",
        })?
    }

    /// Open an edit session on `card` for `user`.
    ///
    /// Returns the session handle and the signal channel carrying
    /// conflicts and the close notice.
    pub async fn open_session(
        &self,
        card: CardId,
        user: UserId,
    ) -> Result<(SessionHandle, mpsc::Receiver<SessionSignal>)> {
        let (tx, rx) = oneshot::channel();
        self.send(
            EngineCommand::OpenSession {
                card,
                user,
                reply: tx,
            },
            "open_session",
        )
        .await?;
        rx.await.map_err(|_| SyncError::ReplyDropped {
            operation: "open_session",
        })?
    }

    /// A full snapshot of the story as of every command already handled.
    pub async fn snapshot(&self) -> Result<StorySnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::Snapshot { reply: tx }, "snapshot")
            .await?;
        let snapshot = rx.await.map_err(|_| SyncError::ReplyDropped {
            operation: "snapshot",
        })?;
        Ok(snapshot)
    }

    /// The story header as of every command already handled.
    pub async fn header(&self) -> Result<StoryHeader> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::Header { reply: tx }, "header")
            .await?;
        let header = rx.await.map_err(|_| SyncError::ReplyDropped {
            operation: "header",
        })?;
        Ok(header)
    }

    /// Subscribe to events committed after this call returns.
    pub async fn subscribe(&self) -> Result<mpsc::Receiver<StoryEvent>> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::Subscribe { reply: tx }, "subscribe")
            .await?;
        let events = rx.await.map_err(|_| SyncError::ReplyDropped {
            operation: "subscribe",
        })?;
        Ok(events)
    }

    /// Delete the story. Owner only; stops the engine on success.
    pub async fn delete_story(&self, requestor: UserId) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(
            EngineCommand::DeleteStory {
                requestor,
                reply: tx,
            },
            "delete_story",
        )
        .await?;
        rx.await.map_err(|_| SyncError::ReplyDropped {
            operation: "delete_story",
        })?
    }

    /// Stop the engine once the commands already queued have run.
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::Shutdown { reply: tx }, "shutdown")
            .await?;
        rx.await.map_err(|_| SyncError::ReplyDropped {
            operation: "shutdown",
        })?;
        Ok(())
    }

    async fn send(&self, command: EngineCommand, operation: &'static str) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SyncError::CommandSend { operation })?;
        Ok(())
    }
}
