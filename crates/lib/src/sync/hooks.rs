//! Event hooks for observing committed story changes.
//!
//! This module provides the infrastructure for hooking into the engine's
//! commit path, so interested parties are notified after a command has been
//! applied to the tree and persisted to the store.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::Result;
use crate::story::StoryId;

use super::protocol::StoryEvent;

/// Trait for implementing event hooks that are called after a command commits.
///
/// Hooks run on the engine task, after the mutation has been applied and
/// persisted but before the submitter gets its reply. A hook failure is
/// logged; it does not roll back the commit.
pub trait EventHook: Send + Sync {
    /// Called once per committed change with the resulting event.
    fn on_event(&self, story: &StoryId, event: &StoryEvent) -> Result<()>;
}

/// A collection of event hooks that can be executed together.
///
/// This allows multiple hooks to be registered and executed in sequence
/// on the commit path.
#[derive(Default)]
pub struct EventHookCollection {
    hooks: Vec<Arc<dyn EventHook>>,
}

impl EventHookCollection {
    /// Create a new empty hook collection.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Add an event hook to the collection.
    pub fn add_hook(&mut self, hook: Arc<dyn EventHook>) {
        self.hooks.push(hook);
    }

    /// Execute all hooks in the collection with the given event.
    ///
    /// Hooks are executed in the order they were added. If a hook fails,
    /// execution continues with the remaining hooks and the first error is
    /// returned.
    pub fn execute_hooks(&self, story: &StoryId, event: &StoryEvent) -> Result<()> {
        let mut first_error = None;

        for hook in &self.hooks {
            if let Err(e) = hook.on_event(story, event) {
                tracing::error!("Event hook failed: {e}");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Check if there are any hooks registered.
    pub fn has_hooks(&self) -> bool {
        !self.hooks.is_empty()
    }

    /// Get the number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// Channel-backed hook that forwards events to one subscriber.
///
/// Uses `try_send` so a slow subscriber cannot stall the engine: when the
/// subscriber's buffer is full the event is dropped for that subscriber
/// and a warning is logged.
pub struct ChannelHook {
    /// Event channel to the subscriber
    event_tx: mpsc::Sender<StoryEvent>,
}

impl ChannelHook {
    /// Create a new channel-backed hook.
    pub fn new(event_tx: mpsc::Sender<StoryEvent>) -> Self {
        Self { event_tx }
    }
}

impl EventHook for ChannelHook {
    fn on_event(&self, story: &StoryId, event: &StoryEvent) -> Result<()> {
        match self.event_tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Log but don't fail the commit
                tracing::warn!("Subscriber of story {story} is lagging, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::trace!("Subscriber of story {story} is gone");
            }
        }
        Ok(())
    }
}
