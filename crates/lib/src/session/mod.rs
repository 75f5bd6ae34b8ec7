//! Per-card edit sessions.
//!
//! An [`EditSession`] soaks up one user's keystroke deltas and turns them
//! into occasional whole-document content edits. Recorded changes compose
//! locally; on a flush the accumulated delta ships to the engine as a
//! single [`ContentEdit`] built against the card version the session last
//! saw. At most one flush is in flight at a time, and closing the session
//! flushes whatever remains.
//!
//! The state machine in this module is pure and synchronous. [`driver`]
//! wraps it in a tokio task that owns the flush timer and the command
//! channel; session owners hold a [`SessionHandle`] and listen for
//! [`SessionSignal`]s.

pub mod errors;

pub(crate) mod driver;

pub use driver::SessionHandle;
pub use errors::SessionError;

use crate::card::{CardId, UserId};
use crate::delta::{Delta, DeltaError};
use crate::sync::protocol::{ContentEdit, ContentOutcome, RejectReason};

/// Lifecycle of an edit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No changes since the last flush.
    Idle,
    /// Changes accumulated, waiting for the next flush.
    Editing,
    /// A flush has been taken and not yet resolved.
    FlushPending,
    /// Closed; nothing further is accepted.
    Closed,
}

/// Out-of-band notices from a running session to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal {
    /// A flushed edit was refused and the accumulated delta discarded.
    /// The editing surface should reload the card before continuing.
    Conflict { card: CardId, reason: RejectReason },
    /// The session stopped accepting changes, either because it was
    /// closed or because its engine went away.
    Closed { card: CardId },
}

/// Accumulates one user's edits to one card between flushes.
///
/// The tracked length starts at the card content's length at open time and
/// follows every recorded delta, so a delta built out of step is caught
/// here instead of round-tripping through the engine.
#[derive(Debug)]
pub struct EditSession {
    card: CardId,
    user: UserId,
    /// Card version the next flush claims as its base.
    base_version: u64,
    /// Everything recorded since the last flush, composed into one delta
    /// over the session's view of the content.
    pending: Delta,
    state: SessionState,
}

impl EditSession {
    /// Open a session over a card whose content currently has
    /// `content_len` characters at `version`.
    pub fn new(card: CardId, user: UserId, content_len: usize, version: u64) -> Self {
        Self {
            card,
            user,
            base_version: version,
            pending: Delta::identity(content_len),
            state: SessionState::Idle,
        }
    }

    pub fn card(&self) -> CardId {
        self.card
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Version the next flush will be built against.
    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    /// Length of the content as this session currently sees it.
    pub fn tracked_len(&self) -> usize {
        self.pending.target_len()
    }

    /// Whether any changes await the next flush.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_identity()
    }

    /// Record one delta over the session's current view.
    ///
    /// The delta must span the tracked length. Recording keeps working
    /// while a flush is in flight; those changes ride the next flush.
    pub fn record_change(&mut self, delta: &Delta) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        self.pending = match self.pending.compose(delta) {
            Ok(composed) => composed,
            Err(DeltaError::LengthMismatch { expected, found }) => {
                return Err(SessionError::InvalidDelta { expected, found });
            }
        };
        if self.state != SessionState::FlushPending {
            // Changes that cancel out leave nothing to flush.
            self.state = if self.pending.is_identity() {
                SessionState::Idle
            } else {
                SessionState::Editing
            };
        }
        Ok(())
    }

    /// Take the accumulated changes as one content edit, if any.
    ///
    /// Returns `None` when there is nothing to flush or a flush is already
    /// in flight, so ticking while waiting is a no-op. A fresh accumulator
    /// is seeded over the post-edit view, and recording continues
    /// uninterrupted while the edit is away.
    pub fn take_flush(&mut self) -> Option<ContentEdit> {
        if self.state != SessionState::Editing {
            return None;
        }
        let next = Delta::identity(self.pending.target_len());
        let delta = std::mem::replace(&mut self.pending, next);
        self.state = SessionState::FlushPending;
        Some(ContentEdit {
            card: self.card,
            delta,
            expected_version: self.base_version,
            requestor: self.user.clone(),
        })
    }

    /// Feed back the engine's answer to the in-flight flush.
    ///
    /// Acceptance advances the session to the applied version. Rejection
    /// discards everything accumulated since the flush as well: it was
    /// built over a view the engine refused, so resubmitting it blindly
    /// would corrupt the card. The returned signal, if any, is for the
    /// session's owner.
    pub fn resolve(&mut self, outcome: &ContentOutcome) -> Option<SessionSignal> {
        match outcome {
            ContentOutcome::Applied { version } => {
                self.base_version = *version;
                if self.state == SessionState::FlushPending {
                    self.state = if self.pending.is_identity() {
                        SessionState::Idle
                    } else {
                        SessionState::Editing
                    };
                }
                None
            }
            ContentOutcome::Rejected { reason } => {
                self.pending = Delta::identity(self.pending.target_len());
                if self.state == SessionState::FlushPending {
                    self.state = SessionState::Idle;
                }
                Some(SessionSignal::Conflict {
                    card: self.card,
                    reason: reason.clone(),
                })
            }
        }
    }

    /// Close the session, surrendering any final flush.
    ///
    /// The caller is expected to submit the returned edit and resolve it
    /// as usual. Closing while a flush is in flight abandons whatever was
    /// recorded after that flush; the in-flight edit itself still resolves
    /// through [`EditSession::resolve`].
    pub fn close(&mut self) -> Option<ContentEdit> {
        let flush = if self.state == SessionState::Editing {
            let delta = std::mem::replace(&mut self.pending, Delta::new());
            Some(ContentEdit {
                card: self.card,
                delta,
                expected_version: self.base_version,
                requestor: self.user.clone(),
            })
        } else {
            None
        };
        self.state = SessionState::Closed;
        flush
    }
}
