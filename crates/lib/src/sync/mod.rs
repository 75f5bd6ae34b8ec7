//! Story synchronization: one single-writer engine per live story.
//!
//! This module holds the wire types clients speak ([`protocol`]), the
//! actor that serializes every mutation to one story ([`engine`]), and the
//! hook layer that fans committed changes out to subscribers ([`hooks`]).
//!
//! The ordering contract is deliberately simple. Commands are handled one
//! at a time in arrival order; each is applied to the in-memory tree,
//! persisted to the store, and only then published as an event. Observers
//! can therefore reconcile events against snapshots without ever seeing a
//! half-applied change, and per-card content events arrive in version
//! order.

pub mod engine;
pub mod errors;
pub mod hooks;
pub mod protocol;

pub use engine::{EngineHandle, EngineOptions, StoryEngine};
pub use errors::SyncError;
pub use hooks::{ChannelHook, EventHook, EventHookCollection};
pub use protocol::{
    ContentEdit, ContentOutcome, RejectReason, StoryEvent, StructuralCommand, StructuralKind,
};
