//! Constants used throughout the Fabler library.
//!
//! Central definitions for engine tuning defaults so the binary, the tests
//! and the library agree on one set of numbers.

use std::time::Duration;

/// Default interval between automatic edit-session flushes.
///
/// Frequent enough that collaborators see text appear while a user types,
/// rare enough not to issue one engine command per keystroke.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(500);

/// Capacity of the per-story engine command channel.
pub const ENGINE_CHANNEL_CAPACITY: usize = 100;

/// Capacity of a single edit session's command channel.
pub const SESSION_CHANNEL_CAPACITY: usize = 32;

/// Capacity of the signal channel handed to a session's owner.
pub const SESSION_SIGNAL_CAPACITY: usize = 16;

/// Capacity of the event channel created by `EngineHandle::subscribe`.
pub const SUBSCRIBER_CHANNEL_CAPACITY: usize = 64;
