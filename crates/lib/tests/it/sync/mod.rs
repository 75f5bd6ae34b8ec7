//! Engine and protocol tests: command handling, event delivery, persistence.

mod endtoend;
mod engine;
