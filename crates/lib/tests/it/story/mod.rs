//! Story aggregate tests: structure, content and membership.

mod membership;
