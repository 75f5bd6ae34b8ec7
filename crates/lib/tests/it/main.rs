/*! Integration tests for Fabler.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - delta: Tests for text deltas, composition and application
 * - access: Tests for the permission tiers and cascading evaluation
 * - story: Tests for the Story aggregate and its tree operations
 * - session: Tests for edit sessions driven over a live engine
 * - sync: Tests for the story engine, its protocol and event delivery
 * - store: Tests for the persistence boundary and the InMemory store
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("fabler=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod delta;
mod helpers;
mod session;
mod story;
mod sync;
