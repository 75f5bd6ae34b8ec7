//! Command implementations.

pub mod create;
pub mod demo;
pub mod show;

use std::path::Path;
use std::sync::Arc;

use fabler::InMemory;

/// Open the JSON store file, starting fresh when it does not exist yet.
pub(crate) fn open_store(path: &Path) -> Result<Arc<InMemory>, Box<dyn std::error::Error>> {
    let store = InMemory::load_from_file(path)?;
    tracing::debug!("Opened store at {}", path.display());
    Ok(Arc::new(store))
}
