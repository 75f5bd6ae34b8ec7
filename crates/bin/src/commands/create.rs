//! Create command - creates a new story in the store.

use std::sync::Arc;

use fabler::{EngineOptions, StoryEngine, StoryId, SystemClock, UserId};

use crate::cli::CreateArgs;
use crate::output::OutputFormat;

/// Run the create command
pub async fn run(args: &CreateArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(&args.store.store)?;

    let id = match &args.id {
        Some(id) => StoryId::new(id.clone()),
        None => StoryId::generate(),
    };
    let owner = UserId::new(args.owner.clone());

    let engine = StoryEngine::create(
        store.clone(),
        id.clone(),
        args.title.clone(),
        args.description.clone(),
        owner.clone(),
        Arc::new(SystemClock),
        EngineOptions::default(),
    )?;
    let header = engine.header().await?;
    engine.shutdown().await?;

    store.save_to_file(&args.store.store)?;

    match format {
        OutputFormat::Human => {
            println!("Created story {id}");
            println!("  Title: {}", header.title);
            println!("  Owner: {owner}");
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "id": id.to_string(),
                "title": header.title,
                "owner": owner.to_string(),
                "root": header.root.to_string(),
            });
            println!("{}", serde_json::to_string(&value)?);
        }
    }

    Ok(())
}
