//! Show command - story outlines and store listings.

use fabler::{Store, StoryId, StorySnapshot};

use crate::cli::ShowArgs;
use crate::output::{OutputFormat, excerpt, print_outline, print_table};

/// Run the show command
pub async fn run(args: &ShowArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(&args.store.store)?;

    match &args.story {
        Some(id) => {
            let snapshot = store.load_story(&StoryId::new(id.clone()))?;
            show_story(&snapshot, format)
        }
        None => list_stories(store.as_ref(), format),
    }
}

fn show_story(
    snapshot: &StorySnapshot,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Human => {
            let header = &snapshot.header;
            println!("{} ({})", header.title, header.id);
            if !header.description.is_empty() {
                println!("{}", header.description);
            }
            println!(
                "owner {}  authors {}  editors {}  viewers {}  updated {}",
                header.owner,
                header.authors.len(),
                header.editors.len(),
                header.viewers.len(),
                header.updated_at,
            );
            println!();
            print_outline(snapshot);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(snapshot)?);
        }
    }
    Ok(())
}

fn list_stories(
    store: &fabler::InMemory,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let ids = store.list_stories()?;

    match format {
        OutputFormat::Human => {
            if ids.is_empty() {
                println!("No stories found.");
                return Ok(());
            }

            let mut rows = Vec::with_capacity(ids.len());
            for id in &ids {
                let snapshot = store.load_story(id)?;
                rows.push(vec![
                    id.to_string(),
                    excerpt(&snapshot.header.title, 32),
                    snapshot.header.owner.to_string(),
                    snapshot.cards.len().to_string(),
                    snapshot.header.updated_at.clone(),
                ]);
            }
            print_table(&["ID", "TITLE", "OWNER", "CARDS", "UPDATED"], &rows);
        }
        OutputFormat::Json => {
            let mut entries = Vec::with_capacity(ids.len());
            for id in &ids {
                let snapshot = store.load_story(id)?;
                entries.push(serde_json::json!({
                    "id": id.to_string(),
                    "title": snapshot.header.title,
                    "owner": snapshot.header.owner.to_string(),
                    "cards": snapshot.cards.len(),
                    "updated_at": snapshot.header.updated_at,
                }));
            }
            println!("{}", serde_json::to_string(&entries)?);
        }
    }

    Ok(())
}
