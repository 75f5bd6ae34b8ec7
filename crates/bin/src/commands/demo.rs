//! Demo command - a scripted multi-user editing run against a throwaway
//! in-memory story, printing every event the engine publishes.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use fabler::{
    CardId, Content, ContentEdit, ContentOutcome, Delta, EngineHandle, EngineOptions, InMemory,
    SessionSignal, Store, Story, StoryEngine, StoryEvent, StoryId, StructuralCommand, SystemClock,
    Tier, UserId,
};

use crate::cli::DemoArgs;
use crate::output::{OutputFormat, print_outline};

/// Run the demo command
pub async fn run(args: &DemoArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let flush_interval = Duration::from_millis(args.flush_interval_ms);
    let store = Arc::new(InMemory::new());
    let clock = Arc::new(SystemClock);

    let ana = UserId::new("ana");
    let ben = UserId::new("ben");
    let eve = UserId::new("eve");

    // Seed a story with one editor and one viewer, then hand it to an engine.
    let mut story = Story::create(
        StoryId::new("demo"),
        "The Fork in the Path",
        "Two travelers, one map, no agreement.",
        ana.clone(),
        clock.as_ref(),
    );
    story.grant(ben.clone(), Tier::Editor, &ana)?;
    story.grant(eve.clone(), Tier::Viewer, &ana)?;
    let root = story.root();
    store.create_story(&story.snapshot())?;

    let options = EngineOptions {
        flush_interval,
        ..EngineOptions::default()
    };
    let engine = StoryEngine::start(story, store.clone(), clock, options);

    // Print every event as the engine publishes it.
    let mut events = engine.subscribe().await?;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event, format);
        }
    });

    say(format, "Demo story: ana owns, ben edits, eve views.");
    say(format, "-- ana shapes the tree");
    let opening_text = "Opening: the travelers reach the fork.";
    let opening = insert(&engine, root, 0, opening_text, &ana).await?;
    let detour = insert(&engine, root, 1, "Detour: the map is wrong.", &ana).await?;
    let ending = insert(&engine, root, 2, "Ending: they take both paths.", &ana).await?;

    say(format, "-- ben types into the opening card");
    let (session, mut signals) = engine.open_session(opening, ben.clone()).await?;
    let mut tracked = opening_text.chars().count();
    for text in [" They argue.", " Loudly."] {
        let change = Delta::new().retain(tracked).insert(text);
        session.record_change(change).await?;
        tracked += text.chars().count();
    }
    // Let the session's flush timer deliver the composed edit.
    sleep(flush_interval * 3).await;

    say(format, "-- ana rewrites the same card directly");
    let snapshot = engine.snapshot().await?;
    let card = snapshot.card(opening).ok_or("opening card vanished")?;
    let outcome = engine
        .content_edit(ContentEdit {
            card: opening,
            delta: Delta::new()
                .retain(card.content.char_len())
                .insert(" A crow watches."),
            expected_version: card.version,
            requestor: ana.clone(),
        })
        .await?;
    if let ContentOutcome::Applied { version } = outcome {
        say(format, &format!("  applied, card is now v{version}"));
    }

    say(format, "-- ben keeps typing against his stale copy");
    let change = Delta::new().retain(tracked).insert(" The crow leaves.");
    session.record_change(change).await?;
    session.flush().await?;
    if let Ok(Some(SessionSignal::Conflict { reason, .. })) =
        timeout(Duration::from_secs(1), signals.recv()).await
    {
        say(format, &format!("  session conflict: {reason}"));
    }

    say(format, "-- eve, a viewer, tries to insert a card");
    let refused = engine
        .submit(StructuralCommand::Insert {
            parent: root,
            index: 3,
            content: Content::from_plain("eve's note"),
            requestor: eve.clone(),
        })
        .await;
    if let Err(err) = refused {
        say(format, &format!("  refused: {err}"));
    }

    say(format, "-- ana tucks the detour under the opening");
    engine
        .submit(StructuralCommand::Move {
            card: detour,
            new_parent: opening,
            new_index: 0,
            requestor: ana.clone(),
        })
        .await?;

    say(format, "-- and cuts the ending");
    engine
        .submit(StructuralCommand::Delete {
            card: ending,
            requestor: ana.clone(),
        })
        .await?;

    session.close().await?;
    if let Ok(Some(SessionSignal::Closed { .. })) =
        timeout(Duration::from_secs(1), signals.recv()).await
    {
        say(format, "-- ben's session closed");
    }

    engine.shutdown().await?;
    let _ = printer.await;

    let snapshot = store.load_story(&StoryId::new("demo"))?;
    match format {
        OutputFormat::Human => {
            println!();
            println!("Final outline:");
            print_outline(&snapshot);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(&snapshot)?);
        }
    }

    Ok(())
}

/// Submit an insert and return the id of the card it created.
async fn insert(
    engine: &EngineHandle,
    parent: CardId,
    index: usize,
    text: &str,
    user: &UserId,
) -> Result<CardId, Box<dyn std::error::Error>> {
    let event = engine
        .submit(StructuralCommand::Insert {
            parent,
            index,
            content: Content::from_plain(text),
            requestor: user.clone(),
        })
        .await?;
    let StoryEvent::Structural { subtree, .. } = event else {
        return Err("insert answered with a non-structural event".into());
    };
    subtree
        .children
        .get(index)
        .map(|c| c.card.id)
        .ok_or_else(|| "inserted card missing from the reported shape".into())
}

fn say(format: OutputFormat, line: &str) {
    if format == OutputFormat::Human {
        println!("{line}");
    }
}

fn print_event(event: &StoryEvent, format: OutputFormat) {
    match format {
        OutputFormat::Human => match event {
            StoryEvent::Structural { kind, subtree } => {
                println!(
                    "  event: {kind} under {}, shape holds {} cards",
                    subtree.card.id,
                    subtree.card_count(),
                );
            }
            StoryEvent::ContentApplied { card, version } => {
                println!("  event: content applied on {card}, now v{version}");
            }
            StoryEvent::ContentRejected { card, reason } => {
                println!("  event: content rejected on {card}: {reason}");
            }
        },
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string(event) {
                println!("{json}");
            }
        }
    }
}
