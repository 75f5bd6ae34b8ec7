use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use fabler::{
    CardId, Content, Delta, EngineHandle, EngineOptions, FixedClock, InMemory, SessionSignal,
    Store, Story, StoryEngine, StoryEvent, StoryId, StructuralCommand, Tier, UserId,
};

/// Story id every engine fixture runs under.
pub const STORY: &str = "winding-tale";

// ==========================
// CORE TEST FACTORIES
// ==========================
// One user per tier, reused across the whole suite so permission results
// read the same in every test.

pub fn owner() -> UserId {
    "ana".into()
}

pub fn author() -> UserId {
    "abe".into()
}

pub fn editor() -> UserId {
    "ed".into()
}

pub fn viewer() -> UserId {
    "vera".into()
}

/// A user the story has never heard of.
pub fn outsider() -> UserId {
    "zoe".into()
}

pub fn plain(text: &str) -> Content {
    Content::from_plain(text)
}

/// Whole-document delta appending `text` to content currently `len` chars long.
pub fn append(len: usize, text: &str) -> Delta {
    Delta::new().retain(len).insert(text)
}

/// A story owned by `ana` with one member granted at each other tier.
pub fn seeded_story() -> Story {
    let mut story = Story::create(
        StoryId::new(STORY),
        "A Winding Tale",
        "Integration fixture",
        owner(),
        &FixedClock::default(),
    );
    story
        .grant(author(), Tier::Author, &owner())
        .expect("granting author should succeed");
    story
        .grant(editor(), Tier::Editor, &owner())
        .expect("granting editor should succeed");
    story
        .grant(viewer(), Tier::Viewer, &owner())
        .expect("granting viewer should succeed");
    story
}

/// Start an engine over a seeded story, returning its store for inspection.
pub async fn spawn_engine() -> (EngineHandle, Arc<InMemory>) {
    spawn_engine_with_options(EngineOptions::default()).await
}

pub async fn spawn_engine_with_options(options: EngineOptions) -> (EngineHandle, Arc<InMemory>) {
    let store = Arc::new(InMemory::new());
    let story = seeded_story();
    store
        .create_story(&story.snapshot())
        .expect("seeding the store should succeed");
    let engine = StoryEngine::start(story, store.clone(), Arc::new(FixedClock::default()), options);
    (engine, store)
}

/// The story id the engine fixtures persist under.
pub fn story_id() -> StoryId {
    StoryId::new(STORY)
}

/// The root card of the engine's story.
pub async fn root_of(engine: &EngineHandle) -> CardId {
    engine.header().await.expect("header read failed").root
}

/// Insert a card through the engine and return the id it was given.
pub async fn engine_insert(
    engine: &EngineHandle,
    parent: CardId,
    index: usize,
    text: &str,
    user: &UserId,
) -> CardId {
    let event = engine
        .submit(StructuralCommand::Insert {
            parent,
            index,
            content: Content::from_plain(text),
            requestor: user.clone(),
        })
        .await
        .expect("insert should be accepted");
    match event {
        StoryEvent::Structural { subtree, .. } => subtree.children[index].card.id,
        other => panic!("insert produced unexpected event {other:?}"),
    }
}

// ==========================
// CHANNEL ASSERTIONS
// ==========================

/// Receive the next event, failing the test after a second of silence.
pub async fn next_event(events: &mut mpsc::Receiver<StoryEvent>) -> StoryEvent {
    timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Receive the next session signal, failing the test after a second.
pub async fn next_signal(signals: &mut mpsc::Receiver<SessionSignal>) -> SessionSignal {
    timeout(Duration::from_secs(1), signals.recv())
        .await
        .expect("timed out waiting for a signal")
        .expect("signal channel closed")
}

/// Assert that no event arrives within a short grace period.
pub async fn assert_no_event(events: &mut mpsc::Receiver<StoryEvent>) {
    let waited = timeout(Duration::from_millis(100), events.recv()).await;
    assert!(waited.is_err(), "expected silence, got {waited:?}");
}
