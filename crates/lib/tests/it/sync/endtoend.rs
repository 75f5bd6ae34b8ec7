//! Whole-system walks: several users reshaping one story through a live
//! engine, then the story surviving a save, a reload and a fresh engine.

use std::sync::Arc;

use tempfile::TempDir;

use fabler::{
    EngineOptions, FixedClock, InMemory, SessionSignal, Store, StoryEngine, StoryId,
    StructuralCommand,
};

use crate::helpers::*;

#[tokio::test]
async fn test_collaboration_survives_save_and_reload() {
    let (engine, store) = spawn_engine().await;
    let root = root_of(&engine).await;

    // The owner lays out three passages.
    let opening = engine_insert(&engine, root, 0, "The travelers reach a fork.", &owner()).await;
    let detour = engine_insert(&engine, root, 1, "A detour through the marsh.", &owner()).await;
    let ending = engine_insert(&engine, root, 2, "They make camp.", &owner()).await;

    // An editor drafts onto the opening through a session.
    let (session, mut signals) = engine.open_session(opening, editor()).await.unwrap();
    let mut len = "The travelers reach a fork.".chars().count();
    session.record_change(append(len, " They argue.")).await.unwrap();
    len += " They argue.".chars().count();
    session.record_change(append(len, " Loudly.")).await.unwrap();
    session.flush().await.unwrap();

    // An author grows the detour branch.
    engine_insert(&engine, detour, 0, "The marsh path narrows.", &author()).await;

    // A viewer cannot touch the tree.
    let err = engine
        .submit(StructuralCommand::Insert {
            parent: root,
            index: 0,
            content: plain("graffiti"),
            requestor: viewer(),
        })
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());

    // The owner restructures: the detour becomes part of the opening,
    // the old ending goes.
    engine
        .submit(StructuralCommand::Move {
            card: detour,
            new_parent: opening,
            new_index: 0,
            requestor: owner(),
        })
        .await
        .unwrap();
    engine
        .submit(StructuralCommand::Delete {
            card: ending,
            requestor: owner(),
        })
        .await
        .unwrap();

    session.close().await.unwrap();
    assert_eq!(
        next_signal(&mut signals).await,
        SessionSignal::Closed { card: opening }
    );

    let before = engine.snapshot().await.unwrap();
    assert_eq!(
        before.card(opening).unwrap().content.plain_text(),
        "The travelers reach a fork. They argue. Loudly."
    );
    assert_eq!(before.card(opening).unwrap().version, 1);
    assert_eq!(before.card(detour).unwrap().parent, Some(opening));
    assert!(before.card(ending).is_none());

    engine.shutdown().await.unwrap();

    // Save, reload from disk, and drive the same story with a new engine.
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fabler.json");
    store.save_to_file(&path).unwrap();

    let reloaded = Arc::new(InMemory::load_from_file(&path).unwrap());
    let revived = StoryEngine::load(
        reloaded.clone(),
        &story_id(),
        Arc::new(FixedClock::default()),
        EngineOptions::default(),
    )
    .unwrap();

    assert_eq!(revived.snapshot().await.unwrap(), before);

    // The revived engine accepts new work.
    engine_insert(&revived, opening, 1, "A crow watches.", &author()).await;
    assert_eq!(revived.snapshot().await.unwrap().cards.len(), before.cards.len() + 1);

    revived.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_create_starts_an_owner_only_story() {
    let store = Arc::new(InMemory::new());
    let id = StoryId::new("solo");
    let engine = StoryEngine::create(
        store.clone(),
        id.clone(),
        "Solo",
        "",
        owner(),
        Arc::new(FixedClock::default()),
        EngineOptions::default(),
    )
    .unwrap();

    assert_eq!(engine.story_id(), &id);
    let header = engine.header().await.unwrap();
    assert_eq!(header.owner, owner());
    assert!(header.authors.is_empty());
    assert!(header.editors.is_empty());
    assert!(header.viewers.is_empty());
    assert_eq!(header.card_counter, 1);

    // The story is persisted before the engine answers anything.
    assert!(store.contains(&id).unwrap());

    let root = root_of(&engine).await;
    engine_insert(&engine, root, 0, "Alone at last.", &owner()).await;
    engine.shutdown().await.unwrap();

    let revived = StoryEngine::load(
        store,
        &id,
        Arc::new(FixedClock::default()),
        EngineOptions::default(),
    )
    .unwrap();
    assert_eq!(revived.snapshot().await.unwrap().cards.len(), 2);
    revived.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_load_of_an_unknown_story_is_not_found() {
    let err = StoryEngine::load(
        Arc::new(InMemory::new()),
        &story_id(),
        Arc::new(FixedClock::default()),
        EngineOptions::default(),
    )
    .unwrap_err();
    assert!(err.is_not_found());
}
