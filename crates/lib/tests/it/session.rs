//! Edit sessions driven against a live engine.

use std::time::Duration;

use fabler::{ContentEdit, EngineOptions, RejectReason, SessionSignal, StoryEvent};

use crate::helpers::*;

#[tokio::test]
async fn test_recorded_changes_flush_as_one_composed_edit() {
    let (engine, _store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let card = engine_insert(&engine, root, 0, "draft", &owner()).await;
    let mut events = engine.subscribe().await.unwrap();

    let (session, _signals) = engine.open_session(card, editor()).await.unwrap();
    assert_eq!(session.card(), card);
    session.record_change(append(5, " one")).await.unwrap();
    session.record_change(append(9, " two")).await.unwrap();
    session.flush().await.unwrap();

    // Two keystroke batches, one composed edit, one version bump.
    let event = next_event(&mut events).await;
    assert_eq!(
        event,
        StoryEvent::ContentApplied { card, version: 1 }
    );
    let snapshot = engine.snapshot().await.unwrap();
    let edited = snapshot.card(card).unwrap();
    assert_eq!(edited.content.plain_text(), "draft one two");
    assert_eq!(edited.version, 1);
}

#[tokio::test]
async fn test_flush_with_nothing_pending_is_silent() {
    let (engine, _store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let card = engine_insert(&engine, root, 0, "quiet", &owner()).await;
    let mut events = engine.subscribe().await.unwrap();

    let (session, _signals) = engine.open_session(card, editor()).await.unwrap();
    session.flush().await.unwrap();

    assert_no_event(&mut events).await;
    assert_eq!(engine.snapshot().await.unwrap().card(card).unwrap().version, 0);
}

#[tokio::test]
async fn test_conflicting_flush_discards_and_signals() {
    let (engine, _store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let card = engine_insert(&engine, root, 0, "draft", &owner()).await;

    let (session, mut signals) = engine.open_session(card, editor()).await.unwrap();
    session.record_change(append(5, "?")).await.unwrap();

    // The owner lands an edit first, making the session's view stale.
    engine
        .content_edit(ContentEdit {
            card,
            delta: append(5, "!"),
            expected_version: 0,
            requestor: owner(),
        })
        .await
        .unwrap();

    session.flush().await.unwrap();

    let signal = next_signal(&mut signals).await;
    assert_eq!(
        signal,
        SessionSignal::Conflict {
            card,
            reason: RejectReason::StaleVersion {
                expected: 0,
                found: 1
            },
        }
    );
    // The pending delta was discarded, not retried.
    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(snapshot.card(card).unwrap().content.plain_text(), "draft!");
    assert_eq!(snapshot.card(card).unwrap().version, 1);
}

#[tokio::test]
async fn test_close_flushes_pending_changes() {
    let (engine, _store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let card = engine_insert(&engine, root, 0, "draft", &owner()).await;

    let (session, mut signals) = engine.open_session(card, editor()).await.unwrap();
    session.record_change(append(5, ", done")).await.unwrap();
    session.close().await.unwrap();

    assert_eq!(next_signal(&mut signals).await, SessionSignal::Closed { card });
    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(snapshot.card(card).unwrap().content.plain_text(), "draft, done");
}

#[tokio::test]
async fn test_interval_flush_fires_without_an_explicit_flush() {
    let options = EngineOptions {
        flush_interval: Duration::from_millis(50),
        ..EngineOptions::default()
    };
    let (engine, _store) = spawn_engine_with_options(options).await;
    let root = root_of(&engine).await;
    let card = engine_insert(&engine, root, 0, "tick", &owner()).await;
    let mut events = engine.subscribe().await.unwrap();

    let (session, _signals) = engine.open_session(card, editor()).await.unwrap();
    session.record_change(append(4, " tock")).await.unwrap();

    // No flush call: the session's own timer must deliver the edit.
    let event = next_event(&mut events).await;
    assert_eq!(event, StoryEvent::ContentApplied { card, version: 1 });
}

#[tokio::test]
async fn test_record_after_close_errors() {
    let (engine, _store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let card = engine_insert(&engine, root, 0, "over", &owner()).await;

    let (session, _signals) = engine.open_session(card, editor()).await.unwrap();
    session.close().await.unwrap();

    let err = session.record_change(append(4, "!")).await.unwrap_err();
    assert!(err.is_session_error());
}

#[tokio::test]
async fn test_open_session_requires_editor_tier() {
    let (engine, _store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let card = engine_insert(&engine, root, 0, "locked", &owner()).await;

    let err = engine.open_session(card, viewer()).await.unwrap_err();
    assert!(err.is_permission_denied());

    let err = engine
        .open_session(fabler::CardId::new(99), editor())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_sessions_on_different_cards_run_concurrently() {
    let (engine, _store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let first = engine_insert(&engine, root, 0, "left", &owner()).await;
    let second = engine_insert(&engine, root, 1, "right", &owner()).await;

    let (one, _s1) = engine.open_session(first, editor()).await.unwrap();
    let (two, _s2) = engine.open_session(second, author()).await.unwrap();

    one.record_change(append(4, " hand")).await.unwrap();
    two.record_change(append(5, " hand")).await.unwrap();
    one.flush().await.unwrap();
    two.flush().await.unwrap();

    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(snapshot.card(first).unwrap().content.plain_text(), "left hand");
    assert_eq!(snapshot.card(second).unwrap().content.plain_text(), "right hand");
}
