//! Engine command handling: structural events, content outcomes, and the
//! guarantee that subscribers only ever see state the store already holds.

use fabler::story::StoryError;
use fabler::{
    CardId, ContentEdit, ContentOutcome, RejectReason, Store, StoryEvent, StructuralCommand,
    StructuralKind,
};

use crate::helpers::*;

#[tokio::test]
async fn test_insert_event_reports_the_parents_completed_shape() {
    let (engine, store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let mut events = engine.subscribe().await.unwrap();

    let event = engine
        .submit(StructuralCommand::Insert {
            parent: root,
            index: 0,
            content: plain("Opening"),
            requestor: owner(),
        })
        .await
        .unwrap();

    let StoryEvent::Structural { kind, ref subtree } = event else {
        panic!("insert produced {event:?}");
    };
    assert_eq!(kind, StructuralKind::Insert);
    assert_eq!(subtree.card.id, root);
    assert_eq!(subtree.card_count(), 2);
    assert_eq!(subtree.children[0].card.content.plain_text(), "Opening");
    assert_eq!(subtree.children[0].card.author, owner());

    // Subscribers get the same event the submitter was answered with.
    assert_eq!(next_event(&mut events).await, event);

    let stored = store.load_story(&story_id()).unwrap();
    assert_eq!(stored.cards.len(), 2);
}

#[tokio::test]
async fn test_delete_event_shows_the_former_parent_after_removal() {
    let (engine, store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let keep = engine_insert(&engine, root, 0, "Keep", &owner()).await;
    let doomed = engine_insert(&engine, root, 1, "Doomed", &owner()).await;
    engine_insert(&engine, doomed, 0, "Inner", &owner()).await;

    let event = engine
        .submit(StructuralCommand::Delete {
            card: doomed,
            requestor: owner(),
        })
        .await
        .unwrap();

    let StoryEvent::Structural { kind, subtree } = event else {
        panic!("delete produced {event:?}");
    };
    assert_eq!(kind, StructuralKind::Delete);
    assert_eq!(subtree.card.id, root);
    assert_eq!(subtree.children.len(), 1);
    assert_eq!(subtree.children[0].card.id, keep);

    // The whole subtree is gone from the store, not just the card itself.
    let stored = store.load_story(&story_id()).unwrap();
    assert_eq!(stored.cards.len(), 2);
    assert!(stored.card(doomed).is_none());
}

#[tokio::test]
async fn test_move_renumbers_depths_all_the_way_into_the_store() {
    let (engine, store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let a = engine_insert(&engine, root, 0, "A", &owner()).await;
    let b = engine_insert(&engine, root, 1, "B", &owner()).await;
    let a1 = engine_insert(&engine, a, 0, "A1", &owner()).await;

    let event = engine
        .submit(StructuralCommand::Move {
            card: a,
            new_parent: b,
            new_index: 0,
            requestor: owner(),
        })
        .await
        .unwrap();

    // The event focuses on the destination parent.
    let StoryEvent::Structural { kind, subtree } = event else {
        panic!("move produced {event:?}");
    };
    assert_eq!(kind, StructuralKind::Move);
    assert_eq!(subtree.card.id, b);
    assert_eq!(subtree.children[0].card.id, a);
    assert_eq!(subtree.children[0].children[0].card.id, a1);

    let stored = store.load_story(&story_id()).unwrap();
    assert_eq!(stored.card(root).unwrap().children, vec![b]);
    assert_eq!(stored.card(a).unwrap().parent, Some(b));
    assert_eq!(stored.card(a).unwrap().depth, 2);
    assert_eq!(stored.card(a1).unwrap().depth, 3);
}

#[tokio::test]
async fn test_refused_commands_leave_no_trace() {
    let (engine, store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let mut events = engine.subscribe().await.unwrap();

    let err = engine
        .submit(StructuralCommand::Insert {
            parent: root,
            index: 0,
            content: plain("sneaky"),
            requestor: viewer(),
        })
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());

    let err = engine
        .submit(StructuralCommand::Insert {
            parent: root,
            index: 5,
            content: plain("askew"),
            requestor: owner(),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        fabler::Error::Story(StoryError::InvalidPosition { index: 5, max: 0 })
    ));

    let err = engine
        .submit(StructuralCommand::Delete {
            card: root,
            requestor: outsider(),
        })
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());

    assert_no_event(&mut events).await;
    assert_eq!(store.load_story(&story_id()).unwrap().cards.len(), 1);
}

#[tokio::test]
async fn test_content_edit_round_trip_with_staleness_guard() {
    let (engine, store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let card = engine_insert(&engine, root, 0, "v0", &owner()).await;
    let mut events = engine.subscribe().await.unwrap();

    let outcome = engine
        .content_edit(ContentEdit {
            card,
            delta: append(2, " v1"),
            expected_version: 0,
            requestor: editor(),
        })
        .await
        .unwrap();
    assert_eq!(outcome, ContentOutcome::Applied { version: 1 });
    assert_eq!(
        next_event(&mut events).await,
        StoryEvent::ContentApplied { card, version: 1 }
    );

    // A second edit built against version 0 has missed the first one.
    let outcome = engine
        .content_edit(ContentEdit {
            card,
            delta: append(5, "!"),
            expected_version: 0,
            requestor: editor(),
        })
        .await
        .unwrap();
    let reason = RejectReason::StaleVersion {
        expected: 0,
        found: 1,
    };
    assert_eq!(
        outcome,
        ContentOutcome::Rejected {
            reason: reason.clone()
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        StoryEvent::ContentRejected { card, reason }
    );

    let stored = store.load_story(&story_id()).unwrap();
    assert_eq!(stored.card(card).unwrap().content.plain_text(), "v0 v1");
    assert_eq!(stored.card(card).unwrap().version, 1);
}

#[tokio::test]
async fn test_length_guard_rejects_without_a_version_bump() {
    let (engine, store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let card = engine_insert(&engine, root, 0, "five!", &owner()).await;

    let outcome = engine
        .content_edit(ContentEdit {
            card,
            delta: append(3, "?"),
            expected_version: 0,
            requestor: editor(),
        })
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ContentOutcome::Rejected {
            reason: RejectReason::LengthMismatch {
                expected: 3,
                found: 5,
            }
        }
    );

    let stored = store.load_story(&story_id()).unwrap();
    assert_eq!(stored.card(card).unwrap().content.plain_text(), "five!");
    assert_eq!(stored.card(card).unwrap().version, 0);
}

#[tokio::test]
async fn test_content_refusals_are_outcomes_not_errors() {
    let (engine, _store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let card = engine_insert(&engine, root, 0, "text", &owner()).await;

    let outcome = engine
        .content_edit(ContentEdit {
            card,
            delta: append(4, "!"),
            expected_version: 0,
            requestor: viewer(),
        })
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ContentOutcome::Rejected {
            reason: RejectReason::PermissionDenied { user: viewer() }
        }
    );

    let missing = CardId::new(99);
    let outcome = engine
        .content_edit(ContentEdit {
            card: missing,
            delta: append(0, "?"),
            expected_version: 0,
            requestor: editor(),
        })
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ContentOutcome::Rejected {
            reason: RejectReason::NotFound { card: missing }
        }
    );
}

#[tokio::test]
async fn test_events_trail_the_store_write() {
    let (engine, store) = spawn_engine().await;
    let root = root_of(&engine).await;
    let card = engine_insert(&engine, root, 0, "", &owner()).await;
    let mut events = engine.subscribe().await.unwrap();

    for (version, text) in ["a", "b", "c"].iter().enumerate() {
        engine
            .content_edit(ContentEdit {
                card,
                delta: append(version, text),
                expected_version: version as u64,
                requestor: editor(),
            })
            .await
            .unwrap();
    }

    // Events arrive in acceptance order, and by the time each one is
    // observable the store already holds at least that version.
    for version in 1..=3u64 {
        assert_eq!(
            next_event(&mut events).await,
            StoryEvent::ContentApplied { card, version }
        );
        let stored = store.load_story(&story_id()).unwrap();
        assert!(stored.card(card).unwrap().version >= version);
    }
    let stored = store.load_story(&story_id()).unwrap();
    assert_eq!(stored.card(card).unwrap().content.plain_text(), "abc");
}

#[tokio::test]
async fn test_subscribers_only_see_events_committed_after_subscribing() {
    let (engine, _store) = spawn_engine().await;
    let root = root_of(&engine).await;
    engine_insert(&engine, root, 0, "before", &owner()).await;

    let mut events = engine.subscribe().await.unwrap();
    engine_insert(&engine, root, 1, "after", &owner()).await;

    let event = next_event(&mut events).await;
    let StoryEvent::Structural { subtree, .. } = event else {
        panic!("insert produced {event:?}");
    };
    // Only the second insert is delivered; its shape already lists both.
    assert_eq!(subtree.children.len(), 2);
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn test_snapshot_and_header_match_the_persisted_story() {
    let (engine, store) = spawn_engine().await;
    let root = root_of(&engine).await;
    engine_insert(&engine, root, 0, "one", &owner()).await;
    engine_insert(&engine, root, 1, "two", &owner()).await;

    let header = engine.header().await.unwrap();
    assert_eq!(header.title, "A Winding Tale");
    assert_eq!(header.owner, owner());

    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(snapshot.cards.len(), 3);
    assert!(snapshot.cards.windows(2).all(|w| w[0].id < w[1].id));
    assert_eq!(snapshot, store.load_story(&story_id()).unwrap());
}

#[tokio::test]
async fn test_delete_story_is_owner_only_and_stops_the_engine() {
    let (engine, store) = spawn_engine().await;

    let err = engine.delete_story(author()).await.unwrap_err();
    assert!(err.is_permission_denied());
    assert!(store.contains(&story_id()).unwrap());

    engine.delete_story(owner()).await.unwrap();
    assert!(!store.contains(&story_id()).unwrap());

    let err = engine.snapshot().await.unwrap_err();
    assert!(err.is_engine_stopped());
}

#[tokio::test]
async fn test_shutdown_runs_queued_commands_then_stops() {
    let (engine, store) = spawn_engine().await;
    let root = root_of(&engine).await;
    engine_insert(&engine, root, 0, "kept", &owner()).await;

    engine.shutdown().await.unwrap();

    let err = engine.snapshot().await.unwrap_err();
    assert!(err.is_engine_stopped());

    // Work accepted before shutdown stays persisted.
    assert_eq!(store.load_story(&story_id()).unwrap().cards.len(), 2);
}
