//! Membership lists under grant and revoke.

use fabler::story::StoryError;
use fabler::{Tier, UserId, tier_of};

use crate::helpers::{author, editor, owner, seeded_story, viewer};

/// How many membership lists mention `user`.
fn listings(story: &fabler::Story, user: &UserId) -> usize {
    let header = story.header();
    [&header.authors, &header.editors, &header.viewers]
        .into_iter()
        .map(|list| list.iter().filter(|u| *u == user).count())
        .sum()
}

#[test]
fn test_grant_keeps_each_user_in_exactly_one_list() {
    let mut story = seeded_story();

    // Promote the viewer twice; they must never appear in two lists.
    story.grant(viewer(), Tier::Editor, &owner()).unwrap();
    assert_eq!(listings(&story, &viewer()), 1);
    assert_eq!(tier_of(&viewer(), story.header()), Some(Tier::Editor));

    story.grant(viewer(), Tier::Author, &owner()).unwrap();
    assert_eq!(listings(&story, &viewer()), 1);
    assert_eq!(tier_of(&viewer(), story.header()), Some(Tier::Author));

    // Demotion is the same operation in the other direction.
    story.grant(viewer(), Tier::Viewer, &owner()).unwrap();
    assert_eq!(listings(&story, &viewer()), 1);
    assert_eq!(tier_of(&viewer(), story.header()), Some(Tier::Viewer));
}

#[test]
fn test_revoke_removes_membership_and_is_idempotent() {
    let mut story = seeded_story();

    story.revoke(&editor(), &owner()).unwrap();
    assert_eq!(listings(&story, &editor()), 0);
    assert_eq!(tier_of(&editor(), story.header()), None);

    // Revoking a non-member changes nothing.
    story.revoke(&editor(), &owner()).unwrap();
    assert_eq!(listings(&story, &editor()), 0);
}

#[test]
fn test_owner_standing_cannot_be_changed() {
    let mut story = seeded_story();

    let err = story.grant(owner(), Tier::Viewer, &owner()).unwrap_err();
    assert!(matches!(err, StoryError::OwnerImmutable));

    let err = story.revoke(&owner(), &owner()).unwrap_err();
    assert!(matches!(err, StoryError::OwnerImmutable));

    // Nor can a second owner be minted.
    let err = story.grant(editor(), Tier::Owner, &owner()).unwrap_err();
    assert!(matches!(err, StoryError::OwnerImmutable));
    assert_eq!(tier_of(&owner(), story.header()), Some(Tier::Owner));
}

#[test]
fn test_only_the_owner_manages_membership() {
    let mut story = seeded_story();

    let err = story
        .grant(viewer(), Tier::Editor, &author())
        .unwrap_err();
    assert!(err.is_permission_denied());

    let err = story.revoke(&viewer(), &author()).unwrap_err();
    assert!(err.is_permission_denied());
    assert_eq!(tier_of(&viewer(), story.header()), Some(Tier::Viewer));
}

#[test]
fn test_header_edits_require_author_tier() {
    let mut story = seeded_story();

    story.rename("A Better Tale", &author()).unwrap();
    story.set_description("now with a plot", &author()).unwrap();
    assert_eq!(story.header().title, "A Better Tale");
    assert_eq!(story.header().description, "now with a plot");

    assert!(story.rename("no", &editor()).unwrap_err().is_permission_denied());
    assert!(
        story
            .set_description("no", &editor())
            .unwrap_err()
            .is_permission_denied()
    );
    assert_eq!(story.header().title, "A Better Tale");
}
