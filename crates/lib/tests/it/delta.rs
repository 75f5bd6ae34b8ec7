//! Delta composition and application over real content.

use fabler::{Attributes, Content, Delta};

use crate::helpers::plain;

#[test]
fn test_composition_law_on_empty_content() {
    // A inserts "Hi" into empty content, B then deletes the first character.
    let a = Delta::new().insert("Hi");
    let b = Delta::new().delete(1).retain(1);

    let sequential = Content::new().apply(&a).unwrap().apply(&b).unwrap();
    let composed = Content::new().apply(&a.compose(&b).unwrap()).unwrap();

    assert_eq!(sequential.plain_text(), "i");
    assert_eq!(composed, sequential);
}

#[test]
fn test_chained_composition_matches_sequential_application() {
    let base = plain("The fork in the path");
    let steps = [
        // Append a clause.
        Delta::new().retain(20).insert(" waits"),
        // Replace "fork" with "road".
        Delta::new().retain(4).delete(4).insert("road").retain(18),
        // Embolden the replacement.
        Delta::new()
            .retain(4)
            .retain_with(4, Attributes::new().with("bold", true))
            .retain(18),
    ];

    let mut sequential = base.clone();
    for step in &steps {
        sequential = sequential.apply(step).unwrap();
    }

    let mut combined = steps[0].clone();
    for step in &steps[1..] {
        combined = combined.compose(step).unwrap();
    }
    let composed = base.apply(&combined).unwrap();

    assert_eq!(sequential.plain_text(), "The road in the path waits");
    assert_eq!(composed, sequential);
    // "The " plain, "road" bold, the rest plain.
    assert_eq!(composed.spans().len(), 3);
    assert_eq!(composed.spans()[1].text, "road");
    assert!(composed.spans()[1].attributes.is_some());
}

#[test]
fn test_compose_rejects_out_of_step_deltas() {
    let a = Delta::new().insert("Hi");
    let b = Delta::new().retain(5);
    let err = a.compose(&b).unwrap_err();
    assert!(matches!(
        err,
        fabler::delta::DeltaError::LengthMismatch {
            expected: 2,
            found: 5
        }
    ));
}

#[test]
fn test_deleting_freshly_inserted_text_cancels_out() {
    // The second delta removes exactly what the first inserted, so the
    // composition must collapse to a plain retain.
    let base = plain("ab");
    let a = Delta::new().retain(1).insert("X").retain(1);
    let b = Delta::new().retain(1).delete(1).retain(1);

    let combined = a.compose(&b).unwrap();
    assert!(combined.is_identity());
    assert_eq!(base.apply(&combined).unwrap().plain_text(), "ab");
}
