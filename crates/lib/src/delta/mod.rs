//! Text deltas: the change language for card content.
//!
//! A [`Delta`] is an ordered sequence of operations ([`Op`]) describing an
//! edit to a piece of styled text: retain a range (optionally restyling it),
//! insert new text, or delete a range. Deltas in Fabler always span the whole
//! document they address: the sum of retained and deleted lengths (the
//! [`base length`](Delta::base_len)) must equal the length of the text the
//! delta is applied to. Editing sessions maintain this by composing every
//! recorded change into a pending delta that keeps its trailing retain.
//!
//! Lengths are counted in Unicode scalar values (Rust `char`s), never bytes.
//!
//! # Composition
//!
//! [`Delta::compose`] merges two sequential edits into one delta with the
//! same effect. Composition is associative and compatible with application:
//! applying `a.compose(b)?` to a document yields the same text as applying
//! `a` and then `b`.
//!
//! Deltas are ephemeral: they travel through sessions and the sync protocol
//! but are never persisted. Only content snapshots reach the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod errors;

pub use errors::DeltaError;

/// Inline formatting attached to an insert or retain.
///
/// Keys are format names (`bold`, `italic`, `link`, ...), values are
/// arbitrary JSON. A `null` value is a removal marker: composed over a base,
/// it deletes that key. Removal markers survive on retains (so they can still
/// strip formatting from the underlying text) but are dropped from inserts,
/// where there is nothing left to remove.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    /// Create an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a format key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Mark a format key for removal (a `null` value).
    pub fn unset(&mut self, key: impl Into<String>) {
        self.0.insert(key.into(), Value::Null);
    }

    /// Look up a format key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Layer `overlay` on top of `base`, per-key, right side winning.
    ///
    /// With `keep_removals` false, keys whose composed value is `null` are
    /// dropped from the result. Returns `None` when the composed map is
    /// empty, so op fields stay `None` instead of holding `Some({})`.
    pub fn compose(
        base: Option<&Attributes>,
        overlay: Option<&Attributes>,
        keep_removals: bool,
    ) -> Option<Attributes> {
        let mut merged = base.cloned().unwrap_or_default();
        if let Some(overlay) = overlay {
            for (key, value) in overlay.iter() {
                merged.0.insert(key.clone(), value.clone());
            }
        }
        if !keep_removals {
            merged.0.retain(|_, value| !value.is_null());
        }
        if merged.is_empty() { None } else { Some(merged) }
    }
}

impl FromIterator<(String, Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One delta operation.
///
/// Serializes in the conventional rich-text wire shape, one key per kind:
/// `{"retain": 4}`, `{"insert": "hi", "attributes": {"bold": true}}`,
/// `{"delete": 2}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Op {
    /// Keep the next `retain` characters, restyling them if attributes are set.
    Retain {
        retain: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attributes: Option<Attributes>,
    },
    /// Insert text at the current position.
    Insert {
        insert: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attributes: Option<Attributes>,
    },
    /// Remove the next `delete` characters.
    Delete { delete: usize },
}

impl Op {
    /// Length of this op in characters.
    pub fn len(&self) -> usize {
        match self {
            Op::Retain { retain, .. } => *retain,
            Op::Insert { insert, .. } => insert.chars().count(),
            Op::Delete { delete } => *delete,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An edit to a whole document, as an ordered run of [`Op`]s.
///
/// Build one with the chaining methods; ops are normalized as they are
/// pushed (zero-length ops dropped, adjacent same-kind ops with equal
/// attributes merged, inserts ordered before deletes at the same position):
///
/// ```
/// use fabler::Delta;
///
/// // On "hello world": replace "world" with "fabler".
/// let delta = Delta::new().retain(6).insert("fabler").delete(5);
/// assert_eq!(delta.base_len(), 11);
/// assert_eq!(delta.target_len(), 12);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Delta {
    ops: Vec<Op>,
}

impl Delta {
    /// Create an empty delta (the identity of the empty document).
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity delta of an `len`-character document: one plain retain.
    pub fn identity(len: usize) -> Self {
        Self::new().retain(len)
    }

    /// Append a plain retain.
    pub fn retain(mut self, n: usize) -> Self {
        self.push(Op::Retain {
            retain: n,
            attributes: None,
        });
        self
    }

    /// Append a retain that restyles the retained range.
    pub fn retain_with(mut self, n: usize, attributes: Attributes) -> Self {
        let attributes = if attributes.is_empty() {
            None
        } else {
            Some(attributes)
        };
        self.push(Op::Retain {
            retain: n,
            attributes,
        });
        self
    }

    /// Append an unstyled insert.
    pub fn insert(mut self, text: impl Into<String>) -> Self {
        self.push(Op::Insert {
            insert: text.into(),
            attributes: None,
        });
        self
    }

    /// Append a styled insert.
    pub fn insert_with(mut self, text: impl Into<String>, attributes: Attributes) -> Self {
        let attributes = if attributes.is_empty() {
            None
        } else {
            Some(attributes)
        };
        self.push(Op::Insert {
            insert: text.into(),
            attributes,
        });
        self
    }

    /// Append a delete.
    pub fn delete(mut self, n: usize) -> Self {
        self.push(Op::Delete { delete: n });
        self
    }

    /// The operations, in order.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// True when the delta holds no operations at all.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// True when applying this delta changes nothing: every op is a plain
    /// retain. The empty delta is the identity of the empty document.
    pub fn is_identity(&self) -> bool {
        self.ops.iter().all(|op| {
            matches!(
                op,
                Op::Retain {
                    attributes: None,
                    ..
                }
            )
        })
    }

    /// Length of the document this delta applies to: retained plus deleted.
    pub fn base_len(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                Op::Retain { retain, .. } => *retain,
                Op::Delete { delete } => *delete,
                Op::Insert { .. } => 0,
            })
            .sum()
    }

    /// Length of the document this delta produces: retained plus inserted.
    pub fn target_len(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                Op::Retain { retain, .. } => *retain,
                Op::Insert { insert, .. } => insert.chars().count(),
                Op::Delete { .. } => 0,
            })
            .sum()
    }

    /// Merge two sequential edits into one.
    ///
    /// `a.compose(&b)?` produces a delta with the effect of applying `a` and
    /// then `b`. Requires `a.target_len() == b.base_len()`; the composed
    /// delta keeps its full span (trailing retains are not trimmed), so it
    /// remains a whole-document transform.
    pub fn compose(&self, other: &Delta) -> Result<Delta, DeltaError> {
        if self.target_len() != other.base_len() {
            return Err(DeltaError::LengthMismatch {
                expected: self.target_len(),
                found: other.base_len(),
            });
        }

        let mut left = OpCursor::new(&self.ops);
        let mut right = OpCursor::new(&other.ops);
        let mut out = Delta::new();

        while !left.is_done() || !right.is_done() {
            // Inserts on the right land in the output verbatim; deletes on
            // the left already removed text the right side never saw.
            if matches!(right.peek(), Some(Op::Insert { .. })) {
                let n = right.peek_len();
                out.push(right.take(n));
                continue;
            }
            if matches!(left.peek(), Some(Op::Delete { .. })) {
                let n = left.peek_len();
                out.push(left.take(n));
                continue;
            }

            let n = left.peek_len().min(right.peek_len());
            let kept = left.take(n);
            match right.take(n) {
                Op::Retain {
                    attributes: overlay,
                    ..
                } => {
                    let op = match kept {
                        Op::Retain {
                            attributes: base, ..
                        } => Op::Retain {
                            retain: n,
                            attributes: Attributes::compose(
                                base.as_ref(),
                                overlay.as_ref(),
                                true,
                            ),
                        },
                        Op::Insert {
                            insert,
                            attributes: base,
                        } => Op::Insert {
                            insert,
                            attributes: Attributes::compose(
                                base.as_ref(),
                                overlay.as_ref(),
                                false,
                            ),
                        },
                        Op::Delete { .. } => unreachable!("left deletes drained above"),
                    };
                    out.push(op);
                }
                Op::Delete { delete } => {
                    // Deleting retained text survives; deleting text the
                    // left side inserted cancels both ops.
                    if matches!(kept, Op::Retain { .. }) {
                        out.push(Op::Delete { delete });
                    }
                }
                Op::Insert { .. } => unreachable!("right inserts drained above"),
            }
        }

        Ok(out)
    }

    /// Normalizing push: drops empty ops, merges with the last op when kind
    /// and attributes match, and slots inserts before a trailing delete so
    /// equal edits have equal op lists.
    fn push(&mut self, op: Op) {
        if op.is_empty() {
            return;
        }

        let mut index = self.ops.len();
        if matches!(op, Op::Insert { .. })
            && matches!(self.ops.last(), Some(Op::Delete { .. }))
        {
            index -= 1;
        }

        if index > 0 {
            match (&mut self.ops[index - 1], &op) {
                (
                    Op::Retain {
                        retain,
                        attributes: prev,
                    },
                    Op::Retain {
                        retain: n,
                        attributes: next,
                    },
                ) if prev == next => {
                    *retain += n;
                    return;
                }
                (
                    Op::Insert {
                        insert,
                        attributes: prev,
                    },
                    Op::Insert {
                        insert: text,
                        attributes: next,
                    },
                ) if prev == next => {
                    insert.push_str(text);
                    return;
                }
                (Op::Delete { delete }, Op::Delete { delete: n }) => {
                    *delete += n;
                    return;
                }
                _ => {}
            }
        }

        self.ops.insert(index, op);
    }
}

/// Splitting cursor over an op list.
///
/// Yields ops in order, slicing them to requested lengths; zero-length ops
/// are skipped. An exhausted cursor reports an unbounded plain retain, which
/// keeps the compose loop total without special casing the tail.
struct OpCursor<'a> {
    ops: &'a [Op],
    index: usize,
    consumed: usize,
}

impl<'a> OpCursor<'a> {
    fn new(ops: &'a [Op]) -> Self {
        let mut cursor = Self {
            ops,
            index: 0,
            consumed: 0,
        };
        cursor.skip_empty();
        cursor
    }

    fn skip_empty(&mut self) {
        while self.index < self.ops.len() && self.ops[self.index].is_empty() {
            self.index += 1;
        }
    }

    fn peek(&self) -> Option<&'a Op> {
        self.ops.get(self.index)
    }

    fn peek_len(&self) -> usize {
        match self.peek() {
            Some(op) => op.len() - self.consumed,
            None => usize::MAX,
        }
    }

    fn is_done(&self) -> bool {
        self.peek().is_none()
    }

    /// Take up to `n` characters from the current op. Callers never ask for
    /// more than `peek_len()`; past the end this yields a plain retain.
    fn take(&mut self, n: usize) -> Op {
        let Some(op) = self.peek() else {
            return Op::Retain {
                retain: n,
                attributes: None,
            };
        };

        let remaining = op.len() - self.consumed;
        let taken = n.min(remaining);
        let slice = match op {
            Op::Retain { attributes, .. } => Op::Retain {
                retain: taken,
                attributes: attributes.clone(),
            },
            Op::Insert { insert, attributes } => Op::Insert {
                insert: insert.chars().skip(self.consumed).take(taken).collect(),
                attributes: attributes.clone(),
            },
            Op::Delete { .. } => Op::Delete { delete: taken },
        };

        self.consumed += taken;
        if self.consumed == op.len() {
            self.index += 1;
            self.consumed = 0;
            self.skip_empty();
        }
        slice
    }
}
