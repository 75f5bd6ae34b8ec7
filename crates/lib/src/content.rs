//! Styled text snapshots.
//!
//! [`Content`] is what a card actually stores: the current text as a
//! sequence of styled runs. Deltas describe changes; content is the result
//! of applying them. Snapshots are immutable values, cheap to clone and
//! serialize, and are the only text representation that reaches the store.

use serde::{Deserialize, Serialize};

use crate::delta::{Attributes, Delta, DeltaError, Op};

/// One run of identically formatted text. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
}

/// A card's text as an ordered sequence of styled runs.
///
/// Adjacent runs always differ in attributes; empty runs are never stored.
/// Lengths are counted in Unicode scalar values, matching delta lengths.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Content {
    spans: Vec<Span>,
}

impl Content {
    /// Empty content.
    pub fn new() -> Self {
        Self::default()
    }

    /// Content holding one unstyled run of `text`.
    pub fn from_plain(text: impl Into<String>) -> Self {
        let mut content = Self::new();
        content.push_run(text.into(), None);
        content
    }

    /// Content built from runs, normalized on the way in.
    pub fn from_spans(spans: impl IntoIterator<Item = Span>) -> Self {
        let mut content = Self::new();
        for span in spans {
            content.push_run(span.text, span.attributes);
        }
        content
    }

    /// The styled runs, in order.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Total length in characters.
    pub fn char_len(&self) -> usize {
        self.spans.iter().map(|s| s.text.chars().count()).sum()
    }

    /// The text with formatting stripped.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Apply a whole-document delta, producing the next snapshot.
    ///
    /// Requires `delta.base_len() == self.char_len()`; a shorter or longer
    /// delta means the sender edited a different version of this text and
    /// is rejected with [`DeltaError::LengthMismatch`] before anything is
    /// touched. Attribute-bearing retains restyle the range they cover,
    /// with `null` markers removing formats.
    pub fn apply(&self, delta: &Delta) -> Result<Content, DeltaError> {
        if delta.base_len() != self.char_len() {
            return Err(DeltaError::LengthMismatch {
                expected: delta.base_len(),
                found: self.char_len(),
            });
        }

        let mut source = SpanCursor::new(&self.spans);
        let mut next = Content::new();
        for op in delta.ops() {
            match op {
                Op::Insert { insert, attributes } => {
                    next.push_run(insert.clone(), attributes.clone());
                }
                Op::Delete { delete } => source.skip(*delete),
                Op::Retain { retain, attributes } => {
                    let mut remaining = *retain;
                    while remaining > 0 {
                        let n = remaining.min(source.peek_len());
                        let (text, base) = source.take(n);
                        let composed = match attributes {
                            None => base.cloned(),
                            Some(overlay) => {
                                Attributes::compose(base, Some(overlay), false)
                            }
                        };
                        next.push_run(text, composed);
                        remaining -= n;
                    }
                }
            }
        }
        Ok(next)
    }

    /// Append a run, merging into the previous one when attributes match.
    fn push_run(&mut self, text: String, attributes: Option<Attributes>) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.spans.last_mut() {
            if last.attributes == attributes {
                last.text.push_str(&text);
                return;
            }
        }
        self.spans.push(Span { text, attributes });
    }
}

/// Character-level cursor over spans, mirroring the delta op cursor.
struct SpanCursor<'a> {
    spans: &'a [Span],
    index: usize,
    consumed: usize,
}

impl<'a> SpanCursor<'a> {
    fn new(spans: &'a [Span]) -> Self {
        Self {
            spans,
            index: 0,
            consumed: 0,
        }
    }

    fn peek_len(&self) -> usize {
        match self.spans.get(self.index) {
            Some(span) => span.text.chars().count() - self.consumed,
            None => usize::MAX,
        }
    }

    /// Take up to `n` characters from the current span. The caller's length
    /// check guarantees this never runs past the end in practice.
    fn take(&mut self, n: usize) -> (String, Option<&'a Attributes>) {
        let Some(span) = self.spans.get(self.index) else {
            return (String::new(), None);
        };

        let len = span.text.chars().count();
        let taken = n.min(len - self.consumed);
        let text: String = span.text.chars().skip(self.consumed).take(taken).collect();
        let attributes = span.attributes.as_ref();

        self.consumed += taken;
        if self.consumed == len {
            self.index += 1;
            self.consumed = 0;
        }
        (text, attributes)
    }

    fn skip(&mut self, n: usize) {
        let mut remaining = n;
        while remaining > 0 && self.index < self.spans.len() {
            let taken = remaining.min(self.peek_len());
            self.take(taken);
            remaining -= taken;
        }
    }
}
