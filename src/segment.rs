//! Boundary-sweep decomposition of overlapping spans into flat segments.
//!
//! The rendering layer cannot paint overlapping highlights directly: it
//! needs a linear, non-overlapping decomposition of the field where each
//! piece knows exactly which spans cover it. This module produces that
//! decomposition.
//!
//! ```text
//! text:     I am absolutely thrilled today
//! spans:         [--- positive ---]
//!                   [---- strong ----]
//!
//! segments: [0,5) {}  [5,8) {positive}  [8,15) {positive,strong}
//!           [15,20) {strong}  [20,30) {}
//! ```
//!
//! # Sweep rules
//!
//! Every span contributes an "open" event at `start` and a "close" event
//! at `end`. Events are sorted by position; at equal positions closes are
//! processed before opens, so adjacent spans that merely touch
//! (`a.end == b.start`) never share a segment. `active_span_ids` lists
//! covering spans in slice (insertion) order regardless of where each
//! one opened, so the last id is always the most recently inserted
//! highlight and renders topmost. Closes are not LIFO with respect to
//! opens, so closing splices the specific id out of the active list
//! rather than popping.
//!
//! Zero-width spans are emitted as explicit zero-length marker segments
//! so the caller can render a caret-style marker instead of losing them.

use serde::{Deserialize, Serialize};

use crate::span::{Span, SpanId};

/// A derived, non-overlapping sub-range of canonical text tagged with the
/// spans active over it. Never persisted; recomputed on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Start offset (characters, inclusive).
    pub start: usize,
    /// End offset (characters, exclusive; equal to `start` for markers).
    pub end: usize,
    /// Ids of spans covering this segment, in stacking order
    /// (insertion order; last = topmost).
    pub active_span_ids: Vec<SpanId>,
}

impl Segment {
    /// Length in characters (zero for marker segments).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether this is a zero-length marker segment.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether no span covers this segment.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.active_span_ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    // Ordering at equal positions: close, then marker, then open.
    Close,
    Marker,
    Open,
}

/// Decompose `spans` into an ordered segment list partitioning
/// `[0, text_len)`.
///
/// `spans` must be in insertion order (the order becomes the stacking
/// order) and already validated against `text_len`; the store guarantees
/// both. Uncovered stretches yield segments with empty
/// `active_span_ids`, so concatenating all non-marker segments always
/// reproduces `[0, text_len)` exactly.
#[must_use]
pub fn render_segments(spans: &[Span], text_len: usize) -> Vec<Segment> {
    // (position, kind, slice index); slice index keeps tie order stable.
    let mut events: Vec<(usize, EventKind, usize)> = Vec::with_capacity(spans.len() * 2);
    for (idx, span) in spans.iter().enumerate() {
        if span.is_empty() {
            events.push((span.start, EventKind::Marker, idx));
        } else {
            events.push((span.start, EventKind::Open, idx));
            events.push((span.end, EventKind::Close, idx));
        }
    }
    events.sort();

    let mut segments = Vec::new();
    let mut active: Vec<usize> = Vec::new();
    let mut prev = 0usize;

    let mut i = 0;
    while i < events.len() {
        let (pos, kind, idx) = events[i];
        if pos > prev {
            segments.push(Segment {
                start: prev,
                end: pos,
                active_span_ids: stack_ids(&active, spans),
            });
            prev = pos;
        }
        match kind {
            EventKind::Close => {
                // Closes are not LIFO relative to opens.
                if let Some(at) = active.iter().position(|&a| a == idx) {
                    active.remove(at);
                }
                i += 1;
            }
            EventKind::Marker => {
                // Fold all markers at this position into one zero-length
                // segment, interleaved with the open spans by insertion
                // order like any other stack.
                let mut covering = active.clone();
                while i < events.len() && events[i].0 == pos && events[i].1 == EventKind::Marker {
                    covering.push(events[i].2);
                    i += 1;
                }
                segments.push(Segment {
                    start: pos,
                    end: pos,
                    active_span_ids: stack_ids(&covering, spans),
                });
            }
            EventKind::Open => {
                active.push(idx);
                i += 1;
            }
        }
    }

    if prev < text_len {
        segments.push(Segment {
            start: prev,
            end: text_len,
            active_span_ids: Vec::new(),
        });
    }
    segments
}

/// Map active slice indices to span ids in insertion order. The active
/// list holds indices in open order, which diverges from insertion
/// order whenever an earlier-inserted span opens later in the text.
fn stack_ids(active: &[usize], spans: &[Span]) -> Vec<SpanId> {
    let mut stack = active.to_vec();
    stack.sort_unstable();
    stack.into_iter().map(|a| spans[a].id).collect()
}
